//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Every variant
/// has a stable machine-readable `kind()` that the API layer surfaces alongside
/// the human message. Infrastructure concerns (storage, publication) belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed or missing input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity or cost was non-positive where a positive value is required
    /// (or negative where a non-negative value is required).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A stock issue asked for more than is on hand.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A payment or credit note exceeds the invoice's outstanding balance.
    #[error("overpayment not allowed: amount {amount} exceeds outstanding {outstanding}")]
    OverpaymentNotAllowed {
        amount: Decimal,
        outstanding: Decimal,
    },

    /// An approval-workflow transition was attempted from a terminal state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (duplicate reference, stale version, immutable
    /// document mutation).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn insufficient_stock(requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn overpayment(amount: Decimal, outstanding: Decimal) -> Self {
        Self::OverpaymentNotAllowed {
            amount,
            outstanding,
        }
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable machine-readable error kind (wire contract).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::OverpaymentNotAllowed { .. } => "overpayment_not_allowed",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound => "not_found",
            Self::Conflict(_) => "conflict",
        }
    }
}
