//! Projections: event envelopes in, disposable read models out.
//!
//! Each projection filters the shared bus by aggregate type, enforces tenant
//! isolation at the event level, and tracks a per-stream cursor so
//! at-least-once delivery stays idempotent (replays at or below the cursor
//! are ignored).

pub mod inventory_stock;
pub mod procurement_docs;
pub mod purchase_invoices;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use harborerp_core::{AggregateId, TenantId};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Whether an envelope should be applied or silently dropped.
pub(crate) enum CursorCheck {
    Apply,
    Duplicate,
}

/// Per (tenant, aggregate) stream cursors.
///
/// The first event of a stream may arrive at any positive sequence; after
/// that, strict +1 increments are required.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn check(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorCheck, ProjectionError> {
        let cursors = match self.inner.read() {
            Ok(c) => c,
            Err(_) => return Ok(CursorCheck::Duplicate),
        };
        let last = *cursors.get(&(tenant_id, aggregate_id)).unwrap_or(&0);

        if sequence_number == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(CursorCheck::Duplicate);
        }
        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence_number,
            });
        }

        Ok(CursorCheck::Apply)
    }

    pub(crate) fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert((tenant_id, aggregate_id), sequence_number);
        }
    }
}
