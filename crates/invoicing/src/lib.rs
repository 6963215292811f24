//! Purchase invoice domain module (event-sourced).
//!
//! Payment reconciliation: payments and credit notes are applied against an
//! invoice's outstanding balance and can never overshoot it. Settlement
//! status (pending / partially paid / paid / overdue) is a derived read-time
//! projection, never a stored field.

pub mod invoice;

pub use invoice::{
    ApplyCreditNote, ApprovalStatus, ApproveInvoice, CreditNote, CreditNoteApplied,
    InvoiceApproved, InvoiceLine, InvoiceRejected, Payment, PaymentMethod, PaymentRecorded,
    PurchaseInvoice, PurchaseInvoiceCommand, PurchaseInvoiceEvent, PurchaseInvoiceId,
    PurchaseInvoiceRecorded, RecordInvoice, RecordPayment, RejectInvoice, SettlementStatus,
};
