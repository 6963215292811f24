//! Procurement documents domain module (event-sourced).
//!
//! Goods receipts and goods issues are append-only ledger entries: validated
//! as a whole (header + lines), created exactly once, immutable afterwards.
//! Purchase requests carry a one-way approval workflow. The documents
//! themselves never move stock; the infrastructure flows translate their
//! lines into inventory commands.

pub mod issue;
pub mod receipt;
pub mod request;

pub use issue::{
    CreateGoodsIssue, GoodsIssue, GoodsIssueCommand, GoodsIssueCreated, GoodsIssueEvent,
    GoodsIssueId, IssueLine,
};
pub use receipt::{
    CreateGoodsReceipt, GoodsReceipt, GoodsReceiptCommand, GoodsReceiptCreated, GoodsReceiptEvent,
    GoodsReceiptId, ReceiptLine,
};
pub use request::{
    ApproveRequest, CreatePurchaseRequest, PurchaseRequest, PurchaseRequestCommand,
    PurchaseRequestCreated, PurchaseRequestApproved, PurchaseRequestEvent, PurchaseRequestId,
    PurchaseRequestRejected, PurchaseRequestStatus, RejectRequest, RequestLine, Urgency,
};
