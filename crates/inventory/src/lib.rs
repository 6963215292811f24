//! Inventory ledger domain module (event-sourced).
//!
//! This crate owns every mutation of on-hand stock and weighted-average cost.
//! No other component writes these fields; procurement documents drive them
//! exclusively through the commands defined here. Pure deterministic domain
//! logic (no IO, no HTTP, no storage).

pub mod item;

pub use item::{
    InventoryCommand, InventoryEvent, InventoryItem, InventoryItemId, IssueStock, ItemRegistered,
    ReceiveStock, RegisterItem, ReverseIssue, ReverseReceipt, StockIssueReversed, StockIssued,
    StockReceiptReversed, StockReceived,
};
