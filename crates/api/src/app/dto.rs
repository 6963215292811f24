//! Request DTOs and JSON mapping helpers.
//!
//! Payloads are tagged, typed shapes: unknown or malformed bodies are
//! rejected by serde at the boundary before they reach the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use harborerp_infra::flows::goods::{GoodsIssueOutcome, GoodsReceiptOutcome, StockLevel};
use harborerp_infra::flows::invoicing::InvoiceSnapshot;
use harborerp_infra::projections::inventory_stock::StockReadModel;
use harborerp_infra::projections::procurement_docs::{
    GoodsIssueReadModel, GoodsReceiptReadModel, PurchaseRequestReadModel,
};
use harborerp_infra::projections::purchase_invoices::InvoiceReadModel;
use harborerp_invoicing::PaymentMethod;
use harborerp_procurement::Urgency;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterItemRequest {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub min_stock_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptLineRequest {
    pub item_id: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoodsReceiptRequest {
    pub reference: String,
    pub items: Vec<ReceiptLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct IssueLineRequest {
    pub item_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoodsIssueRequest {
    pub reference: String,
    pub project_id: Option<String>,
    pub items: Vec<IssueLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RequestLineRequest {
    pub item_id: String,
    pub quantity: i64,
    pub note: Option<String>,
}

fn default_urgency() -> Urgency {
    Urgency::Normal
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequestRequest {
    pub request_number: String,
    #[serde(default = "default_urgency")]
    pub urgency: Urgency,
    pub items: Vec<RequestLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceLineRequest {
    pub item_id: String,
    #[serde(default)]
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct RecordInvoiceRequest {
    pub invoice_number: String,
    pub supplier_id: String,
    pub project_id: Option<String>,
    pub asset_instance_id: Option<String>,
    /// RFC3339.
    pub due_date: String,
    #[serde(default)]
    pub tax_amount: Decimal,
    pub items: Vec<InvoiceLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    /// RFC3339; defaults to now.
    pub payment_date: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyCreditNoteRequest {
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RejectBody {
    pub reason: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn stock_level_to_json(level: &StockLevel) -> serde_json::Value {
    json!({
        "item_id": level.item_id.to_string(),
        "on_hand": level.on_hand,
        "avg_cost": level.avg_cost,
    })
}

pub fn stock_read_model_to_json(rm: &StockReadModel) -> serde_json::Value {
    json!({
        "id": rm.item_id.to_string(),
        "name": rm.name,
        "category": rm.category,
        "unit": rm.unit,
        "on_hand": rm.on_hand,
        "min_stock_level": rm.min_stock_level,
        "avg_cost": rm.avg_cost,
        "below_min_stock": rm.is_below_min_stock(),
    })
}

pub fn receipt_outcome_to_json(outcome: &GoodsReceiptOutcome) -> serde_json::Value {
    json!({
        "id": outcome.receipt_id.to_string(),
        "reference": outcome.reference,
        "received_at": outcome.received_at,
        "stock": outcome.stock.iter().map(stock_level_to_json).collect::<Vec<_>>(),
    })
}

pub fn issue_outcome_to_json(outcome: &GoodsIssueOutcome) -> serde_json::Value {
    json!({
        "id": outcome.issue_id.to_string(),
        "reference": outcome.reference,
        "project_id": outcome.project_id.map(|p| p.to_string()),
        "issued_at": outcome.issued_at,
        "stock": outcome.stock.iter().map(stock_level_to_json).collect::<Vec<_>>(),
    })
}

pub fn receipt_read_model_to_json(rm: &GoodsReceiptReadModel) -> serde_json::Value {
    json!({
        "id": rm.receipt_id.to_string(),
        "reference": rm.reference,
        "received_at": rm.received_at,
        "items": rm.lines.iter().map(|l| json!({
            "line_no": l.line_no,
            "item_id": l.item_id.to_string(),
            "quantity": l.quantity,
            "unit_cost": l.unit_cost,
        })).collect::<Vec<_>>(),
    })
}

pub fn issue_read_model_to_json(rm: &GoodsIssueReadModel) -> serde_json::Value {
    json!({
        "id": rm.issue_id.to_string(),
        "reference": rm.reference,
        "project_id": rm.project_id.map(|p| p.to_string()),
        "issued_at": rm.issued_at,
        "items": rm.lines.iter().map(|l| json!({
            "line_no": l.line_no,
            "item_id": l.item_id.to_string(),
            "quantity": l.quantity,
        })).collect::<Vec<_>>(),
    })
}

pub fn request_read_model_to_json(rm: &PurchaseRequestReadModel) -> serde_json::Value {
    json!({
        "id": rm.request_id.to_string(),
        "request_number": rm.request_number,
        "urgency": rm.urgency,
        "status": rm.status,
        "requested_at": rm.requested_at,
        "items": rm.lines.iter().map(|l| json!({
            "line_no": l.line_no,
            "item_id": l.item_id.to_string(),
            "quantity": l.quantity,
            "note": l.note,
        })).collect::<Vec<_>>(),
    })
}

pub fn invoice_snapshot_to_json(snapshot: &InvoiceSnapshot, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": snapshot.invoice_id.to_string(),
        "invoice_number": snapshot.invoice_number,
        "subtotal": snapshot.subtotal,
        "tax_amount": snapshot.tax_amount,
        "total_amount": snapshot.total_amount,
        "paid_amount": snapshot.paid_amount,
        "credited_amount": snapshot.credited_amount,
        "outstanding": snapshot.outstanding,
        "approval_status": snapshot.approval_status,
        "due_date": snapshot.due_date,
        "status": snapshot.settlement_status(now),
    })
}

pub fn invoice_read_model_to_json(rm: &InvoiceReadModel, now: DateTime<Utc>) -> serde_json::Value {
    json!({
        "id": rm.invoice_id.to_string(),
        "invoice_number": rm.invoice_number,
        "supplier_id": rm.supplier_id.to_string(),
        "project_id": rm.project_id.map(|p| p.to_string()),
        "asset_instance_id": rm.asset_instance_id.map(|a| a.to_string()),
        "subtotal": rm.subtotal,
        "tax_amount": rm.tax_amount,
        "total_amount": rm.total_amount,
        "paid_amount": rm.paid_amount,
        "credited_amount": rm.credited_amount,
        "outstanding": rm.outstanding(),
        "approval_status": rm.approval_status,
        "due_date": rm.due_date,
        "status": rm.settlement_status(now),
        "payments": rm.payments.iter().map(|p| json!({
            "id": p.payment_id,
            "amount": p.amount,
            "payment_date": p.payment_date,
            "payment_method": p.method,
            "files": p.files,
        })).collect::<Vec<_>>(),
        "credit_notes": rm.credit_notes.iter().map(|c| json!({
            "id": c.credit_note_id,
            "amount": c.amount,
            "reason": c.reason,
        })).collect::<Vec<_>>(),
        "items": rm.lines.iter().map(|l| json!({
            "line_no": l.line_no,
            "item_id": l.item_id.to_string(),
            "description": l.description,
            "quantity": l.quantity,
            "unit_price": l.unit_price,
        })).collect::<Vec<_>>(),
    })
}
