use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};

use harborerp_core::{AggregateId, AssetInstanceId, ProjectId, SupplierId};
use harborerp_infra::flows::invoicing::{RecordInvoiceParams, RecordPaymentParams};
use harborerp_inventory::InventoryItemId;
use harborerp_invoicing::{InvoiceLine, PurchaseInvoiceId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_invoice).get(list_invoices))
        .route("/overdue", get(list_overdue_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(record_payment))
        .route("/:id/credit-notes", post(apply_credit_note))
        .route("/:id/approve", patch(approve_invoice))
        .route("/:id/reject", patch(reject_invoice))
}

pub async fn record_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::RecordInvoiceRequest>,
) -> axum::response::Response {
    let supplier_id: SupplierId = match body.supplier_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid supplier id");
        }
    };

    let project_id = match body.project_id {
        Some(raw) => match raw.parse::<ProjectId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid project id",
                );
            }
        },
        None => None,
    };

    let asset_instance_id = match body.asset_instance_id {
        Some(raw) => match raw.parse::<AssetInstanceId>() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid asset instance id",
                );
            }
        },
        None => None,
    };

    let due_date = match parse_rfc3339(&body.due_date) {
        Ok(dt) => dt,
        Err(response) => return response,
    };

    let mut lines: Vec<InvoiceLine> = Vec::with_capacity(body.items.len());
    for (idx, l) in body.items.into_iter().enumerate() {
        let item_agg: AggregateId = match l.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
            }
        };
        lines.push(InvoiceLine {
            line_no: (idx as u32) + 1,
            item_id: InventoryItemId::new(item_agg),
            description: l.description,
            quantity: l.quantity,
            unit_price: l.unit_price,
        });
    }

    let now = Utc::now();
    let params = RecordInvoiceParams {
        invoice_number: body.invoice_number,
        supplier_id,
        project_id,
        asset_instance_id,
        lines,
        tax_amount: body.tax_amount,
        due_date,
    };

    match services.invoices.record_invoice(tenant.tenant_id(), params, now) {
        Ok(snapshot) => (
            StatusCode::CREATED,
            Json(dto::invoice_snapshot_to_json(&snapshot, now)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let invoice_id = PurchaseInvoiceId::new(agg);
    match services
        .invoices_projection
        .get(tenant.tenant_id(), &invoice_id)
    {
        Some(rm) => (
            StatusCode::OK,
            Json(dto::invoice_read_model_to_json(&rm, Utc::now())),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let now = Utc::now();
    let invoices = services.invoices_projection.list(tenant.tenant_id());
    let body: Vec<_> = invoices
        .iter()
        .map(|rm| dto::invoice_read_model_to_json(rm, now))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "invoices": body }))).into_response()
}

pub async fn list_overdue_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let now = Utc::now();
    let invoices = services
        .invoices_projection
        .list_overdue(tenant.tenant_id(), now);
    let body: Vec<_> = invoices
        .iter()
        .map(|rm| dto::invoice_read_model_to_json(rm, now))
        .collect();
    (StatusCode::OK, Json(serde_json::json!({ "invoices": body }))).into_response()
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let now = Utc::now();
    let payment_date = match body.payment_date {
        Some(raw) => match parse_rfc3339(&raw) {
            Ok(dt) => dt,
            Err(response) => return response,
        },
        None => now,
    };

    let params = RecordPaymentParams {
        amount: body.amount,
        payment_date,
        method: body.payment_method,
        files: body.files,
    };

    match services
        .invoices
        .record_payment(tenant.tenant_id(), PurchaseInvoiceId::new(agg), params, now)
    {
        Ok(snapshot) => (
            StatusCode::CREATED,
            Json(dto::invoice_snapshot_to_json(&snapshot, now)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn apply_credit_note(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ApplyCreditNoteRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let now = Utc::now();
    match services.invoices.apply_credit_note(
        tenant.tenant_id(),
        PurchaseInvoiceId::new(agg),
        body.amount,
        body.reason,
        now,
    ) {
        Ok(snapshot) => (
            StatusCode::CREATED,
            Json(dto::invoice_snapshot_to_json(&snapshot, now)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn approve_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let now = Utc::now();
    match services
        .invoices
        .approve_invoice(tenant.tenant_id(), PurchaseInvoiceId::new(agg), now)
    {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(dto::invoice_snapshot_to_json(&snapshot, now)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reject_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RejectBody>>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id"),
    };

    let reason = body.and_then(|Json(b)| b.reason);
    let now = Utc::now();
    match services
        .invoices
        .reject_invoice(tenant.tenant_id(), PurchaseInvoiceId::new(agg), reason, now)
    {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(dto::invoice_snapshot_to_json(&snapshot, now)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, axum::response::Response> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_date",
                "dates must be RFC3339",
            )
        })
}
