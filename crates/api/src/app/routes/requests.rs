use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use harborerp_core::AggregateId;
use harborerp_inventory::InventoryItemId;
use harborerp_procurement::{PurchaseRequestId, RequestLine};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_request).get(list_requests))
        .route("/:id", get(get_request))
        .route("/:id/approve", post(approve_request))
        .route("/:id/reject", post(reject_request))
}

pub async fn create_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreatePurchaseRequestRequest>,
) -> axum::response::Response {
    let mut lines: Vec<RequestLine> = Vec::with_capacity(body.items.len());
    for (idx, l) in body.items.into_iter().enumerate() {
        let item_agg: AggregateId = match l.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
            }
        };
        lines.push(RequestLine {
            line_no: (idx as u32) + 1,
            item_id: InventoryItemId::new(item_agg),
            quantity: l.quantity,
            note: l.note,
        });
    }

    match services.requests.create_request(
        tenant.tenant_id(),
        body.request_number,
        lines,
        body.urgency,
        Utc::now(),
    ) {
        Ok(request_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": request_id.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id"),
    };

    let request_id = PurchaseRequestId::new(agg);
    match services
        .docs_projection
        .get_request(tenant.tenant_id(), &request_id)
    {
        Some(rm) => (StatusCode::OK, Json(dto::request_read_model_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase request not found"),
    }
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let requests = services.docs_projection.list_requests(tenant.tenant_id());
    let body: Vec<_> = requests.iter().map(dto::request_read_model_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "requests": body }))).into_response()
}

pub async fn approve_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id"),
    };

    let request_id = PurchaseRequestId::new(agg);
    match services
        .requests
        .approve_request(tenant.tenant_id(), request_id, Utc::now())
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": request_id.to_string(), "status": "approved" })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reject_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RejectBody>>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id"),
    };

    let reason = body.and_then(|Json(b)| b.reason);
    let request_id = PurchaseRequestId::new(agg);
    match services
        .requests
        .reject_request(tenant.tenant_id(), request_id, reason, Utc::now())
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": request_id.to_string(), "status": "rejected" })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
