use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use harborerp_core::{AggregateId, ProjectId};
use harborerp_inventory::InventoryItemId;
use harborerp_procurement::{GoodsIssueId, GoodsReceiptId, IssueLine, ReceiptLine};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn receipts_router() -> Router {
    Router::new()
        .route("/", post(create_goods_receipt).get(list_goods_receipts))
        .route("/:id", get(get_goods_receipt))
}

pub fn issues_router() -> Router {
    Router::new()
        .route("/", post(create_goods_issue).get(list_goods_issues))
        .route("/:id", get(get_goods_issue))
}

pub async fn create_goods_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateGoodsReceiptRequest>,
) -> axum::response::Response {
    let mut lines: Vec<ReceiptLine> = Vec::with_capacity(body.items.len());
    for (idx, l) in body.items.into_iter().enumerate() {
        let item_agg: AggregateId = match l.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
            }
        };
        lines.push(ReceiptLine {
            line_no: (idx as u32) + 1,
            item_id: InventoryItemId::new(item_agg),
            quantity: l.quantity,
            unit_cost: l.unit_cost,
        });
    }

    match services
        .goods
        .create_goods_receipt(tenant.tenant_id(), body.reference, lines, Utc::now())
    {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(dto::receipt_outcome_to_json(&outcome)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_goods_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid receipt id"),
    };

    let receipt_id = GoodsReceiptId::new(agg);
    match services
        .docs_projection
        .get_receipt(tenant.tenant_id(), &receipt_id)
    {
        Some(rm) => (StatusCode::OK, Json(dto::receipt_read_model_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "goods receipt not found"),
    }
}

pub async fn list_goods_receipts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let receipts = services.docs_projection.list_receipts(tenant.tenant_id());
    let body: Vec<_> = receipts.iter().map(dto::receipt_read_model_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "receipts": body }))).into_response()
}

pub async fn create_goods_issue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateGoodsIssueRequest>,
) -> axum::response::Response {
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

    let mut lines: Vec<IssueLine> = Vec::with_capacity(body.items.len());
    for (idx, l) in body.items.into_iter().enumerate() {
        let item_agg: AggregateId = match l.item_id.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id");
            }
        };
        lines.push(IssueLine {
            line_no: (idx as u32) + 1,
            item_id: InventoryItemId::new(item_agg),
            quantity: l.quantity,
        });
    }

    match services.goods.create_goods_issue(
        tenant.tenant_id(),
        body.reference,
        project_id,
        lines,
        Utc::now(),
    ) {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(dto::issue_outcome_to_json(&outcome)),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_goods_issue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid issue id"),
    };

    let issue_id = GoodsIssueId::new(agg);
    match services
        .docs_projection
        .get_issue(tenant.tenant_id(), &issue_id)
    {
        Some(rm) => (StatusCode::OK, Json(dto::issue_read_model_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "goods issue not found"),
    }
}

pub async fn list_goods_issues(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let issues = services.docs_projection.list_issues(tenant.tenant_id());
    let body: Vec<_> = issues.iter().map(dto::issue_read_model_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "issues": body }))).into_response()
}
