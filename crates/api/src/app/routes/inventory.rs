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
use harborerp_inventory::{InventoryCommand, InventoryItem, InventoryItemId, RegisterItem, item};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(register_item).get(list_items))
        .route("/items/:id", get(get_item))
        .route("/low-stock", get(list_low_stock))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::RegisterItemRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let item_id = InventoryItemId::new(agg);

    let cmd = InventoryCommand::RegisterItem(RegisterItem {
        tenant_id: tenant.tenant_id(),
        item_id,
        name: body.name,
        category: body.category,
        unit: body.unit,
        min_stock_level: body.min_stock_level,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<InventoryItem>(
        tenant.tenant_id(),
        agg,
        item::AGGREGATE_TYPE,
        cmd,
        |id| InventoryItem::empty(InventoryItemId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    let item_id = InventoryItemId::new(agg);
    match services.stock_projection.get(tenant.tenant_id(), &item_id) {
        Some(rm) => (StatusCode::OK, Json(dto::stock_read_model_to_json(&rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services.stock_projection.list(tenant.tenant_id());
    let body: Vec<_> = items.iter().map(dto::stock_read_model_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": body }))).into_response()
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let items = services
        .stock_projection
        .list_below_min_stock(tenant.tenant_id());
    let body: Vec<_> = items.iter().map(dto::stock_read_model_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "items": body }))).into_response()
}
