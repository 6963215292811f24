use axum::Router;

pub mod goods;
pub mod inventory;
pub mod invoices;
pub mod requests;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/inventory", inventory::router())
        .nest("/goods-receipts", goods::receipts_router())
        .nest("/goods-issues", goods::issues_router())
        .nest("/purchase-requests", requests::router())
        .nest("/purchase-invoices", invoices::router())
}
