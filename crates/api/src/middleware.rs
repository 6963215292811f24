use std::str::FromStr;

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use harborerp_core::TenantId;

use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Install the tenant context from the `X-Tenant-Id` header.
///
/// Authentication itself is an upstream concern (gateway/session layer);
/// this core only needs the tenant boundary, which every domain route
/// requires.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id = extract_tenant(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, StatusCode> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or(StatusCode::BAD_REQUEST)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    TenantId::from_str(header.trim()).map_err(|_| StatusCode::BAD_REQUEST)
}
