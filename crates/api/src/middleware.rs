//! Request context extraction.
//!
//! Identity is resolved upstream (gateway / auth service); this layer only
//! reads the resulting headers and attaches typed context to the request.

use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use medstock_core::TenantId;

use crate::app::errors;
use crate::context::{TenantContext, WriteAccess};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const STOCK_WRITE_HEADER: &str = "x-stock-write";

pub async fn tenant_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let tenant_id = match extract_tenant(req.headers()) {
        Ok(id) => id,
        Err(message) => return errors::json_error(StatusCode::UNAUTHORIZED, "missing_tenant", message),
    };
    let write = WriteAccess::new(extract_write(req.headers()));

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(write);

    next.run(req).await
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let header = headers
        .get(TENANT_HEADER)
        .ok_or("x-tenant-id header is required")?;

    let header = header.to_str().map_err(|_| "x-tenant-id is not valid text")?;

    header.trim().parse().map_err(|_| "x-tenant-id is not a valid uuid")
}

/// Absent or unrecognised values deny.
fn extract_write(headers: &HeaderMap) -> bool {
    headers
        .get(STOCK_WRITE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
