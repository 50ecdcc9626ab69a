use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub async fn balances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::BalancesQuery>,
) -> axum::response::Response {
    match services
        .engine
        .stock_at(tenant.tenant_id(), query.location_id, query.product_id)
    {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn available_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::AvailableBatchesQuery>,
) -> axum::response::Response {
    match services
        .registry
        .list_available_batches(tenant.tenant_id(), query.product_id, query.location_id)
    {
        Ok(batches) => (StatusCode::OK, Json(batches)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
