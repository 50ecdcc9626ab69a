use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use medstock_core::MovementId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{TenantContext, WriteAccess};

pub async fn apply_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }

    match services.engine.apply_movement(tenant.tenant_id(), body.into_draft()) {
        Ok(movement) => (StatusCode::CREATED, Json(dto::MovementResponse::from(movement))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn issue_fefo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Json(body): Json<dto::IssueRequest>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }

    match services.engine.issue_fefo(tenant.tenant_id(), body.into_issue()) {
        Ok(movements) => {
            let movements: Vec<dto::MovementResponse> = movements.into_iter().map(Into::into).collect();
            (StatusCode::CREATED, Json(movements)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id: MovementId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid movement id"),
    };

    match services.engine.movement(tenant.tenant_id(), movement_id) {
        Ok(movement) => (StatusCode::OK, Json(dto::MovementResponse::from(movement))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::MovementsQuery>,
) -> axum::response::Response {
    match services.engine.movements(tenant.tenant_id(), query.product_id) {
        Ok(movements) => {
            let movements: Vec<dto::MovementResponse> = movements.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(movements)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
