use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use medstock_core::RequestId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{TenantContext, WriteAccess};

fn parse_request_id(id: &str) -> Result<RequestId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid request id"))
}

pub async fn open_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Json(body): Json<dto::OpenRequestBody>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }

    match services.requests.open_request(tenant.tenant_id(), body.into()) {
        Ok(request) => (StatusCode::CREATED, Json(request)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.requests.get_request(tenant.tenant_id(), request_id) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn open_requests_in_city(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::RequestsQuery>,
) -> axum::response::Response {
    match services.requests.open_requests_in(tenant.tenant_id(), &query.city) {
        Ok(requests) => (StatusCode::OK, Json(requests)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn cancel_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.requests.cancel_request(tenant.tenant_id(), request_id) {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn confirm_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Path(id): Path<String>,
    Json(body): Json<dto::ConfirmationBody>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }
    let request_id = match parse_request_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .requests
        .confirm_receipt(tenant.tenant_id(), request_id, body.decision, body.note)
    {
        Ok(request) => (StatusCode::OK, Json(request)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
