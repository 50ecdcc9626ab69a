use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use medstock_infra::CoveragePolicy;

use crate::app::dto::{self, PlanSource};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{TenantContext, WriteAccess};

/// Read-only: compute or check an allocation and return the plan.
pub async fn plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::BulkFulfillBody>,
) -> axum::response::Response {
    let planned = match body.into_source() {
        Ok(PlanSource::Reviewed(_)) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_failed",
                "a reviewed plan can only be executed",
            );
        }
        Ok(PlanSource::Supplied(input)) => services.fulfillment.plan_supplied(tenant.tenant_id(), input),
        Ok(PlanSource::Computed(input)) => services.fulfillment.plan(tenant.tenant_id(), input),
        Err(message) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_failed", message),
    };

    match planned {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn execute(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(write): Extension<WriteAccess>,
    Json(body): Json<dto::BulkFulfillBody>,
) -> axum::response::Response {
    if !write.can_write_stock() {
        return errors::forbidden();
    }

    let policy = if body.require_full_coverage {
        CoveragePolicy::RequireFull
    } else {
        CoveragePolicy::AllowPartial
    };
    let tenant_id = tenant.tenant_id();
    let fulfillment = &services.fulfillment;

    let plan = match body.into_source() {
        // Only the versions and lines of a reviewed plan are kept; the rest is recomputed.
        Ok(PlanSource::Reviewed(plan)) => Ok(plan),
        Ok(PlanSource::Supplied(input)) => fulfillment.plan_supplied(tenant_id, input),
        Ok(PlanSource::Computed(input)) => fulfillment.plan(tenant_id, input),
        Err(message) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_failed", message),
    };

    match plan.and_then(|plan| fulfillment.execute(tenant_id, plan, policy)) {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(dto::BulkFulfillResponse {
                movements: outcome.movements.into_iter().map(Into::into).collect(),
                requests: outcome.requests,
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
