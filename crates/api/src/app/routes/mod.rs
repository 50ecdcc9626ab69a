use axum::{
    routing::{get, post},
    Router,
};

pub mod fulfillment;
pub mod movements;
pub mod requests;
pub mod stock;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/movements", post(movements::apply_movement).get(movements::list_movements))
        .route("/movements/issue", post(movements::issue_fefo))
        .route("/movements/:id", get(movements::get_movement))
        .route("/balances", get(stock::balances))
        .route("/batches/available", get(stock::available_batches))
        .route("/requests", post(requests::open_request).get(requests::open_requests_in_city))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/cancel", post(requests::cancel_request))
        .route("/requests/:id/confirmation", post(requests::confirm_receipt))
        .route("/bulk-fulfill/plan", post(fulfillment::plan))
        .route("/bulk-fulfill", post(fulfillment::execute))
}
