use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use medstock_infra::LedgerError;
use medstock_inventory::InventoryError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let status = status_of(&err);
    let details = details_of(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, code = err.code(), "request failed");
    }
    json_error_with(status, err.code(), err.to_string(), details)
}

fn status_of(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Inventory(e) => match e {
            InventoryError::InvalidQuantity { .. }
            | InventoryError::MissingLocation { .. }
            | InventoryError::MissingBatch { .. }
            | InventoryError::InvalidPresentation { .. }
            | InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
            InventoryError::NotFound { .. } => StatusCode::NOT_FOUND,
            InventoryError::InsufficientStock { .. } | InventoryError::InvalidRequestState { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            InventoryError::ConcurrentModification { .. } => StatusCode::CONFLICT,
            InventoryError::TenantIsolation(_) => StatusCode::FORBIDDEN,
        },
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LedgerError::Publish(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Structured fields of the failure, for clients that act on them.
fn details_of(err: &LedgerError) -> Value {
    let Some(e) = err.inventory() else {
        return json!({});
    };
    match e {
        InventoryError::InvalidQuantity { reason } => json!({ "reason": reason }),
        InventoryError::MissingLocation { movement_type, reason } => json!({
            "movementType": movement_type,
            "reason": reason,
        }),
        InventoryError::MissingBatch { movement_type } => json!({ "movementType": movement_type }),
        InventoryError::InvalidPresentation { presentation_id, reason } => json!({
            "presentationId": presentation_id,
            "reason": reason,
        }),
        InventoryError::InsufficientStock {
            location_id,
            product_id,
            batch_id,
            available,
            requested,
            shortfall,
        } => json!({
            "locationId": location_id,
            "productId": product_id,
            "batchId": batch_id,
            "available": available,
            "requested": requested,
            "shortfall": shortfall,
        }),
        InventoryError::InvalidRequestState { request_id, status, reason } => json!({
            "requestId": request_id,
            "status": status,
            "reason": reason,
        }),
        InventoryError::ConcurrentModification { entity, id, reason } => json!({
            "entity": entity,
            "id": id,
            "reason": reason,
        }),
        InventoryError::NotFound { entity, id } => json!({ "entity": entity, "id": id }),
        InventoryError::Validation(_) | InventoryError::TenantIsolation(_) => json!({}),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    json_error_with(status, code, message, json!({}))
}

pub fn json_error_with(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Value,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
            "details": details,
        })),
    )
        .into_response()
}

pub fn forbidden() -> axum::response::Response {
    json_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        "stock write permission required",
    )
}

#[cfg(test)]
mod tests {
    use medstock_core::{LocationId, ProductId, Quantity};
    use medstock_infra::StoreError;

    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (LedgerError::from(InventoryError::invalid_quantity("zero")), StatusCode::BAD_REQUEST),
            (LedgerError::from(InventoryError::not_found("batch", "b-1")), StatusCode::NOT_FOUND),
            (
                LedgerError::from(InventoryError::conflict("request", "r-1", "stale")),
                StatusCode::CONFLICT,
            ),
            (LedgerError::from(StoreError::Unavailable("down".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (LedgerError::Publish("bus closed".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(status_of(&err), status, "{err}");
        }
    }

    #[test]
    fn insufficient_stock_details_carry_the_shortfall() {
        let err = LedgerError::from(InventoryError::InsufficientStock {
            location_id: LocationId::new(),
            product_id: ProductId::new(),
            batch_id: None,
            available: Quantity::units(4),
            requested: Quantity::units(10),
            shortfall: Quantity::units(6),
        });
        assert_eq!(status_of(&err), StatusCode::UNPROCESSABLE_ENTITY);
        let details = details_of(&err);
        assert_eq!(details["shortfall"], "6");
        assert!(details["batchId"].is_null());
    }
}
