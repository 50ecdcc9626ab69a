//! Inventory error taxonomy.
//!
//! Every variant carries the identifiers a caller needs to act on the failure;
//! `InsufficientStock` additionally carries the exact shortfall so a UI can
//! offer to split the request.

use thiserror::Error;

use medstock_core::{BatchId, LocationId, PresentationId, ProductId, Quantity, RequestId};

use crate::movement::MovementType;
use crate::request::RequestStatus;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// Non-positive (or, for adjustments, zero) quantity; raised before any ledger access.
    #[error("invalid quantity: {reason}")]
    InvalidQuantity { reason: String },

    /// The location combination does not fit the movement type.
    #[error("invalid locations for {movement_type} movement: {reason}")]
    MissingLocation {
        movement_type: MovementType,
        reason: String,
    },

    /// A movement that must touch a concrete batch arrived without one.
    #[error("{movement_type} movement requires a batch")]
    MissingBatch { movement_type: MovementType },

    /// Presentation unusable for conversion (non-positive multiple, wrong product, inactive).
    #[error("invalid presentation {presentation_id}: {reason}")]
    InvalidPresentation {
        presentation_id: PresentationId,
        reason: String,
    },

    /// Applying the movement would drive a balance negative.
    #[error(
        "insufficient stock of product {product_id} at location {location_id}: \
         available {available}, requested {requested}, short by {shortfall}"
    )]
    InsufficientStock {
        location_id: LocationId,
        product_id: ProductId,
        /// `None` when the shortfall spans several batches (FEFO issue, bulk coverage).
        batch_id: Option<BatchId>,
        available: Quantity,
        requested: Quantity,
        shortfall: Quantity,
    },

    #[error("request {request_id} is {status}: {reason}")]
    InvalidRequestState {
        request_id: RequestId,
        status: RequestStatus,
        reason: String,
    },

    /// State read for planning changed before the write step.
    #[error("concurrent modification of {entity} {id}: {reason}")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        reason: String,
    },

    /// Malformed input that is not a quantity or location problem.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
}

impl InventoryError {
    pub fn invalid_quantity(reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            reason: reason.into(),
        }
    }

    pub fn missing_location(movement_type: MovementType, reason: impl Into<String>) -> Self {
        Self::MissingLocation {
            movement_type,
            reason: reason.into(),
        }
    }

    pub fn invalid_presentation(presentation_id: PresentationId, reason: impl Into<String>) -> Self {
        Self::InvalidPresentation {
            presentation_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_request_state(
        request_id: RequestId,
        status: RequestStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRequestState {
            request_id,
            status,
            reason: reason.into(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString, reason: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            entity,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code, used verbatim in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity { .. } => "invalid_quantity",
            Self::MissingLocation { .. } => "missing_location",
            Self::MissingBatch { .. } => "missing_batch",
            Self::InvalidPresentation { .. } => "invalid_presentation",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidRequestState { .. } => "invalid_request_state",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Validation(_) => "validation_failed",
            Self::NotFound { .. } => "not_found",
            Self::TenantIsolation(_) => "tenant_isolation",
        }
    }
}
