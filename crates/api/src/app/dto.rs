use serde::{Deserialize, Serialize};

use medstock_core::{BatchId, LocationId, PresentationId, ProductId, Quantity, RequestId};
use medstock_infra::{BulkFulfillmentInput, FefoIssue, OpenRequest, SuppliedPlanInput};
use medstock_inventory::{
    ConfirmationDecision, FulfillmentPlan, MovementDraft, MovementReference, MovementType, NewRequestItem,
    StockMovement, StockMovementRequest, SuppliedFulfillment,
};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub product_id: ProductId,
    pub batch_id: Option<BatchId>,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    /// Base units, or a presentation count when `presentationId` is set.
    pub quantity: Quantity,
    pub presentation_id: Option<PresentationId>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

impl MovementRequest {
    pub fn into_draft(self) -> MovementDraft {
        MovementDraft {
            movement_type: self.movement_type,
            product_id: self.product_id,
            batch_id: self.batch_id,
            from_location_id: self.from_location_id,
            to_location_id: self.to_location_id,
            quantity: self.quantity,
            presentation_id: self.presentation_id,
            reference: MovementReference {
                reference_type: self.reference_type,
                reference_id: self.reference_id,
            },
            note: self.note,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: Quantity,
    pub presentation_id: Option<PresentationId>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

impl IssueRequest {
    pub fn into_issue(self) -> FefoIssue {
        FefoIssue {
            product_id: self.product_id,
            location_id: self.location_id,
            quantity: self.quantity,
            presentation_id: self.presentation_id,
            reference: MovementReference {
                reference_type: self.reference_type,
                reference_id: self.reference_id,
            },
            note: self.note,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesQuery {
    pub location_id: LocationId,
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsQuery {
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableBatchesQuery {
    pub product_id: ProductId,
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequestBody {
    pub requested_city: String,
    pub items: Vec<NewRequestItem>,
    pub note: Option<String>,
}

impl From<OpenRequestBody> for OpenRequest {
    fn from(body: OpenRequestBody) -> Self {
        OpenRequest {
            requested_city: body.requested_city,
            items: body.items,
            note: body.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationBody {
    pub decision: ConfirmationDecision,
    pub note: Option<String>,
}

/// Body of both bulk-fulfill routes.
///
/// Exactly one source of allocation is used, first match wins: a reviewed
/// `plan` (execute only), caller-supplied `fulfillments`, or `requestIds`
/// for a server-computed FEFO plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFulfillBody {
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub request_ids: Vec<RequestId>,
    #[serde(default)]
    pub fulfillments: Vec<SuppliedFulfillment>,
    pub plan: Option<FulfillmentPlan>,
    pub note: Option<String>,
    #[serde(default)]
    pub require_full_coverage: bool,
}

/// Allocation source resolved from a `BulkFulfillBody`.
#[derive(Debug)]
pub enum PlanSource {
    Reviewed(FulfillmentPlan),
    Supplied(SuppliedPlanInput),
    Computed(BulkFulfillmentInput),
}

impl BulkFulfillBody {
    pub fn into_source(self) -> Result<PlanSource, &'static str> {
        if let Some(plan) = self.plan {
            return Ok(PlanSource::Reviewed(plan));
        }
        let (Some(from_location_id), Some(to_location_id)) = (self.from_location_id, self.to_location_id) else {
            return Err("fromLocationId and toLocationId are required");
        };
        if !self.fulfillments.is_empty() {
            return Ok(PlanSource::Supplied(SuppliedPlanInput {
                from_location_id,
                to_location_id,
                fulfillments: self.fulfillments,
                note: self.note,
            }));
        }
        if !self.request_ids.is_empty() {
            return Ok(PlanSource::Computed(BulkFulfillmentInput {
                from_location_id,
                to_location_id,
                request_ids: self.request_ids,
                note: self.note,
            }));
        }
        Err("provide fulfillments or requestIds")
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub display_number: String,
}

impl From<StockMovement> for MovementResponse {
    fn from(movement: StockMovement) -> Self {
        Self {
            display_number: movement.display_number(),
            movement,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFulfillResponse {
    pub movements: Vec<MovementResponse>,
    pub requests: Vec<StockMovementRequest>,
}
