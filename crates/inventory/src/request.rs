//! Cross-location stock request and its lifecycle.
//!
//! ```text
//! OPEN ──(all items remaining == 0)──▶ FULFILLED ──confirm──▶ ACCEPTED | REJECTED
//!   └──cancel──▶ CANCELLED
//! ```
//!
//! Remaining quantities are in each item's own unit (presentation count, or
//! base units when the item has no presentation) and never increase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medstock_core::{AggregateRoot, PresentationId, ProductId, Quantity, RequestId, RequestItemId, TenantId};

use crate::error::{InventoryError, InventoryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    Fulfilled,
    Cancelled,
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::Fulfilled => "FULFILLED",
            RequestStatus::Cancelled => "CANCELLED",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// The requester's answer once goods have arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationDecision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub status: ConfirmationStatus,
    pub note: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub id: RequestItemId,
    pub product_id: ProductId,
    pub presentation_id: Option<PresentationId>,
    pub requested_quantity: Quantity,
    pub remaining_quantity: Quantity,
}

/// Line as entered by the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequestItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub presentation_id: Option<PresentationId>,
    pub quantity: Quantity,
}

/// What a fulfillment pass did to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Fulfilled,
    PartiallyFulfilled,
    Untouched,
}

/// Aggregate root: StockMovementRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRequest {
    id: RequestId,
    tenant_id: TenantId,
    requested_city: String,
    note: Option<String>,
    status: RequestStatus,
    confirmation: Option<Confirmation>,
    items: Vec<RequestItem>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StockMovementRequest {
    /// A new OPEN request at version 1.
    pub fn open(
        tenant_id: TenantId,
        id: RequestId,
        requested_city: impl Into<String>,
        items: Vec<NewRequestItem>,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> InventoryResult<Self> {
        let requested_city = requested_city.into();
        if requested_city.trim().is_empty() {
            return Err(InventoryError::validation("requested city cannot be empty"));
        }
        if items.is_empty() {
            return Err(InventoryError::validation("request must contain at least one item"));
        }

        let items = items
            .into_iter()
            .map(|item| {
                if !item.quantity.is_positive() {
                    return Err(InventoryError::invalid_quantity(format!(
                        "requested quantity for product {} must be positive, got {}",
                        item.product_id, item.quantity
                    )));
                }
                Ok(RequestItem {
                    id: RequestItemId::new(),
                    product_id: item.product_id,
                    presentation_id: item.presentation_id,
                    requested_quantity: item.quantity,
                    remaining_quantity: item.quantity,
                })
            })
            .collect::<InventoryResult<Vec<_>>>()?;

        Ok(Self {
            id,
            tenant_id,
            requested_city,
            note,
            status: RequestStatus::Open,
            confirmation: None,
            items,
            version: 1,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn request_id(&self) -> RequestId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn requested_city(&self) -> &str {
        &self.requested_city
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn confirmation(&self) -> Option<&Confirmation> {
        self.confirmation.as_ref()
    }

    pub fn items(&self) -> &[RequestItem] {
        &self.items
    }

    pub fn item(&self, item_id: RequestItemId) -> Option<&RequestItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_outstanding(&self) -> bool {
        self.items.iter().any(|i| i.remaining_quantity.is_positive())
    }

    pub fn ensure_open(&self) -> InventoryResult<()> {
        if self.status != RequestStatus::Open {
            return Err(InventoryError::invalid_request_state(
                self.id,
                self.status,
                "only OPEN requests can be fulfilled",
            ));
        }
        Ok(())
    }

    /// Reduce an item's remaining quantity (item unit).
    pub fn record_fulfillment(&mut self, item_id: RequestItemId, decrement: Quantity) -> InventoryResult<()> {
        self.ensure_open()?;
        if decrement.is_negative() {
            return Err(InventoryError::invalid_quantity(format!(
                "fulfilled quantity cannot be negative, got {decrement}"
            )));
        }

        let request_id = self.id;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| InventoryError::not_found("request item", item_id))?;

        if decrement > item.remaining_quantity {
            return Err(InventoryError::conflict(
                "request",
                request_id,
                format!(
                    "item {item_id} has {} remaining, cannot fulfill {decrement}",
                    item.remaining_quantity
                ),
            ));
        }

        item.remaining_quantity = item
            .remaining_quantity
            .checked_sub(decrement)
            .unwrap_or(Quantity::ZERO);
        Ok(())
    }

    /// Close the request if nothing is outstanding.
    ///
    /// `touched` tells whether any item was decremented in this pass; it only
    /// affects the reported outcome.
    pub fn settle(&mut self, touched: bool, at: DateTime<Utc>) -> Settlement {
        if self.status != RequestStatus::Open {
            return Settlement::Untouched;
        }
        if !self.has_outstanding() {
            self.status = RequestStatus::Fulfilled;
            self.confirmation = Some(Confirmation {
                status: ConfirmationStatus::Pending,
                note: None,
                decided_at: None,
            });
            self.updated_at = at;
            return Settlement::Fulfilled;
        }
        if touched {
            self.updated_at = at;
            Settlement::PartiallyFulfilled
        } else {
            Settlement::Untouched
        }
    }

    /// OPEN → CANCELLED; zeroes every remaining quantity.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> InventoryResult<()> {
        if self.status != RequestStatus::Open {
            return Err(InventoryError::invalid_request_state(
                self.id,
                self.status,
                "only OPEN requests can be cancelled",
            ));
        }
        for item in &mut self.items {
            item.remaining_quantity = Quantity::ZERO;
        }
        self.status = RequestStatus::Cancelled;
        self.updated_at = at;
        Ok(())
    }

    /// Record the requester's receipt decision. Allowed once, on FULFILLED requests.
    pub fn confirm(
        &mut self,
        decision: ConfirmationDecision,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> InventoryResult<()> {
        let pending = matches!(
            (&self.status, &self.confirmation),
            (RequestStatus::Fulfilled, Some(Confirmation { status: ConfirmationStatus::Pending, .. }))
        );
        if !pending {
            return Err(InventoryError::invalid_request_state(
                self.id,
                self.status,
                "receipt can only be confirmed once, after fulfillment",
            ));
        }

        self.confirmation = Some(Confirmation {
            status: match decision {
                ConfirmationDecision::Accept => ConfirmationStatus::Accepted,
                ConfirmationDecision::Reject => ConfirmationStatus::Rejected,
            },
            note,
            decided_at: Some(at),
        });
        self.updated_at = at;
        Ok(())
    }

    /// Called by the store on every successful save.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for StockMovementRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
