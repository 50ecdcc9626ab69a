use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medstock_core::{AggregateRoot, LocationId, RequestId, TenantId};
use medstock_events::{Event, EventEnvelope};

use crate::movement::StockMovement;
use crate::request::{ConfirmationStatus, StockMovementRequest};

/// Event: MovementRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRecorded {
    pub movement: StockMovement,
}

/// Snapshot of a request transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestChanged {
    pub tenant_id: TenantId,
    pub request_id: RequestId,
    pub version: u64,
    pub requested_city: String,
    pub occurred_at: DateTime<Utc>,
}

impl RequestChanged {
    pub fn of(request: &StockMovementRequest) -> Self {
        Self {
            tenant_id: request.tenant_id(),
            request_id: request.request_id(),
            version: request.version(),
            requested_city: request.requested_city().to_string(),
            occurred_at: request.updated_at(),
        }
    }
}

/// Event: RequestFulfilled / RequestPartiallyFulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFulfillment {
    #[serde(flatten)]
    pub request: RequestChanged,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
}

/// Event: RequestConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfirmed {
    #[serde(flatten)]
    pub request: RequestChanged,
    pub status: ConfirmationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InventoryEvent {
    MovementRecorded(MovementRecorded),
    RequestOpened(RequestChanged),
    RequestFulfilled(RequestFulfillment),
    RequestPartiallyFulfilled(RequestFulfillment),
    RequestCancelled(RequestChanged),
    RequestConfirmed(RequestConfirmed),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::MovementRecorded(_) => "inventory.movement.recorded",
            InventoryEvent::RequestOpened(_) => "inventory.request.opened",
            InventoryEvent::RequestFulfilled(_) => "inventory.request.fulfilled",
            InventoryEvent::RequestPartiallyFulfilled(_) => "inventory.request.partially_fulfilled",
            InventoryEvent::RequestCancelled(_) => "inventory.request.cancelled",
            InventoryEvent::RequestConfirmed(_) => "inventory.request.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self.subject() {
            Subject::Movement(m) => m.created_at,
            Subject::Request(r) => r.occurred_at,
        }
    }
}

enum Subject<'a> {
    Movement(&'a StockMovement),
    Request(&'a RequestChanged),
}

impl InventoryEvent {
    fn subject(&self) -> Subject<'_> {
        match self {
            InventoryEvent::MovementRecorded(e) => Subject::Movement(&e.movement),
            InventoryEvent::RequestOpened(e) | InventoryEvent::RequestCancelled(e) => Subject::Request(e),
            InventoryEvent::RequestFulfilled(e) | InventoryEvent::RequestPartiallyFulfilled(e) => {
                Subject::Request(&e.request)
            }
            InventoryEvent::RequestConfirmed(e) => Subject::Request(&e.request),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self.subject() {
            Subject::Movement(m) => m.tenant_id,
            Subject::Request(r) => r.tenant_id,
        }
    }

    /// `(stream id, stream type, sequence)`: the movement and its number, or
    /// the request and its saved version.
    pub fn stream(&self) -> (Uuid, &'static str, u64) {
        match self.subject() {
            Subject::Movement(m) => (*m.id.as_uuid(), "stock_movement", m.number.number),
            Subject::Request(r) => (*r.request_id.as_uuid(), "stock_movement_request", r.version),
        }
    }

    pub fn into_envelope(self) -> EventEnvelope<InventoryEvent> {
        let (stream_id, stream_type, sequence) = self.stream();
        EventEnvelope::new(
            Uuid::now_v7(),
            self.tenant_id(),
            stream_id,
            stream_type,
            sequence,
            self.event_type(),
            self.occurred_at(),
            self,
        )
    }
}
