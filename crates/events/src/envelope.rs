use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medstock_core::TenantId;

/// Envelope for a published event: tenant + stream metadata around a payload.
///
/// Notes:
/// - **Multi-tenancy** is enforced here via `tenant_id`; consumers must never
///   act on an envelope outside its tenant.
/// - `stream_id` names the record the event is about (a movement, a request).
/// - `sequence` is monotonically increasing within one stream (the movement
///   number for movements, the saved version for requests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    tenant_id: TenantId,

    stream_id: Uuid,
    stream_type: String,
    sequence: u64,

    event_type: String,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: Uuid,
        tenant_id: TenantId,
        stream_id: Uuid,
        stream_type: impl Into<String>,
        sequence: u64,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            tenant_id,
            stream_id,
            stream_type: stream_type.into(),
            sequence,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Swap the payload while keeping all metadata (e.g. typed → JSON).
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            tenant_id: self.tenant_id,
            stream_id: self.stream_id,
            stream_type: self.stream_type,
            sequence: self.sequence,
            event_type: self.event_type,
            occurred_at: self.occurred_at,
            payload: f(self.payload),
        }
    }
}
