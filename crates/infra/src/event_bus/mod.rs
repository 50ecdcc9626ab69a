//! Post-commit publication of inventory events.
//!
//! The bus abstraction lives in `medstock-events` as pure mechanics. This
//! module turns typed `InventoryEvent`s into the JSON envelopes published on
//! it. Callers invoke it only after the owning transaction has committed.

use serde_json::Value as JsonValue;

use medstock_events::{EventBus, EventEnvelope};
use medstock_inventory::InventoryEvent;

use crate::error::LedgerError;

/// Envelope shape carried on the bus.
pub type JsonEnvelope = EventEnvelope<JsonValue>;

pub fn to_json_envelope(event: InventoryEvent) -> Result<JsonEnvelope, LedgerError> {
    let envelope = event.into_envelope();
    let payload = serde_json::to_value(envelope.payload())
        .map_err(|e| LedgerError::Publish(format!("serialize {}: {e}", envelope.event_type())))?;
    Ok(envelope.map_payload(|_| payload))
}

/// Publish in order; stops at the first failure.
pub fn publish_all<B>(bus: &B, events: Vec<InventoryEvent>) -> Result<(), LedgerError>
where
    B: EventBus<JsonEnvelope> + ?Sized,
{
    for event in events {
        let envelope = to_json_envelope(event)?;
        bus.publish(envelope)
            .map_err(|e| LedgerError::Publish(format!("{e:?}")))?;
    }
    Ok(())
}
