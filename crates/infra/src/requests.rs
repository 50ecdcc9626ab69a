//! Request service: opening, cancelling and confirming stock requests.
//!
//! Fulfillment itself lives in `fulfillment`; this service covers the
//! transitions a requester drives directly.

use chrono::Utc;
use tracing::{info, instrument, warn};

use medstock_core::{AggregateRoot, ExpectedVersion, RequestId, TenantId};
use medstock_events::EventBus;
use medstock_inventory::{
    ConfirmationDecision, InventoryError, InventoryEvent, NewRequestItem, RequestChanged, RequestConfirmed,
    RequestStatus, StockMovementRequest,
};

use crate::error::LedgerError;
use crate::event_bus::{JsonEnvelope, publish_all};
use crate::ledger::{LedgerStore, LedgerTx};
use crate::read_model::CatalogReader;
use crate::read_model::catalog::{require_presentation, require_product};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub requested_city: String,
    pub items: Vec<NewRequestItem>,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct RequestService<S, C, B> {
    store: S,
    catalog: C,
    bus: B,
}

impl<S, C, B> RequestService<S, C, B>
where
    S: LedgerStore,
    C: CatalogReader,
    B: EventBus<JsonEnvelope>,
{
    pub fn new(store: S, catalog: C, bus: B) -> Self {
        Self { store, catalog, bus }
    }

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, city = %input.requested_city))]
    pub fn open_request(&self, tenant_id: TenantId, input: OpenRequest) -> Result<StockMovementRequest, LedgerError> {
        for item in &input.items {
            require_product(&self.catalog, tenant_id, item.product_id)?;
            if let Some(presentation_id) = item.presentation_id {
                require_presentation(&self.catalog, tenant_id, item.product_id, presentation_id)?;
            }
        }

        let request = StockMovementRequest::open(
            tenant_id,
            RequestId::new(),
            input.requested_city,
            input.items,
            input.note,
            Utc::now(),
        )?;

        self.store.transaction(tenant_id, |tx| {
            tx.insert_request(request.clone())?;
            Ok::<_, LedgerError>(())
        })?;

        info!(request_id = %request.request_id(), items = request.items().len(), "request opened");
        publish_all(&self.bus, vec![InventoryEvent::RequestOpened(RequestChanged::of(&request))])?;
        Ok(request)
    }

    pub fn get_request(&self, tenant_id: TenantId, request_id: RequestId) -> Result<StockMovementRequest, LedgerError> {
        self.store
            .request(tenant_id, request_id)?
            .ok_or_else(|| InventoryError::not_found("request", request_id).into())
    }

    /// OPEN requests addressed to `city` (case-insensitive), oldest first.
    pub fn open_requests_in(&self, tenant_id: TenantId, city: &str) -> Result<Vec<StockMovementRequest>, LedgerError> {
        let city = city.trim();
        Ok(self
            .store
            .requests(tenant_id, Some(RequestStatus::Open))?
            .into_iter()
            .filter(|r| r.requested_city().trim().eq_ignore_ascii_case(city))
            .collect())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub fn cancel_request(&self, tenant_id: TenantId, request_id: RequestId) -> Result<StockMovementRequest, LedgerError> {
        let saved = self
            .store
            .transaction(tenant_id, |tx| {
                update(tx, request_id, |request| request.cancel(Utc::now()))
            })
            .inspect_err(|e| warn!(request_id = %request_id, error = %e, "cancel rejected"))?;

        info!(request_id = %request_id, version = saved.version(), "request cancelled");
        publish_all(&self.bus, vec![InventoryEvent::RequestCancelled(RequestChanged::of(&saved))])?;
        Ok(saved)
    }

    #[instrument(skip(self, note), fields(tenant_id = %tenant_id))]
    pub fn confirm_receipt(
        &self,
        tenant_id: TenantId,
        request_id: RequestId,
        decision: ConfirmationDecision,
        note: Option<String>,
    ) -> Result<StockMovementRequest, LedgerError> {
        let saved = self
            .store
            .transaction(tenant_id, |tx| {
                update(tx, request_id, |request| request.confirm(decision, note, Utc::now()))
            })
            .inspect_err(|e| warn!(request_id = %request_id, error = %e, "confirmation rejected"))?;

        let status = saved
            .confirmation()
            .map(|c| c.status)
            .ok_or_else(|| InventoryError::invalid_request_state(request_id, saved.status(), "no confirmation recorded"))?;

        info!(request_id = %request_id, status = ?status, "receipt confirmed");
        publish_all(
            &self.bus,
            vec![InventoryEvent::RequestConfirmed(RequestConfirmed {
                request: RequestChanged::of(&saved),
                status,
            })],
        )?;
        Ok(saved)
    }
}

/// Load, mutate and save a request at the version that was loaded.
fn update<F>(tx: &mut dyn LedgerTx, request_id: RequestId, change: F) -> Result<StockMovementRequest, LedgerError>
where
    F: FnOnce(&mut StockMovementRequest) -> Result<(), InventoryError>,
{
    let mut request = tx
        .load_request(request_id)
        .ok_or_else(|| InventoryError::not_found("request", request_id))?;
    let expected = ExpectedVersion::Exact(request.version());
    change(&mut request)?;
    Ok(tx.save_request(request, expected)?)
}
