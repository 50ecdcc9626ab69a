//! Bulk fulfillment: serve many OPEN requests from one source location.
//!
//! Two steps, usable separately:
//!
//! - `plan` / `plan_supplied` read committed state and produce a
//!   `FulfillmentPlan` (computed FEFO allocation, or a caller's allocation
//!   checked against demand and stock). Nothing is written.
//! - `execute` applies a plan in ONE transaction. A plan may have round-tripped
//!   through a client, so only its request versions and lines are read: the
//!   selection is re-checked, every line is re-validated against outstanding
//!   demand, and settlements and coverage are recomputed. The requests must
//!   still be at the versions the plan saw and every source batch must still
//!   hold what the plan takes from it, otherwise the whole operation aborts
//!   with `ConcurrentModification`. Events are published after commit.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use medstock_core::{
    AggregateRoot, ExpectedVersion, LocationId, Quantity, RequestId, RequestItemId, TenantId,
};
use medstock_events::EventBus;
use medstock_inventory::{
    BalanceKey, Demand, FulfillmentPlan, InventoryError, InventoryEvent, MovementReference,
    MovementType, NewMovement, PlannedRequest, RequestChanged, RequestFulfillment, RequestItem,
    Settlement, StockMovement, StockMovementRequest, SuppliedFulfillment, UnitOfMeasure,
    plan_allocation, review_lines, validate_supplied,
};

use crate::batch_registry::snapshot_at;
use crate::error::LedgerError;
use crate::event_bus::{JsonEnvelope, publish_all};
use crate::ledger::{LedgerStore, LedgerTx};
use crate::movement_engine::{MovementEngine, recorded_event};
use crate::read_model::CatalogReader;
use crate::read_model::catalog::{require_location, warehouse_of};

/// Reference type stamped on every transfer a fulfillment creates.
pub const REQUEST_REFERENCE_TYPE: &str = "STOCK_MOVEMENT_REQUEST";

/// What to do when the source cannot cover every selected item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CoveragePolicy {
    /// Move what is available; short items stay outstanding.
    #[default]
    AllowPartial,
    /// Any product shortfall is `InsufficientStock` before anything is written.
    RequireFull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFulfillmentInput {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    /// Selection order is service order.
    pub request_ids: Vec<RequestId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppliedPlanInput {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub fulfillments: Vec<SuppliedFulfillment>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFulfillmentOutcome {
    pub movements: Vec<StockMovement>,
    /// Selected requests after the operation, in plan order.
    pub requests: Vec<StockMovementRequest>,
}

#[derive(Debug)]
pub struct BulkFulfillmentService<S, C, B> {
    engine: MovementEngine<S, C, B>,
}

impl<S, C, B> BulkFulfillmentService<S, C, B>
where
    S: LedgerStore,
    C: CatalogReader,
    B: EventBus<JsonEnvelope>,
{
    pub fn new(engine: MovementEngine<S, C, B>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &MovementEngine<S, C, B> {
        &self.engine
    }

    /// FEFO allocation of the selected requests' outstanding items.
    #[instrument(
        skip(self, input),
        fields(tenant_id = %tenant_id, requests = input.request_ids.len())
    )]
    pub fn plan(&self, tenant_id: TenantId, input: BulkFulfillmentInput) -> Result<FulfillmentPlan, LedgerError> {
        let selection = self.select(tenant_id, input.from_location_id, input.to_location_id, &input.request_ids)?;
        let snapshot = snapshot_at(self.engine.store(), self.engine.catalog(), tenant_id, input.from_location_id)?;
        let allocation = plan_allocation(&selection.demands, &snapshot)?;

        let plan = FulfillmentPlan::new(
            input.from_location_id,
            input.to_location_id,
            selection.planned,
            allocation,
            input.note,
        );
        info!(
            lines = plan.lines.len(),
            fully_covered = plan.is_fully_covered(),
            "bulk fulfillment planned"
        );
        Ok(plan)
    }

    /// Check a caller-chosen allocation and turn it into a plan.
    #[instrument(
        skip(self, input),
        fields(tenant_id = %tenant_id, requests = input.fulfillments.len())
    )]
    pub fn plan_supplied(&self, tenant_id: TenantId, input: SuppliedPlanInput) -> Result<FulfillmentPlan, LedgerError> {
        let mut seen = HashSet::new();
        let request_ids: Vec<RequestId> = input
            .fulfillments
            .iter()
            .map(|f| f.request_id)
            .filter(|id| seen.insert(*id))
            .collect();

        let selection = self.select(tenant_id, input.from_location_id, input.to_location_id, &request_ids)?;
        let snapshot = snapshot_at(self.engine.store(), self.engine.catalog(), tenant_id, input.from_location_id)?;
        let allocation = validate_supplied(
            input.from_location_id,
            &selection.demands,
            &snapshot,
            &input.fulfillments,
        )
        .inspect_err(|e| warn!(error = %e, "supplied allocation rejected"))?;

        Ok(FulfillmentPlan::new(
            input.from_location_id,
            input.to_location_id,
            selection.planned,
            allocation,
            input.note,
        ))
    }

    /// Apply `plan` atomically.
    #[instrument(
        skip(self, plan),
        fields(tenant_id = %tenant_id, lines = plan.lines.len(), policy = ?policy)
    )]
    pub fn execute(
        &self,
        tenant_id: TenantId,
        plan: FulfillmentPlan,
        policy: CoveragePolicy,
    ) -> Result<BulkFulfillmentOutcome, LedgerError> {
        check_plan_shape(&plan)?;
        let plan = self
            .review(tenant_id, plan)
            .inspect_err(|e| warn!(error = %e, "plan rejected on review"))?;
        if policy == CoveragePolicy::RequireFull {
            plan.require_full_coverage()
                .inspect_err(|e| warn!(error = %e, "plan does not cover every item"))?;
        }

        let now = Utc::now();
        let (movements, settled) = self
            .engine
            .store()
            .transaction(tenant_id, |tx| self.execute_in(tx, &plan, now))
            .inspect_err(|e| warn!(error = %e, "bulk fulfillment rolled back"))?;

        let mut events: Vec<InventoryEvent> = movements.iter().map(recorded_event).collect();
        for (request, settlement) in &settled {
            let fulfillment = || RequestFulfillment {
                request: RequestChanged::of(request),
                from_location_id: plan.from_location_id,
                to_location_id: plan.to_location_id,
            };
            match settlement {
                Settlement::Fulfilled => events.push(InventoryEvent::RequestFulfilled(fulfillment())),
                Settlement::PartiallyFulfilled => {
                    events.push(InventoryEvent::RequestPartiallyFulfilled(fulfillment()))
                }
                Settlement::Untouched => {}
            }
        }

        let fulfilled = settled
            .iter()
            .filter(|(_, s)| *s == Settlement::Fulfilled)
            .count();
        info!(
            movements = movements.len(),
            requests = settled.len(),
            fulfilled,
            "bulk fulfillment committed"
        );
        publish_all(self.engine.bus(), events)?;

        Ok(BulkFulfillmentOutcome {
            movements,
            requests: settled.into_iter().map(|(r, _)| r).collect(),
        })
    }

    /// Plan with FEFO allocation, then execute.
    pub fn bulk_fulfill(
        &self,
        tenant_id: TenantId,
        input: BulkFulfillmentInput,
        policy: CoveragePolicy,
    ) -> Result<BulkFulfillmentOutcome, LedgerError> {
        let plan = self.plan(tenant_id, input)?;
        self.execute(tenant_id, plan, policy)
    }

    /// Rebuild `plan` from current state, keeping only its versions and lines.
    fn review(&self, tenant_id: TenantId, plan: FulfillmentPlan) -> Result<FulfillmentPlan, LedgerError> {
        for planned in &plan.requests {
            let request = self
                .engine
                .store()
                .request(tenant_id, planned.request_id)?
                .ok_or_else(|| InventoryError::not_found("request", planned.request_id))?;
            if request.version() != planned.version {
                return Err(stale(planned, request.version()));
            }
        }

        let request_ids: Vec<RequestId> = plan.requests.iter().map(|r| r.request_id).collect();
        let selection = self.select(tenant_id, plan.from_location_id, plan.to_location_id, &request_ids)?;
        let snapshot = snapshot_at(self.engine.store(), self.engine.catalog(), tenant_id, plan.from_location_id)?;
        let allocation = review_lines(&selection.demands, &snapshot, &plan.lines)?;

        Ok(FulfillmentPlan::new(
            plan.from_location_id,
            plan.to_location_id,
            selection.planned,
            allocation,
            plan.note,
        ))
    }

    fn select(
        &self,
        tenant_id: TenantId,
        from: LocationId,
        to: LocationId,
        request_ids: &[RequestId],
    ) -> Result<Selection, LedgerError> {
        if from == to {
            return Err(InventoryError::missing_location(
                MovementType::Transfer,
                "source and destination must differ",
            )
            .into());
        }
        let catalog = self.engine.catalog();
        require_location(catalog, tenant_id, from)?;
        let destination = require_location(catalog, tenant_id, to)?;
        let destination_warehouse = warehouse_of(catalog, tenant_id, &destination);

        if request_ids.is_empty() {
            return Err(InventoryError::validation("select at least one request").into());
        }
        let mut seen = HashSet::new();
        if let Some(dup) = request_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(InventoryError::validation(format!("request {dup} selected more than once")).into());
        }

        let mut selection = Selection::default();
        for request_id in request_ids {
            let request = self
                .engine
                .store()
                .request(tenant_id, *request_id)?
                .ok_or_else(|| InventoryError::not_found("request", request_id))?;
            request.ensure_open()?;

            let elsewhere = destination_warehouse
                .as_ref()
                .filter(|w| w.serves_city(request.requested_city()) == Some(false));
            if let Some(warehouse) = elsewhere {
                return Err(InventoryError::invalid_request_state(
                    *request_id,
                    request.status(),
                    format!(
                        "requested for {}, destination warehouse {} is elsewhere",
                        request.requested_city(),
                        warehouse.code
                    ),
                )
                .into());
            }

            for item in request.items().iter().filter(|i| i.remaining_quantity.is_positive()) {
                let unit = item_unit(catalog, tenant_id, item)?;
                selection.demands.push(Demand::for_item(*request_id, item, unit));
            }
            selection.planned.push(PlannedRequest::of(&request));
        }
        Ok(selection)
    }

    fn execute_in(
        &self,
        tx: &mut dyn LedgerTx,
        plan: &FulfillmentPlan,
        at: DateTime<Utc>,
    ) -> Result<(Vec<StockMovement>, Vec<(StockMovementRequest, Settlement)>), LedgerError> {
        let tenant_id = tx.tenant_id();

        let mut requests = Vec::with_capacity(plan.requests.len());
        for planned in &plan.requests {
            let request = tx
                .load_request(planned.request_id)
                .ok_or_else(|| InventoryError::not_found("request", planned.request_id))?;
            if request.version() != planned.version {
                return Err(stale(planned, request.version()));
            }
            request.ensure_open()?;
            requests.push(request);
        }

        for (product_id, batch_id, planned) in plan.per_batch_totals()? {
            let on_hand = tx.balance(&BalanceKey::new(plan.from_location_id, product_id, batch_id));
            if on_hand < planned {
                return Err(InventoryError::conflict(
                    "batch",
                    batch_id,
                    format!(
                        "plan takes {planned} at location {}, only {on_hand} on hand",
                        plan.from_location_id
                    ),
                )
                .into());
            }
        }

        let mut movements = Vec::with_capacity(plan.lines.len());
        let mut allocated: HashMap<(RequestId, RequestItemId), Quantity> = HashMap::new();
        for line in &plan.lines {
            let transfer = NewMovement::transfer(
                line.product_id,
                line.batch_id,
                plan.from_location_id,
                plan.to_location_id,
                line.quantity,
            )?
            .with_reference(MovementReference::new(REQUEST_REFERENCE_TYPE, line.request_id))
            .with_note(plan.note.clone());
            movements.push(self.engine.apply_in(tx, transfer, at)?);

            let total = allocated
                .entry((line.request_id, line.item_id))
                .or_insert(Quantity::ZERO);
            *total = total
                .checked_add(line.quantity)
                .ok_or_else(|| InventoryError::invalid_quantity("allocated total overflow"))?;
        }

        let catalog = self.engine.catalog();
        let mut settled = Vec::with_capacity(requests.len());
        for (mut request, planned) in requests.into_iter().zip(&plan.requests) {
            let request_id = planned.request_id;
            let mut touched = false;
            let items: Vec<RequestItem> = request.items().to_vec();
            for item in &items {
                let Some(base) = allocated.get(&(request_id, item.id)).copied() else {
                    continue;
                };
                let demand = Demand::for_item(request_id, item, item_unit(catalog, tenant_id, item)?);
                let decrement = demand.decrement_for(base)?;
                request.record_fulfillment(item.id, decrement)?;
                touched |= decrement.is_positive();
            }

            match request.settle(touched, at) {
                Settlement::Untouched => settled.push((request, Settlement::Untouched)),
                settlement => {
                    let saved = tx.save_request(request, ExpectedVersion::Exact(planned.version))?;
                    settled.push((saved, settlement));
                }
            }
        }

        Ok((movements, settled))
    }
}

#[derive(Default)]
struct Selection {
    planned: Vec<PlannedRequest>,
    demands: Vec<Demand>,
}

fn stale(planned: &PlannedRequest, found: u64) -> LedgerError {
    InventoryError::conflict(
        "request",
        planned.request_id,
        format!("planned at version {}, now at {found}", planned.version),
    )
    .into()
}

/// Lines must belong to the plan's requests and differ in source/destination.
fn check_plan_shape(plan: &FulfillmentPlan) -> Result<(), LedgerError> {
    if plan.from_location_id == plan.to_location_id {
        return Err(InventoryError::missing_location(
            MovementType::Transfer,
            "source and destination must differ",
        )
        .into());
    }
    let selected: HashSet<RequestId> = plan.requests.iter().map(|r| r.request_id).collect();
    if let Some(line) = plan.lines.iter().find(|l| !selected.contains(&l.request_id)) {
        return Err(InventoryError::validation(format!(
            "plan line for batch {} references unselected request {}",
            line.batch_id, line.request_id
        ))
        .into());
    }
    Ok(())
}

/// Unit a request item is counted in.
///
/// The presentation only has to exist and belong to the item's product; a
/// presentation retired after the request was opened still converts.
fn item_unit<C>(catalog: &C, tenant_id: TenantId, item: &RequestItem) -> Result<UnitOfMeasure, LedgerError>
where
    C: CatalogReader + ?Sized,
{
    let Some(presentation_id) = item.presentation_id else {
        return Ok(UnitOfMeasure::Base);
    };
    let presentation = catalog
        .presentation(tenant_id, presentation_id)
        .filter(|p| p.tenant_id == tenant_id && p.product_id == item.product_id)
        .ok_or_else(|| {
            InventoryError::invalid_presentation(
                presentation_id,
                format!("not a presentation of product {}", item.product_id),
            )
        })?;
    Ok(UnitOfMeasure::of(&presentation)?)
}
