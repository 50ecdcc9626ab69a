//! Movement engine: validates and applies single stock movements.
//!
//! ```text
//! MovementDraft
//!   ↓ validate (quantity, then location shape)      no transaction yet
//! NewMovement
//!   ↓ catalog checks, unit normalisation, batch     inside the transaction
//! ResolvedMovement
//!   ↓ ledger deltas (debit before credit), number, record
//! StockMovement
//!   ↓ commit, then publish
//! ```
//!
//! `apply_in` runs the middle steps against a caller's open transaction so
//! that bulk fulfillment can compose many movements into one commit.

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use medstock_core::{LocationId, MovementId, PresentationId, ProductId, Quantity, TenantId};
use medstock_events::EventBus;
use medstock_inventory::{
    BalanceKey, InventoryBalance, InventoryError, InventoryEvent, MovementDraft, MovementKind,
    MovementNumber, MovementQuantity, MovementRecorded, MovementReference, MovementType,
    NewMovement, StockMovement, numbering_year, to_base_units, validate_quantity,
};

use crate::batch_registry::available_in_tx;
use crate::error::LedgerError;
use crate::event_bus::{JsonEnvelope, publish_all};
use crate::ledger::{BalanceFilter, LedgerStore, LedgerTx};
use crate::read_model::CatalogReader;
use crate::read_model::catalog::{require_batch, require_location, require_presentation, require_product};

/// OUT drawn across batches in FEFO order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FefoIssue {
    pub product_id: ProductId,
    pub location_id: LocationId,
    /// Presentation count when `presentation_id` is set, base units otherwise.
    pub quantity: Quantity,
    pub presentation_id: Option<PresentationId>,
    pub reference: MovementReference,
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct MovementEngine<S, C, B> {
    store: S,
    catalog: C,
    bus: B,
}

impl<S, C, B> MovementEngine<S, C, B> {
    pub fn new(store: S, catalog: C, bus: B) -> Self {
        Self { store, catalog, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, C, B> MovementEngine<S, C, B>
where
    S: LedgerStore,
    C: CatalogReader,
    B: EventBus<JsonEnvelope>,
{
    /// Validate and apply one movement in its own transaction.
    #[instrument(
        skip(self, draft),
        fields(
            tenant_id = %tenant_id,
            movement_type = %draft.movement_type,
            product_id = %draft.product_id
        )
    )]
    pub fn apply_movement(&self, tenant_id: TenantId, draft: MovementDraft) -> Result<StockMovement, LedgerError> {
        let movement = draft.validate().inspect_err(|e| warn!(error = %e, "movement rejected"))?;

        let now = Utc::now();
        let recorded = self
            .store
            .transaction(tenant_id, |tx| self.apply_in(tx, movement, now))
            .inspect_err(|e| warn!(error = %e, "movement rolled back"))?;

        info!(
            number = %recorded.number,
            batch_id = %recorded.batch_id,
            quantity = %recorded.quantity,
            "movement recorded"
        );
        publish_all(&self.bus, vec![recorded_event(&recorded)])?;
        Ok(recorded)
    }

    /// Issue `quantity` from a location, drawing batches in FEFO order.
    ///
    /// Produces one OUT per batch touched. If the location cannot cover the
    /// whole quantity nothing is written and the total shortfall is reported.
    #[instrument(
        skip(self, issue),
        fields(tenant_id = %tenant_id, product_id = %issue.product_id, location_id = %issue.location_id)
    )]
    pub fn issue_fefo(&self, tenant_id: TenantId, issue: FefoIssue) -> Result<Vec<StockMovement>, LedgerError> {
        validate_quantity(MovementType::Out, issue.quantity)?;

        let now = Utc::now();
        let movements = self
            .store
            .transaction(tenant_id, |tx| self.issue_fefo_in(tx, issue, now))
            .inspect_err(|e| warn!(error = %e, "fefo issue rolled back"))?;

        info!(movements = movements.len(), "fefo issue recorded");
        publish_all(&self.bus, movements.iter().map(recorded_event).collect())?;
        Ok(movements)
    }
}

impl<S, C, B> MovementEngine<S, C, B>
where
    C: CatalogReader,
{
    /// Apply a validated movement inside an open transaction.
    ///
    /// Catalog ownership and location state are checked, the quantity is
    /// normalised to base units, and an OUT without a batch is pinned to the
    /// FEFO head at its source location.
    pub fn apply_in(
        &self,
        tx: &mut dyn LedgerTx,
        movement: NewMovement,
        at: DateTime<Utc>,
    ) -> Result<StockMovement, LedgerError> {
        let tenant_id = tx.tenant_id();
        let product_id = movement.product_id;

        require_product(&self.catalog, tenant_id, product_id)?;
        for location_id in movement.kind.locations() {
            require_location(&self.catalog, tenant_id, location_id)?;
        }

        let base = self.base_quantity(tenant_id, product_id, movement.quantity)?;

        let batch_id = match (movement.batch_id, movement.kind) {
            (Some(batch_id), _) => require_batch(&self.catalog, tenant_id, product_id, batch_id)?.id,
            (None, MovementKind::Out { from }) => {
                let head = available_in_tx(tx, &self.catalog, product_id, from)?
                    .into_iter()
                    .next()
                    .ok_or(InventoryError::InsufficientStock {
                        location_id: from,
                        product_id,
                        batch_id: None,
                        available: Quantity::ZERO,
                        requested: base.abs(),
                        shortfall: base.abs(),
                    })?;
                head.batch_id
            }
            (None, kind) => {
                return Err(InventoryError::MissingBatch {
                    movement_type: kind.movement_type(),
                }
                .into());
            }
        };

        let resolved = movement.resolve(batch_id, base)?;
        for (location_id, delta) in resolved.deltas() {
            tx.apply_delta(BalanceKey::new(location_id, product_id, batch_id), delta)?;
        }

        let year = numbering_year(at);
        let number = MovementNumber {
            year,
            number: tx.next_movement_number(year),
        };
        let recorded = StockMovement::record(tenant_id, number, resolved, at);
        tx.insert_movement(recorded.clone())?;
        Ok(recorded)
    }

    fn issue_fefo_in(
        &self,
        tx: &mut dyn LedgerTx,
        issue: FefoIssue,
        at: DateTime<Utc>,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let tenant_id = tx.tenant_id();
        require_product(&self.catalog, tenant_id, issue.product_id)?;
        require_location(&self.catalog, tenant_id, issue.location_id)?;

        let quantity = match issue.presentation_id {
            Some(presentation_id) => MovementQuantity::Presentations {
                presentation_id,
                count: issue.quantity,
            },
            None => MovementQuantity::BaseUnits(issue.quantity),
        };
        let required = self.base_quantity(tenant_id, issue.product_id, quantity)?;

        let batches = available_in_tx(tx, &self.catalog, issue.product_id, issue.location_id)?;
        let available = Quantity::checked_sum(batches.iter().map(|b| b.on_hand))
            .ok_or_else(|| InventoryError::invalid_quantity("on-hand total overflow"))?;
        if available < required {
            return Err(InventoryError::InsufficientStock {
                location_id: issue.location_id,
                product_id: issue.product_id,
                batch_id: None,
                available,
                requested: required,
                shortfall: required.checked_sub(available).unwrap_or(required),
            }
            .into());
        }

        let mut outstanding = required;
        let mut movements = Vec::new();
        for batch in batches {
            if !outstanding.is_positive() {
                break;
            }
            let take = outstanding.min(batch.on_hand);
            outstanding = outstanding.checked_sub(take).unwrap_or(Quantity::ZERO);

            let out = MovementDraft {
                movement_type: MovementType::Out,
                product_id: issue.product_id,
                batch_id: Some(batch.batch_id),
                from_location_id: Some(issue.location_id),
                to_location_id: None,
                quantity: take,
                presentation_id: None,
                reference: issue.reference.clone(),
                note: issue.note.clone(),
            }
            .validate()?;
            movements.push(self.apply_in(tx, out, at)?);
        }
        Ok(movements)
    }

    fn base_quantity(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: MovementQuantity,
    ) -> Result<Quantity, LedgerError> {
        match quantity {
            MovementQuantity::BaseUnits(q) => Ok(q),
            MovementQuantity::Presentations {
                presentation_id,
                count,
            } => {
                let presentation = require_presentation(&self.catalog, tenant_id, product_id, presentation_id)?;
                Ok(to_base_units(&presentation, count)?)
            }
        }
    }
}

impl<S, C, B> MovementEngine<S, C, B>
where
    S: LedgerStore,
{
    pub fn balance(&self, tenant_id: TenantId, key: &BalanceKey) -> Result<Quantity, LedgerError> {
        Ok(self.store.balance(tenant_id, key)?)
    }

    /// Positive balances at a location, optionally for one product.
    pub fn stock_at(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<InventoryBalance>, LedgerError> {
        let rows = self
            .store
            .balances(tenant_id, BalanceFilter::at(location_id).product(product_id))?;
        Ok(rows.into_iter().filter(|r| r.quantity.is_positive()).collect())
    }

    pub fn movement(&self, tenant_id: TenantId, movement_id: MovementId) -> Result<StockMovement, LedgerError> {
        self.store
            .movement(tenant_id, movement_id)?
            .ok_or_else(|| InventoryError::not_found("movement", movement_id).into())
    }

    pub fn movements(
        &self,
        tenant_id: TenantId,
        product_id: Option<ProductId>,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        Ok(self.store.movements(tenant_id, product_id)?)
    }
}

pub(crate) fn recorded_event(movement: &StockMovement) -> InventoryEvent {
    InventoryEvent::MovementRecorded(MovementRecorded {
        movement: movement.clone(),
    })
}
