//! Batch registry: which batches hold stock, in FEFO order.
//!
//! The FEFO listing is the single answer to "which batch do we draw from"
//! whenever a caller does not pin one. The same helpers serve committed
//! reads (`BatchRegistry`) and reads inside an open transaction.

use std::collections::BTreeMap;

use tracing::instrument;

use medstock_core::{BatchId, LocationId, ProductId, Quantity, TenantId};
use medstock_inventory::{
    AvailableBatch, InventoryBalance, InventoryError, StockSnapshot, sort_fefo,
};

use crate::error::LedgerError;
use crate::ledger::{BalanceFilter, LedgerStore, LedgerTx};
use crate::read_model::CatalogReader;
use crate::read_model::catalog::{require_location, require_product};

/// Fold balance rows into per-batch availability, FEFO-sorted.
///
/// Rows of the same batch at different locations are summed; zero rows are
/// dropped. Every batch must be known to the catalog.
pub fn collect_available<C>(
    catalog: &C,
    tenant_id: TenantId,
    rows: impl IntoIterator<Item = InventoryBalance>,
) -> Result<Vec<AvailableBatch>, LedgerError>
where
    C: CatalogReader + ?Sized,
{
    let mut on_hand: BTreeMap<BatchId, Quantity> = BTreeMap::new();
    for row in rows.into_iter().filter(|r| r.quantity.is_positive()) {
        let total = on_hand.entry(row.key.batch_id).or_insert(Quantity::ZERO);
        *total = total
            .checked_add(row.quantity)
            .ok_or_else(|| InventoryError::invalid_quantity("on-hand total overflow"))?;
    }

    let mut batches = on_hand
        .into_iter()
        .map(|(batch_id, quantity)| {
            catalog
                .batch(tenant_id, batch_id)
                .map(|batch| AvailableBatch::new(&batch, quantity))
                .ok_or_else(|| LedgerError::from(InventoryError::not_found("batch", batch_id)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    sort_fefo(&mut batches);
    Ok(batches)
}

/// FEFO availability of one product at one location, as seen by `tx`.
pub fn available_in_tx<C>(
    tx: &dyn LedgerTx,
    catalog: &C,
    product_id: ProductId,
    location_id: LocationId,
) -> Result<Vec<AvailableBatch>, LedgerError>
where
    C: CatalogReader + ?Sized,
{
    let rows = tx.balances(BalanceFilter::at(location_id).product(Some(product_id)));
    collect_available(catalog, tx.tenant_id(), rows)
}

/// Available batches per product at one location, from committed state.
pub fn snapshot_at<S, C>(
    store: &S,
    catalog: &C,
    tenant_id: TenantId,
    location_id: LocationId,
) -> Result<StockSnapshot, LedgerError>
where
    S: LedgerStore + ?Sized,
    C: CatalogReader + ?Sized,
{
    let rows = store.balances(tenant_id, BalanceFilter::at(location_id))?;
    let mut snapshot = StockSnapshot::new();
    for batch in collect_available(catalog, tenant_id, rows)? {
        snapshot.entry(batch.product_id).or_default().push(batch);
    }
    Ok(snapshot)
}

/// Read-side batch lookup service.
#[derive(Debug)]
pub struct BatchRegistry<S, C> {
    store: S,
    catalog: C,
}

impl<S, C> BatchRegistry<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self { store, catalog }
    }
}

impl<S, C> BatchRegistry<S, C>
where
    S: LedgerStore,
    C: CatalogReader,
{
    /// Batches of `product_id` with stock, FEFO order; all locations when
    /// `location_id` is `None`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    pub fn list_available_batches(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        location_id: Option<LocationId>,
    ) -> Result<Vec<AvailableBatch>, LedgerError> {
        require_product(&self.catalog, tenant_id, product_id)?;
        if let Some(location_id) = location_id {
            require_location(&self.catalog, tenant_id, location_id)?;
        }

        let filter = BalanceFilter {
            location_id,
            product_id: Some(product_id),
        };
        let rows = self.store.balances(tenant_id, filter)?;
        collect_available(&self.catalog, tenant_id, rows)
    }
}
