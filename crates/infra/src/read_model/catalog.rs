//! Catalog read model: products, presentations, warehouses, locations, batches.
//!
//! The ledger services only read the catalog. Every lookup is tenant-scoped,
//! and the `require_*` helpers turn a miss into `NotFound` and a record that
//! claims another tenant into `TenantIsolation`.

use std::sync::Arc;

use medstock_catalog::{Batch, Location, Presentation, Product, Warehouse};
use medstock_core::{BatchId, Entity, LocationId, PresentationId, ProductId, TenantId, WarehouseId};
use medstock_inventory::{InventoryError, InventoryResult};

use super::tenant_store::{InMemoryTenantStore, TenantStore};

/// Read access to the catalog, supplied by the catalog subsystem.
pub trait CatalogReader: Send + Sync {
    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product>;
    fn presentation(&self, tenant_id: TenantId, id: PresentationId) -> Option<Presentation>;
    fn warehouse(&self, tenant_id: TenantId, id: WarehouseId) -> Option<Warehouse>;
    fn location(&self, tenant_id: TenantId, id: LocationId) -> Option<Location>;
    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Option<Batch>;
    fn batches_of(&self, tenant_id: TenantId, product_id: ProductId) -> Vec<Batch>;
}

impl<C> CatalogReader for Arc<C>
where
    C: CatalogReader + ?Sized,
{
    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product> {
        (**self).product(tenant_id, id)
    }

    fn presentation(&self, tenant_id: TenantId, id: PresentationId) -> Option<Presentation> {
        (**self).presentation(tenant_id, id)
    }

    fn warehouse(&self, tenant_id: TenantId, id: WarehouseId) -> Option<Warehouse> {
        (**self).warehouse(tenant_id, id)
    }

    fn location(&self, tenant_id: TenantId, id: LocationId) -> Option<Location> {
        (**self).location(tenant_id, id)
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Option<Batch> {
        (**self).batch(tenant_id, id)
    }

    fn batches_of(&self, tenant_id: TenantId, product_id: ProductId) -> Vec<Batch> {
        (**self).batches_of(tenant_id, product_id)
    }
}

fn owned<E: Entity>(tenant_id: TenantId, kind: &'static str, record: E) -> InventoryResult<E>
where
    E::Id: core::fmt::Display,
{
    if !record.belongs_to(tenant_id) {
        return Err(InventoryError::TenantIsolation(format!(
            "{kind} {} does not belong to tenant {tenant_id}",
            record.id()
        )));
    }
    Ok(record)
}

pub fn require_product<C: CatalogReader + ?Sized>(
    catalog: &C,
    tenant_id: TenantId,
    id: ProductId,
) -> InventoryResult<Product> {
    let product = catalog
        .product(tenant_id, id)
        .ok_or_else(|| InventoryError::not_found("product", id))?;
    owned(tenant_id, "product", product)
}

/// Active presentation of `product_id`.
pub fn require_presentation<C: CatalogReader + ?Sized>(
    catalog: &C,
    tenant_id: TenantId,
    product_id: ProductId,
    id: PresentationId,
) -> InventoryResult<Presentation> {
    let presentation = catalog
        .presentation(tenant_id, id)
        .ok_or_else(|| InventoryError::not_found("presentation", id))?;
    let presentation = owned(tenant_id, "presentation", presentation)?;
    if presentation.product_id != product_id {
        return Err(InventoryError::invalid_presentation(
            id,
            format!("belongs to product {}, not {product_id}", presentation.product_id),
        ));
    }
    if !presentation.is_active {
        return Err(InventoryError::invalid_presentation(id, "presentation is inactive"));
    }
    Ok(presentation)
}

/// Batch of `product_id`.
pub fn require_batch<C: CatalogReader + ?Sized>(
    catalog: &C,
    tenant_id: TenantId,
    product_id: ProductId,
    id: BatchId,
) -> InventoryResult<Batch> {
    let batch = catalog
        .batch(tenant_id, id)
        .ok_or_else(|| InventoryError::not_found("batch", id))?;
    let batch = owned(tenant_id, "batch", batch)?;
    if batch.product_id != product_id {
        return Err(InventoryError::validation(format!(
            "batch {id} belongs to product {}, not {product_id}",
            batch.product_id
        )));
    }
    Ok(batch)
}

/// Active location.
pub fn require_location<C: CatalogReader + ?Sized>(
    catalog: &C,
    tenant_id: TenantId,
    id: LocationId,
) -> InventoryResult<Location> {
    let location = catalog
        .location(tenant_id, id)
        .ok_or_else(|| InventoryError::not_found("location", id))?;
    let location = owned(tenant_id, "location", location)?;
    if !location.is_active {
        return Err(InventoryError::validation(format!("location {id} is inactive")));
    }
    Ok(location)
}

/// The warehouse a location belongs to, if the catalog knows it.
pub fn warehouse_of<C: CatalogReader + ?Sized>(
    catalog: &C,
    tenant_id: TenantId,
    location: &Location,
) -> Option<Warehouse> {
    catalog
        .warehouse(tenant_id, location.warehouse_id)
        .filter(|w| w.belongs_to(tenant_id))
}

/// In-memory catalog over tenant-isolated stores, for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: InMemoryTenantStore<ProductId, Product>,
    presentations: InMemoryTenantStore<PresentationId, Presentation>,
    warehouses: InMemoryTenantStore<WarehouseId, Warehouse>,
    locations: InMemoryTenantStore<LocationId, Location>,
    batches: InMemoryTenantStore<BatchId, Batch>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, product: Product) {
        self.products.upsert(product.tenant_id, product.id, product);
    }

    pub fn add_presentation(&self, presentation: Presentation) {
        self.presentations
            .upsert(presentation.tenant_id, presentation.id, presentation);
    }

    pub fn add_warehouse(&self, warehouse: Warehouse) {
        self.warehouses.upsert(warehouse.tenant_id, warehouse.id, warehouse);
    }

    pub fn add_location(&self, location: Location) {
        self.locations.upsert(location.tenant_id, location.id, location);
    }

    pub fn add_batch(&self, batch: Batch) {
        self.batches.upsert(batch.tenant_id, batch.id, batch);
    }

    pub fn presentations_of(&self, tenant_id: TenantId, product_id: ProductId) -> Vec<Presentation> {
        self.presentations
            .find(tenant_id, &|p: &Presentation| p.product_id == product_id)
    }

    pub fn locations(&self, tenant_id: TenantId) -> Vec<Location> {
        self.locations.list(tenant_id)
    }
}

impl CatalogReader for InMemoryCatalog {
    fn product(&self, tenant_id: TenantId, id: ProductId) -> Option<Product> {
        self.products.get(tenant_id, &id)
    }

    fn presentation(&self, tenant_id: TenantId, id: PresentationId) -> Option<Presentation> {
        self.presentations.get(tenant_id, &id)
    }

    fn warehouse(&self, tenant_id: TenantId, id: WarehouseId) -> Option<Warehouse> {
        self.warehouses.get(tenant_id, &id)
    }

    fn location(&self, tenant_id: TenantId, id: LocationId) -> Option<Location> {
        self.locations.get(tenant_id, &id)
    }

    fn batch(&self, tenant_id: TenantId, id: BatchId) -> Option<Batch> {
        self.batches.get(tenant_id, &id)
    }

    fn batches_of(&self, tenant_id: TenantId, product_id: ProductId) -> Vec<Batch> {
        self.batches.find(tenant_id, &|b: &Batch| b.product_id == product_id)
    }
}
