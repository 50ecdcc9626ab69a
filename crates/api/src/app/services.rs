use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use medstock_catalog::{Batch, Location, Presentation, Product, Warehouse};
use medstock_events::InMemoryEventBus;
use medstock_infra::event_bus::JsonEnvelope;
use medstock_infra::{
    BatchRegistry, BulkFulfillmentService, InMemoryCatalog, InMemoryLedgerStore, MovementEngine, RequestService,
};

use crate::config::ConfigError;

type Store = Arc<InMemoryLedgerStore>;
type Catalog = Arc<InMemoryCatalog>;
type Bus = Arc<InMemoryEventBus<JsonEnvelope>>;

/// Ledger services shared by every handler.
///
/// Everything runs against the in-memory ledger store and catalog; the
/// services only see them through the `LedgerStore` / `CatalogReader` traits.
pub struct AppServices {
    pub engine: MovementEngine<Store, Catalog, Bus>,
    pub requests: RequestService<Store, Catalog, Bus>,
    pub fulfillment: BulkFulfillmentService<Store, Catalog, Bus>,
    pub registry: BatchRegistry<Store, Catalog>,
    catalog: Catalog,
    bus: Bus,
}

impl AppServices {
    pub fn in_memory() -> Self {
        Self::with_catalog(Arc::new(InMemoryCatalog::new()))
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let store: Store = Arc::new(InMemoryLedgerStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        Self {
            engine: MovementEngine::new(store.clone(), catalog.clone(), bus.clone()),
            requests: RequestService::new(store.clone(), catalog.clone(), bus.clone()),
            fulfillment: BulkFulfillmentService::new(MovementEngine::new(store.clone(), catalog.clone(), bus.clone())),
            registry: BatchRegistry::new(store, catalog.clone()),
            catalog,
            bus,
        }
    }

    /// The catalog read model, for seeding.
    pub fn catalog(&self) -> &InMemoryCatalog {
        &self.catalog
    }

    pub fn event_bus(&self) -> &Bus {
        &self.bus
    }
}

/// Catalog snapshot as stored on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSeed {
    pub products: Vec<Product>,
    pub presentations: Vec<Presentation>,
    pub warehouses: Vec<Warehouse>,
    pub locations: Vec<Location>,
    pub batches: Vec<Batch>,
}

impl CatalogSeed {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let fail = |reason: String| ConfigError::CatalogFile {
            path: path.to_path_buf(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| fail(e.to_string()))
    }

    /// Returns the number of records loaded.
    pub fn apply(self, catalog: &InMemoryCatalog) -> usize {
        let count = self.products.len()
            + self.presentations.len()
            + self.warehouses.len()
            + self.locations.len()
            + self.batches.len();

        self.products.into_iter().for_each(|p| catalog.add_product(p));
        self.presentations.into_iter().for_each(|p| catalog.add_presentation(p));
        self.warehouses.into_iter().for_each(|w| catalog.add_warehouse(w));
        self.locations.into_iter().for_each(|l| catalog.add_location(l));
        self.batches.into_iter().for_each(|b| catalog.add_batch(b));
        count
    }
}
