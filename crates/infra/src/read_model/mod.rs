//! Tenant-isolated read models consumed by the ledger services.

pub mod catalog;
pub mod tenant_store;

pub use catalog::{CatalogReader, InMemoryCatalog};
pub use tenant_store::{InMemoryTenantStore, TenantStore};
