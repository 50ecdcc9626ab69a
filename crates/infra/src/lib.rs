//! Infrastructure layer: ledger storage, catalog read model, ledger services.
//!
//! The pure inventory rules live in `medstock-inventory`; this crate runs
//! them against a `LedgerStore` inside transactions and publishes the
//! resulting events once a transaction has committed.

pub mod batch_registry;
pub mod error;
pub mod event_bus;
pub mod fulfillment;
pub mod ledger;
pub mod movement_engine;
pub mod read_model;
pub mod requests;

#[cfg(test)]
mod integration_tests;

pub use batch_registry::BatchRegistry;
pub use error::LedgerError;
pub use fulfillment::{
    BulkFulfillmentInput, BulkFulfillmentOutcome, BulkFulfillmentService, CoveragePolicy, SuppliedPlanInput,
};
pub use ledger::{BalanceFilter, InMemoryLedgerStore, LedgerStore, LedgerTx, StoreError};
pub use movement_engine::{FefoIssue, MovementEngine};
pub use read_model::{CatalogReader, InMemoryCatalog};
pub use requests::{OpenRequest, RequestService};
