//! Ledger persistence: the unit-of-work contract and its in-memory backend.

pub mod in_memory;
pub mod store;

pub use in_memory::InMemoryLedgerStore;
pub use store::{BalanceFilter, LedgerStore, LedgerTx, StoreError};
