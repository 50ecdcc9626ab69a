use thiserror::Error;

use medstock_inventory::InventoryError;

use crate::ledger::StoreError;

/// Error returned by every ledger service.
///
/// Inventory rule violations pass through unchanged; store failures that
/// have an inventory meaning (version conflicts, cross-tenant access) are
/// folded into the matching inventory variant so callers only match once.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Inventory(InventoryError),

    /// Persisting to the ledger store failed.
    #[error("ledger store error: {0}")]
    Store(StoreError),

    /// Publication failed after a successful commit (at-least-once; retry may duplicate).
    #[error("event publication failed after commit: {0}")]
    Publish(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Inventory(e) => e.code(),
            LedgerError::Store(_) => "store_error",
            LedgerError::Publish(_) => "publish_failed",
        }
    }

    pub fn inventory(&self) -> Option<&InventoryError> {
        match self {
            LedgerError::Inventory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InventoryError> for LedgerError {
    fn from(value: InventoryError) -> Self {
        LedgerError::Inventory(value)
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => {
                LedgerError::Inventory(InventoryError::conflict("ledger", "store", msg))
            }
            StoreError::TenantIsolation(msg) => LedgerError::Inventory(InventoryError::TenantIsolation(msg)),
            other => LedgerError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_surface_as_concurrent_modification() {
        let err = LedgerError::from(StoreError::Concurrency("request x: expected 2, found 3".into()));
        assert_eq!(err.code(), "concurrent_modification");
    }

    #[test]
    fn unavailable_store_stays_a_store_error() {
        let err = LedgerError::from(StoreError::Unavailable("lock poisoned".into()));
        assert_eq!(err.code(), "store_error");
        assert!(err.inventory().is_none());
    }
}
