use std::sync::Arc;

use thiserror::Error;

use medstock_core::{ExpectedVersion, LocationId, MovementId, ProductId, Quantity, RequestId, TenantId};
use medstock_inventory::{
    BalanceKey, InventoryBalance, InventoryResult, RequestStatus, StockMovement, StockMovementRequest,
    apply_delta,
};

/// Ledger store operation error.
///
/// These are **infrastructure errors** (locking, versioning, key clashes) as
/// opposed to inventory rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    Missing(String),

    /// The backend cannot serve the call (lock poisoned, connection lost).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Balance listing filter; `None` fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceFilter {
    pub location_id: Option<LocationId>,
    pub product_id: Option<ProductId>,
}

impl BalanceFilter {
    pub fn at(location_id: LocationId) -> Self {
        Self {
            location_id: Some(location_id),
            product_id: None,
        }
    }

    pub fn of(product_id: ProductId) -> Self {
        Self {
            location_id: None,
            product_id: Some(product_id),
        }
    }

    pub fn product(mut self, product_id: Option<ProductId>) -> Self {
        self.product_id = product_id;
        self
    }

    pub fn matches(&self, key: &BalanceKey) -> bool {
        self.location_id.is_none_or(|l| l == key.location_id)
            && self.product_id.is_none_or(|p| p == key.product_id)
    }
}

/// One open unit of work, scoped to a single tenant.
///
/// Everything written through a `LedgerTx` becomes visible atomically when
/// the enclosing `LedgerStore::transaction` closure returns `Ok`, and is
/// discarded when it returns `Err`. Reads through the transaction see its own
/// uncommitted writes.
pub trait LedgerTx {
    fn tenant_id(&self) -> TenantId;

    /// Current quantity of a row; absent rows read as zero.
    fn balance(&self, key: &BalanceKey) -> Quantity;

    fn put_balance(&mut self, key: BalanceKey, quantity: Quantity);

    /// Rows matching `filter`, including zero rows.
    fn balances(&self, filter: BalanceFilter) -> Vec<InventoryBalance>;

    /// Next gapless movement number for `year` within this tenant.
    fn next_movement_number(&mut self, year: i32) -> u64;

    fn insert_movement(&mut self, movement: StockMovement) -> Result<(), StoreError>;

    fn load_request(&self, request_id: RequestId) -> Option<StockMovementRequest>;

    fn insert_request(&mut self, request: StockMovementRequest) -> Result<(), StoreError>;

    /// Persist `request` if the stored version matches `expected`; returns the
    /// saved request with its version bumped.
    fn save_request(
        &mut self,
        request: StockMovementRequest,
        expected: ExpectedVersion,
    ) -> Result<StockMovementRequest, StoreError>;

    /// Read, check non-negativity, write. Zero deltas never create rows.
    fn apply_delta(&mut self, key: BalanceKey, delta: Quantity) -> InventoryResult<Quantity> {
        let current = self.balance(&key);
        let next = apply_delta(key, current, delta)?;
        if !delta.is_zero() {
            self.put_balance(key, next);
        }
        Ok(next)
    }
}

/// Transactional ledger storage.
///
/// `transaction` is the only write path. Implementations must make writers
/// of the same rows mutually exclusive for the whole closure, so that a
/// balance read inside the closure is still current when the closure's
/// writes commit. Plain readers never block on writers and may observe the
/// state as of the last commit.
pub trait LedgerStore: Send + Sync {
    fn transaction<T, E, F>(&self, tenant_id: TenantId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<StoreError>;

    fn balance(&self, tenant_id: TenantId, key: &BalanceKey) -> Result<Quantity, StoreError>;

    fn balances(&self, tenant_id: TenantId, filter: BalanceFilter) -> Result<Vec<InventoryBalance>, StoreError>;

    fn movement(&self, tenant_id: TenantId, movement_id: MovementId) -> Result<Option<StockMovement>, StoreError>;

    /// All movements in commit order, optionally for one product.
    fn movements(&self, tenant_id: TenantId, product_id: Option<ProductId>) -> Result<Vec<StockMovement>, StoreError>;

    fn request(&self, tenant_id: TenantId, request_id: RequestId) -> Result<Option<StockMovementRequest>, StoreError>;

    /// Requests in creation order, optionally filtered by status.
    fn requests(
        &self,
        tenant_id: TenantId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<StockMovementRequest>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore,
{
    fn transaction<T, E, F>(&self, tenant_id: TenantId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(tenant_id, work)
    }

    fn balance(&self, tenant_id: TenantId, key: &BalanceKey) -> Result<Quantity, StoreError> {
        (**self).balance(tenant_id, key)
    }

    fn balances(&self, tenant_id: TenantId, filter: BalanceFilter) -> Result<Vec<InventoryBalance>, StoreError> {
        (**self).balances(tenant_id, filter)
    }

    fn movement(&self, tenant_id: TenantId, movement_id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        (**self).movement(tenant_id, movement_id)
    }

    fn movements(&self, tenant_id: TenantId, product_id: Option<ProductId>) -> Result<Vec<StockMovement>, StoreError> {
        (**self).movements(tenant_id, product_id)
    }

    fn request(&self, tenant_id: TenantId, request_id: RequestId) -> Result<Option<StockMovementRequest>, StoreError> {
        (**self).request(tenant_id, request_id)
    }

    fn requests(
        &self,
        tenant_id: TenantId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<StockMovementRequest>, StoreError> {
        (**self).requests(tenant_id, status)
    }
}
