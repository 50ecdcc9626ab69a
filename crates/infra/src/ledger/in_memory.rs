use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use medstock_core::{
    AggregateRoot, ExpectedVersion, MovementId, ProductId, Quantity, RequestId, TenantId,
};
use medstock_inventory::{
    BalanceKey, InventoryBalance, MovementNumber, RequestStatus, StockMovement, StockMovementRequest,
};

use super::store::{BalanceFilter, LedgerStore, LedgerTx, StoreError};

/// Committed state of one tenant.
#[derive(Debug, Default)]
struct TenantLedger {
    balances: BTreeMap<BalanceKey, Quantity>,
    movements: Vec<StockMovement>,
    movement_index: HashMap<MovementId, usize>,
    numbers: HashSet<MovementNumber>,
    counters: HashMap<i32, u64>,
    requests: HashMap<RequestId, StockMovementRequest>,
}

impl TenantLedger {
    fn merge(&mut self, staged: Staged) {
        self.balances.extend(staged.balances);
        for movement in staged.movements {
            self.numbers.insert(movement.number);
            self.movement_index.insert(movement.id, self.movements.len());
            self.movements.push(movement);
        }
        self.counters.extend(staged.counters);
        self.requests.extend(staged.requests);
    }
}

/// Writes of an open transaction, merged on commit.
#[derive(Debug, Default)]
struct Staged {
    balances: BTreeMap<BalanceKey, Quantity>,
    movements: Vec<StockMovement>,
    counters: HashMap<i32, u64>,
    requests: HashMap<RequestId, StockMovementRequest>,
}

#[derive(Debug, Default)]
struct TenantSlot {
    /// Held for the whole transaction: one writer per tenant.
    writer: Mutex<()>,
    state: RwLock<TenantLedger>,
}

/// In-memory transactional ledger store.
///
/// Intended for tests/dev. Writers are serialized per tenant, which is a
/// superset of the per-row exclusion the ledger needs; readers only take a
/// short read lock and see the last committed state.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    tenants: RwLock<HashMap<TenantId, Arc<TenantSlot>>>,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, tenant_id: TenantId) -> Result<Arc<TenantSlot>, StoreError> {
        if let Some(slot) = self.tenants.read().map_err(|_| poisoned())?.get(&tenant_id) {
            return Ok(slot.clone());
        }
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        Ok(tenants.entry(tenant_id).or_default().clone())
    }

    fn read<T>(&self, tenant_id: TenantId, f: impl FnOnce(&TenantLedger) -> T) -> Result<T, StoreError> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        match tenants.get(&tenant_id) {
            Some(slot) => {
                let state = slot.state.read().map_err(|_| poisoned())?;
                Ok(f(&state))
            }
            None => Ok(f(&TenantLedger::default())),
        }
    }
}

struct InMemoryTx<'a> {
    tenant_id: TenantId,
    committed: &'a TenantLedger,
    staged: Staged,
}

impl LedgerTx for InMemoryTx<'_> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn balance(&self, key: &BalanceKey) -> Quantity {
        self.staged
            .balances
            .get(key)
            .or_else(|| self.committed.balances.get(key))
            .copied()
            .unwrap_or(Quantity::ZERO)
    }

    fn put_balance(&mut self, key: BalanceKey, quantity: Quantity) {
        self.staged.balances.insert(key, quantity);
    }

    fn balances(&self, filter: BalanceFilter) -> Vec<InventoryBalance> {
        let mut merged: BTreeMap<BalanceKey, Quantity> = self
            .committed
            .balances
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .map(|(key, q)| (*key, *q))
            .collect();
        merged.extend(
            self.staged
                .balances
                .iter()
                .filter(|(key, _)| filter.matches(key))
                .map(|(key, q)| (*key, *q)),
        );
        merged
            .into_iter()
            .map(|(key, quantity)| InventoryBalance { key, quantity })
            .collect()
    }

    fn next_movement_number(&mut self, year: i32) -> u64 {
        let last = self
            .staged
            .counters
            .get(&year)
            .or_else(|| self.committed.counters.get(&year))
            .copied()
            .unwrap_or(0);
        let next = last + 1;
        self.staged.counters.insert(year, next);
        next
    }

    fn insert_movement(&mut self, movement: StockMovement) -> Result<(), StoreError> {
        if movement.tenant_id != self.tenant_id {
            return Err(StoreError::TenantIsolation(format!(
                "movement {} belongs to another tenant",
                movement.id
            )));
        }
        let number_taken = self.committed.numbers.contains(&movement.number)
            || self.staged.movements.iter().any(|m| m.number == movement.number);
        if number_taken {
            return Err(StoreError::Duplicate(format!(
                "movement number {} already assigned",
                movement.number
            )));
        }
        self.staged.movements.push(movement);
        Ok(())
    }

    fn load_request(&self, request_id: RequestId) -> Option<StockMovementRequest> {
        self.staged
            .requests
            .get(&request_id)
            .or_else(|| self.committed.requests.get(&request_id))
            .cloned()
    }

    fn insert_request(&mut self, request: StockMovementRequest) -> Result<(), StoreError> {
        if request.tenant_id() != self.tenant_id {
            return Err(StoreError::TenantIsolation(format!(
                "request {} belongs to another tenant",
                request.request_id()
            )));
        }
        if self.load_request(request.request_id()).is_some() {
            return Err(StoreError::Duplicate(format!("request {}", request.request_id())));
        }
        self.staged.requests.insert(request.request_id(), request);
        Ok(())
    }

    fn save_request(
        &mut self,
        mut request: StockMovementRequest,
        expected: ExpectedVersion,
    ) -> Result<StockMovementRequest, StoreError> {
        let id = request.request_id();
        let current = self
            .load_request(id)
            .ok_or_else(|| StoreError::Missing(format!("request {id}")))?;

        if !expected.matches(current.version()) {
            return Err(StoreError::Concurrency(format!(
                "request {id}: expected {expected:?}, found {}",
                current.version()
            )));
        }

        request.bump_version();
        self.staged.requests.insert(id, request.clone());
        Ok(request)
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transaction<T, E, F>(&self, tenant_id: TenantId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let slot = self.slot(tenant_id)?;
        // A panicking closure poisons the writer, but its staged writes died with it.
        let _writer = slot.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let (out, staged) = {
            let committed = slot.state.read().map_err(|_| poisoned())?;
            let mut tx = InMemoryTx {
                tenant_id,
                committed: &committed,
                staged: Staged::default(),
            };
            let out = work(&mut tx)?;
            (out, tx.staged)
        };

        // Still the only writer for this tenant: nothing committed in between.
        slot.state.write().map_err(|_| poisoned())?.merge(staged);
        Ok(out)
    }

    fn balance(&self, tenant_id: TenantId, key: &BalanceKey) -> Result<Quantity, StoreError> {
        self.read(tenant_id, |state| {
            state.balances.get(key).copied().unwrap_or(Quantity::ZERO)
        })
    }

    fn balances(&self, tenant_id: TenantId, filter: BalanceFilter) -> Result<Vec<InventoryBalance>, StoreError> {
        self.read(tenant_id, |state| {
            state
                .balances
                .iter()
                .filter(|(key, _)| filter.matches(key))
                .map(|(key, quantity)| InventoryBalance {
                    key: *key,
                    quantity: *quantity,
                })
                .collect()
        })
    }

    fn movement(&self, tenant_id: TenantId, movement_id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        self.read(tenant_id, |state| {
            state
                .movement_index
                .get(&movement_id)
                .and_then(|idx| state.movements.get(*idx))
                .cloned()
        })
    }

    fn movements(&self, tenant_id: TenantId, product_id: Option<ProductId>) -> Result<Vec<StockMovement>, StoreError> {
        self.read(tenant_id, |state| {
            state
                .movements
                .iter()
                .filter(|m| product_id.is_none_or(|p| p == m.product_id))
                .cloned()
                .collect()
        })
    }

    fn request(&self, tenant_id: TenantId, request_id: RequestId) -> Result<Option<StockMovementRequest>, StoreError> {
        self.read(tenant_id, |state| state.requests.get(&request_id).cloned())
    }

    fn requests(
        &self,
        tenant_id: TenantId,
        status: Option<RequestStatus>,
    ) -> Result<Vec<StockMovementRequest>, StoreError> {
        self.read(tenant_id, |state| {
            let mut out: Vec<StockMovementRequest> = state
                .requests
                .values()
                .filter(|r| status.is_none_or(|s| s == r.status()))
                .cloned()
                .collect();
            out.sort_by_key(|r| (r.created_at(), r.request_id()));
            out
        })
    }
}
