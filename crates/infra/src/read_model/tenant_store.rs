use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use medstock_core::TenantId;

/// Tenant-isolated key/value store abstraction.
///
/// Every key lives under a tenant; a lookup with the wrong tenant behaves
/// exactly like a lookup of a missing key.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        self.find(tenant_id, &|_| true)
    }

    /// Values of `tenant_id` matching `predicate`.
    fn find(&self, tenant_id: TenantId, predicate: &dyn Fn(&V) -> bool) -> Vec<V>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn find(&self, tenant_id: TenantId, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        (**self).find(tenant_id, predicate)
    }
}

/// In-memory tenant-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn find(&self, tenant_id: TenantId, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter(|((t, _k), v)| *t == tenant_id && predicate(v))
            .map(|(_, v)| v.clone())
            .collect()
    }
}
