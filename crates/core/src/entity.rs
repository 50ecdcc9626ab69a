//! Entity trait: identity + tenant ownership.

use crate::id::TenantId;

/// Entity marker + minimal interface.
///
/// Every persisted entity of the inventory core belongs to exactly one tenant;
/// `tenant_id` is what lookups compare against before handing a record out.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Owning tenant.
    fn tenant_id(&self) -> TenantId;

    /// True when the entity is visible to `tenant_id`.
    fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}
