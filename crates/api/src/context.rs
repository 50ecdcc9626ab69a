use medstock_core::TenantId;

/// Tenant context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Upstream authorization decision for stock mutations (`canWriteStock`).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WriteAccess {
    can_write_stock: bool,
}

impl WriteAccess {
    pub fn new(can_write_stock: bool) -> Self {
        Self { can_write_stock }
    }

    pub fn can_write_stock(&self) -> bool {
        self.can_write_stock
    }
}
