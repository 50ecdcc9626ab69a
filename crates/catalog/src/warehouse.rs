use serde::{Deserialize, Serialize};

use medstock_core::{DomainError, DomainResult, Entity, LocationId, TenantId, WarehouseId};

/// A physical warehouse. `city` routes stock requests by geography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub city: Option<String>,
}

impl Warehouse {
    pub fn new(
        tenant_id: TenantId,
        id: WarehouseId,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("warehouse code cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            code,
            name: name.into(),
            city: None,
        })
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Case-insensitive city comparison; `None` when the warehouse has no city.
    pub fn serves_city(&self, city: &str) -> Option<bool> {
        self.city
            .as_deref()
            .map(|own| own.trim().eq_ignore_ascii_case(city.trim()))
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// A bin or shelf inside a warehouse; the unit the ledger keys balances on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub code: String,
    pub is_active: bool,
}

impl Location {
    pub fn new(
        tenant_id: TenantId,
        id: LocationId,
        warehouse_id: WarehouseId,
        code: impl Into<String>,
    ) -> DomainResult<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("location code cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            warehouse_id,
            code,
            is_active: true,
        })
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
