use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use medstock_core::{DomainError, DomainResult, Entity, PresentationId, ProductId, TenantId};

/// A stocked product. The SKU is immutable and unique per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    /// Free-form description of the base unit (e.g. "tablet", "ml").
    pub packaging: Option<String>,
}

impl Product {
    pub fn new(
        tenant_id: TenantId,
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        let name = name.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            sku,
            name,
            packaging: None,
        })
    }

    pub fn with_packaging(mut self, packaging: impl Into<String>) -> Self {
        self.packaging = Some(packaging.into());
        self
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// A named packaging multiple of a product's base unit ("Box of 20").
///
/// `units_per_presentation == 1` is the loose unit. Once a presentation is
/// referenced by a batch or a request line its multiple never changes; new
/// packaging means a new presentation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub id: PresentationId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub units_per_presentation: Decimal,
    pub is_default: bool,
    pub is_active: bool,
}

impl Presentation {
    pub fn new(
        tenant_id: TenantId,
        id: PresentationId,
        product_id: ProductId,
        name: impl Into<String>,
        units_per_presentation: Decimal,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("presentation name cannot be empty"));
        }
        if units_per_presentation <= Decimal::ZERO {
            return Err(DomainError::validation(
                "units_per_presentation must be positive",
            ));
        }
        Ok(Self {
            id,
            tenant_id,
            product_id,
            name,
            units_per_presentation,
            is_default: false,
            is_active: true,
        })
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_loose_unit(&self) -> bool {
        self.units_per_presentation == Decimal::ONE
    }
}

impl Entity for Presentation {
    type Id = PresentationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
