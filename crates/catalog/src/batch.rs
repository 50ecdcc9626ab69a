use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use medstock_core::{BatchId, DomainError, DomainResult, Entity, PresentationId, ProductId, TenantId};

/// An expiry-dated lot of one product.
///
/// `batch_number` is unique per (tenant, product). `expires_at == None` marks a
/// non-expiring batch. `presentation_id` records the packaging the batch was
/// received in; it never restricts how the stock may be consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub batch_number: String,
    pub expires_at: Option<NaiveDate>,
    pub presentation_id: Option<PresentationId>,
}

impl Batch {
    pub fn new(
        tenant_id: TenantId,
        id: BatchId,
        product_id: ProductId,
        batch_number: impl Into<String>,
        expires_at: Option<NaiveDate>,
    ) -> DomainResult<Self> {
        let batch_number = batch_number.into();
        if batch_number.trim().is_empty() {
            return Err(DomainError::validation("batch number cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            product_id,
            batch_number,
            expires_at,
            presentation_id: None,
        })
    }

    pub fn received_as(mut self, presentation_id: PresentationId) -> Self {
        self.presentation_id = Some(presentation_id);
        self
    }

    pub fn is_expired_on(&self, day: NaiveDate) -> bool {
        self.expires_at.is_some_and(|exp| exp < day)
    }

    /// Days from `today` until expiry (negative once expired).
    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expires_at.map(|exp| (exp - today).num_days())
    }
}

impl Entity for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
