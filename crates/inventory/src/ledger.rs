//! Balance rows and the non-negative delta rule.

use serde::{Deserialize, Serialize};

use medstock_core::{BatchId, LocationId, ProductId, Quantity};

use crate::error::{InventoryError, InventoryResult};

/// Natural key of a ledger row within one tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceKey {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub batch_id: BatchId,
}

impl BalanceKey {
    pub fn new(location_id: LocationId, product_id: ProductId, batch_id: BatchId) -> Self {
        Self {
            location_id,
            product_id,
            batch_id,
        }
    }
}

/// One ledger row: base units on hand for a (location, product, batch).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryBalance {
    #[serde(flatten)]
    pub key: BalanceKey,
    pub quantity: Quantity,
}

/// `current + delta`, or `InsufficientStock` if that would go below zero.
///
/// Pure arithmetic; callers are responsible for reading `current` and writing
/// the result inside the same unit of work.
pub fn apply_delta(key: BalanceKey, current: Quantity, delta: Quantity) -> InventoryResult<Quantity> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| InventoryError::invalid_quantity(format!("balance overflow applying {delta}")))?;

    if next.is_negative() {
        return Err(InventoryError::InsufficientStock {
            location_id: key.location_id,
            product_id: key.product_id,
            batch_id: Some(key.batch_id),
            available: current,
            requested: delta.abs(),
            shortfall: next.abs(),
        });
    }

    Ok(next)
}
