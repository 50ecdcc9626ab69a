//! FEFO (first-expire-first-out) batch ordering.

use core::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use medstock_catalog::Batch;
use medstock_core::{BatchId, PresentationId, ProductId, Quantity};

/// A batch with positive on-hand stock, as returned by the batch registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableBatch {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub batch_number: String,
    pub expires_at: Option<NaiveDate>,
    pub presentation_id: Option<PresentationId>,
    /// Base units on hand (summed over locations when the listing is unscoped).
    pub on_hand: Quantity,
}

impl AvailableBatch {
    pub fn new(batch: &Batch, on_hand: Quantity) -> Self {
        Self {
            batch_id: batch.id,
            product_id: batch.product_id,
            batch_number: batch.batch_number.clone(),
            expires_at: batch.expires_at,
            presentation_id: batch.presentation_id,
            on_hand,
        }
    }

    pub fn packaged_as(&self, presentation_id: Option<PresentationId>) -> bool {
        presentation_id.is_some() && self.presentation_id == presentation_id
    }
}

/// Expiry ascending, non-expiring last.
pub fn compare_expiry(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort into FEFO order: expiry ascending (nulls last), then batch id.
pub fn sort_fefo(batches: &mut [AvailableBatch]) {
    batches.sort_by(|a, b| {
        compare_expiry(a.expires_at, b.expires_at).then_with(|| a.batch_id.cmp(&b.batch_id))
    });
}

/// FEFO order with an exact packaging match preferred among equal expiries.
///
/// The packaging key only reorders batches that share an expiry date; it never
/// lets a later-expiring batch jump ahead.
pub fn sort_fefo_preferring(batches: &mut [AvailableBatch], presentation_id: Option<PresentationId>) {
    batches.sort_by(|a, b| {
        compare_expiry(a.expires_at, b.expires_at)
            .then_with(|| b.packaged_as(presentation_id).cmp(&a.packaged_as(presentation_id)))
            .then_with(|| a.batch_id.cmp(&b.batch_id))
    });
}
