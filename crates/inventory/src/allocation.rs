//! Batch-to-request allocation for bulk fulfillment.
//!
//! Planning is pure: it takes the outstanding demand of the selected requests
//! and a snapshot of the source location's available batches, and returns the
//! lines (batch, item, base units) a fulfillment would transfer. Nothing here
//! touches the ledger; the executing service re-validates every line against
//! live balances inside its transaction.
//!
//! Demands are served in selection order against one shared pool per batch,
//! so a product requested by several requests is covered jointly and the
//! first-selected request is served first. Each demand walks its product's
//! batches in FEFO order, preferring an exact packaging match among batches
//! with the same expiry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use medstock_core::{AggregateRoot, BatchId, LocationId, ProductId, Quantity, RequestId, RequestItemId};

use crate::error::{InventoryError, InventoryResult};
use crate::fefo::{AvailableBatch, sort_fefo_preferring};
use crate::request::{RequestItem, StockMovementRequest};
use crate::units::UnitOfMeasure;

/// Outstanding need of one request item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    pub request_id: RequestId,
    pub item_id: RequestItemId,
    pub product_id: ProductId,
    pub unit: UnitOfMeasure,
    /// In `unit`.
    pub remaining: Quantity,
}

impl Demand {
    pub fn for_item(request_id: RequestId, item: &RequestItem, unit: UnitOfMeasure) -> Self {
        Self {
            request_id,
            item_id: item.id,
            product_id: item.product_id,
            unit,
            remaining: item.remaining_quantity,
        }
    }

    pub fn required_base(&self) -> InventoryResult<Quantity> {
        self.unit.to_base(self.remaining)
    }

    /// Item-unit decrement earned by `allocated` base units, never above `remaining`.
    pub fn decrement_for(&self, allocated: Quantity) -> InventoryResult<Quantity> {
        Ok(self.unit.covered_by(allocated)?.min(self.remaining))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLine {
    pub request_id: RequestId,
    pub item_id: RequestItemId,
    pub product_id: ProductId,
    pub batch_id: BatchId,
    /// Base units to transfer.
    pub quantity: Quantity,
}

/// Net effect on one request item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSettlement {
    pub request_id: RequestId,
    pub item_id: RequestItemId,
    /// Base units allocated across all batches.
    pub allocated: Quantity,
    /// Reduction of the item's remaining quantity, in the item's unit.
    pub decrement: Quantity,
}

/// Per-product coverage summary, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCoverage {
    pub product_id: ProductId,
    pub required: Quantity,
    pub allocated: Quantity,
    pub batches_found: usize,
    pub shortfall: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub lines: Vec<AllocationLine>,
    pub settlements: Vec<ItemSettlement>,
    pub coverage: Vec<ProductCoverage>,
}

/// Available batches at the source location, keyed by product.
pub type StockSnapshot = HashMap<ProductId, Vec<AvailableBatch>>;

fn overflow() -> InventoryError {
    InventoryError::invalid_quantity("quantity overflow while planning allocation")
}

fn add(a: Quantity, b: Quantity) -> InventoryResult<Quantity> {
    a.checked_add(b).ok_or_else(overflow)
}

fn sub(a: Quantity, b: Quantity) -> InventoryResult<Quantity> {
    a.checked_sub(b).ok_or_else(overflow)
}

/// Running per-product totals, in first-seen order.
#[derive(Default)]
struct CoverageBook {
    order: Vec<ProductId>,
    totals: HashMap<ProductId, (Quantity, Quantity)>,
}

impl CoverageBook {
    fn record(&mut self, product_id: ProductId, required: Quantity, allocated: Quantity) -> InventoryResult<()> {
        if !self.totals.contains_key(&product_id) {
            self.order.push(product_id);
        }
        let entry = self
            .totals
            .entry(product_id)
            .or_insert((Quantity::ZERO, Quantity::ZERO));
        entry.0 = add(entry.0, required)?;
        entry.1 = add(entry.1, allocated)?;
        Ok(())
    }

    fn finish(self, stock: &StockSnapshot) -> InventoryResult<Vec<ProductCoverage>> {
        self.order
            .into_iter()
            .map(|product_id| {
                let (required, allocated) = self.totals.get(&product_id).copied().unwrap_or_default();
                let batches_found = stock
                    .get(&product_id)
                    .map(|b| b.iter().filter(|b| b.on_hand.is_positive()).count())
                    .unwrap_or(0);
                let shortfall = sub(required, allocated)?;
                Ok(ProductCoverage {
                    product_id,
                    required,
                    allocated,
                    batches_found,
                    shortfall: if shortfall.is_negative() { Quantity::ZERO } else { shortfall },
                })
            })
            .collect()
    }
}

fn pool_of(stock: &StockSnapshot) -> HashMap<BatchId, Quantity> {
    stock
        .values()
        .flatten()
        .map(|b| (b.batch_id, b.on_hand))
        .collect()
}

/// Greedy FEFO allocation of `demands` (selection order) against `stock`.
///
/// Shortfalls are allowed: whatever is available is allocated and the rest
/// stays outstanding. A product with no batches at all leaves its items
/// untouched.
pub fn plan_allocation(demands: &[Demand], stock: &StockSnapshot) -> InventoryResult<Allocation> {
    let mut pool = pool_of(stock);
    let mut book = CoverageBook::default();
    let mut allocation = Allocation::default();

    for demand in demands.iter().filter(|d| d.remaining.is_positive()) {
        let required = demand.required_base()?;
        let mut outstanding = required;

        let mut candidates = stock.get(&demand.product_id).cloned().unwrap_or_default();
        sort_fefo_preferring(&mut candidates, demand.unit.presentation_id());

        for batch in &candidates {
            if !outstanding.is_positive() {
                break;
            }
            let Some(available) = pool.get_mut(&batch.batch_id) else {
                continue;
            };
            let take = outstanding.min(*available);
            if !take.is_positive() {
                continue;
            }
            *available = sub(*available, take)?;
            outstanding = sub(outstanding, take)?;
            allocation.lines.push(AllocationLine {
                request_id: demand.request_id,
                item_id: demand.item_id,
                product_id: demand.product_id,
                batch_id: batch.batch_id,
                quantity: take,
            });
        }

        let allocated = sub(required, outstanding)?;
        book.record(demand.product_id, required, allocated)?;
        if allocated.is_positive() {
            allocation.settlements.push(ItemSettlement {
                request_id: demand.request_id,
                item_id: demand.item_id,
                allocated,
                decrement: demand.decrement_for(allocated)?,
            });
        }
    }

    allocation.coverage = book.finish(stock)?;
    Ok(allocation)
}

/// One caller-chosen (product, batch, base units) line for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppliedLine {
    pub product_id: ProductId,
    pub batch_id: BatchId,
    pub quantity: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuppliedFulfillment {
    pub request_id: RequestId,
    pub items: Vec<SuppliedLine>,
}

/// Check a caller-supplied allocation against demand and stock.
///
/// Each supplied line is spread over the request's items for that product in
/// item order, never past an item's outstanding requirement. Any line that
/// does not fit rejects the whole allocation: a product the request does not
/// ask for, a batch of another product, more than the batch holds at `source`,
/// or more than the request still needs.
pub fn validate_supplied(
    source: LocationId,
    demands: &[Demand],
    stock: &StockSnapshot,
    supplied: &[SuppliedFulfillment],
) -> InventoryResult<Allocation> {
    let mut pool = pool_of(stock);
    let batch_products = batch_products(stock);

    let mut outstanding: Vec<Quantity> = demands
        .iter()
        .map(Demand::required_base)
        .collect::<InventoryResult<_>>()?;
    let mut allocated = vec![Quantity::ZERO; demands.len()];
    let mut allocation = Allocation::default();

    for fulfillment in supplied {
        for line in &fulfillment.items {
            if !line.quantity.is_positive() {
                return Err(InventoryError::invalid_quantity(format!(
                    "supplied quantity for batch {} must be positive, got {}",
                    line.batch_id, line.quantity
                )));
            }

            if batch_products
                .get(&line.batch_id)
                .is_some_and(|product_id| *product_id != line.product_id)
            {
                return Err(InventoryError::validation(format!(
                    "batch {} does not belong to product {}",
                    line.batch_id, line.product_id
                )));
            }

            let mut none = Quantity::ZERO;
            let available = pool.get_mut(&line.batch_id).unwrap_or(&mut none);
            if line.quantity > *available {
                return Err(InventoryError::InsufficientStock {
                    location_id: source,
                    product_id: line.product_id,
                    batch_id: Some(line.batch_id),
                    available: *available,
                    requested: line.quantity,
                    shortfall: sub(line.quantity, *available)?,
                });
            }
            *available = sub(*available, line.quantity)?;

            let targets: Vec<usize> = demands
                .iter()
                .enumerate()
                .filter(|(_, d)| d.request_id == fulfillment.request_id && d.product_id == line.product_id)
                .map(|(i, _)| i)
                .collect();
            if targets.is_empty() {
                return Err(InventoryError::validation(format!(
                    "request {} has no outstanding item for product {}",
                    fulfillment.request_id, line.product_id
                )));
            }

            let mut left = line.quantity;
            for i in targets {
                if !left.is_positive() {
                    break;
                }
                let take = left.min(outstanding[i]);
                if !take.is_positive() {
                    continue;
                }
                outstanding[i] = sub(outstanding[i], take)?;
                allocated[i] = add(allocated[i], take)?;
                left = sub(left, take)?;
                allocation.lines.push(AllocationLine {
                    request_id: demands[i].request_id,
                    item_id: demands[i].item_id,
                    product_id: line.product_id,
                    batch_id: line.batch_id,
                    quantity: take,
                });
            }

            if left.is_positive() {
                return Err(InventoryError::validation(format!(
                    "request {} is over-allocated for product {} by {left} base units",
                    fulfillment.request_id, line.product_id
                )));
            }
        }
    }

    settle_lines(demands, &allocated, stock, allocation.lines)
}

/// Check the lines of a plan that left the server against current demand.
///
/// Every line must name an outstanding item of its request, move that item's
/// product, and draw from a batch of that product. An item's lines together
/// may not exceed what it still needs. Settlements and coverage are rebuilt
/// from the lines; nothing the caller sent besides the lines is trusted.
/// Batch balances are left to the executing transaction.
pub fn review_lines(
    demands: &[Demand],
    stock: &StockSnapshot,
    lines: &[AllocationLine],
) -> InventoryResult<Allocation> {
    let batch_products = batch_products(stock);
    let mut allocated = vec![Quantity::ZERO; demands.len()];

    for line in lines {
        if !line.quantity.is_positive() {
            return Err(InventoryError::invalid_quantity(format!(
                "planned quantity for batch {} must be positive, got {}",
                line.batch_id, line.quantity
            )));
        }
        let Some(i) = demands
            .iter()
            .position(|d| d.request_id == line.request_id && d.item_id == line.item_id)
        else {
            return Err(InventoryError::validation(format!(
                "item {} of request {} has nothing outstanding",
                line.item_id, line.request_id
            )));
        };
        if demands[i].product_id != line.product_id {
            return Err(InventoryError::validation(format!(
                "item {} asks for product {}, not {}",
                line.item_id, demands[i].product_id, line.product_id
            )));
        }
        if batch_products
            .get(&line.batch_id)
            .is_some_and(|product_id| *product_id != line.product_id)
        {
            return Err(InventoryError::validation(format!(
                "batch {} does not belong to product {}",
                line.batch_id, line.product_id
            )));
        }
        allocated[i] = add(allocated[i], line.quantity)?;
    }

    for (demand, allocated) in demands.iter().zip(&allocated) {
        let required = demand.required_base()?;
        if *allocated > required {
            return Err(InventoryError::validation(format!(
                "item {} of request {} is over-allocated by {} base units",
                demand.item_id,
                demand.request_id,
                sub(*allocated, required)?
            )));
        }
    }

    settle_lines(demands, &allocated, stock, lines.to_vec())
}

fn batch_products(stock: &StockSnapshot) -> HashMap<BatchId, ProductId> {
    stock
        .values()
        .flatten()
        .map(|b| (b.batch_id, b.product_id))
        .collect()
}

/// Settlements and coverage for base units already allocated per demand.
fn settle_lines(
    demands: &[Demand],
    allocated: &[Quantity],
    stock: &StockSnapshot,
    lines: Vec<AllocationLine>,
) -> InventoryResult<Allocation> {
    let mut book = CoverageBook::default();
    let mut allocation = Allocation {
        lines,
        ..Allocation::default()
    };
    for (demand, allocated) in demands.iter().zip(allocated) {
        book.record(demand.product_id, demand.required_base()?, *allocated)?;
        if allocated.is_positive() {
            allocation.settlements.push(ItemSettlement {
                request_id: demand.request_id,
                item_id: demand.item_id,
                allocated: *allocated,
                decrement: demand.decrement_for(*allocated)?,
            });
        }
    }
    allocation.coverage = book.finish(stock)?;
    Ok(allocation)
}

/// Request version observed while planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedRequest {
    pub request_id: RequestId,
    pub version: u64,
}

impl PlannedRequest {
    pub fn of(request: &StockMovementRequest) -> Self {
        Self {
            request_id: request.request_id(),
            version: request.version(),
        }
    }
}

/// Reviewable allocation plan; input to the execute step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentPlan {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub requests: Vec<PlannedRequest>,
    pub lines: Vec<AllocationLine>,
    pub settlements: Vec<ItemSettlement>,
    pub coverage: Vec<ProductCoverage>,
    #[serde(default)]
    pub note: Option<String>,
}

impl FulfillmentPlan {
    pub fn new(
        from_location_id: LocationId,
        to_location_id: LocationId,
        requests: Vec<PlannedRequest>,
        allocation: Allocation,
        note: Option<String>,
    ) -> Self {
        Self {
            from_location_id,
            to_location_id,
            requests,
            lines: allocation.lines,
            settlements: allocation.settlements,
            coverage: allocation.coverage,
            note,
        }
    }

    pub fn is_fully_covered(&self) -> bool {
        self.coverage.iter().all(|c| c.shortfall.is_zero())
    }

    /// First uncovered product as `InsufficientStock`.
    pub fn require_full_coverage(&self) -> InventoryResult<()> {
        match self.coverage.iter().find(|c| c.shortfall.is_positive()) {
            None => Ok(()),
            Some(c) => Err(InventoryError::InsufficientStock {
                location_id: self.from_location_id,
                product_id: c.product_id,
                batch_id: None,
                available: c.allocated,
                requested: c.required,
                shortfall: c.shortfall,
            }),
        }
    }

    /// Total base units planned per batch.
    pub fn per_batch_totals(&self) -> InventoryResult<Vec<(ProductId, BatchId, Quantity)>> {
        let mut totals: Vec<(ProductId, BatchId, Quantity)> = Vec::new();
        for line in &self.lines {
            match totals.iter_mut().find(|(_, b, _)| *b == line.batch_id) {
                Some(entry) => entry.2 = add(entry.2, line.quantity)?,
                None => totals.push((line.product_id, line.batch_id, line.quantity)),
            }
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use medstock_core::PresentationId;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn stock_batch(
        product_id: ProductId,
        expires_in: Option<i64>,
        on_hand: i64,
        presentation_id: Option<PresentationId>,
    ) -> AvailableBatch {
        let batch_id = BatchId::new();
        AvailableBatch {
            batch_id,
            product_id,
            batch_number: batch_id.to_string(),
            expires_at: expires_in.map(|d| today() + Duration::days(d)),
            presentation_id,
            on_hand: Quantity::units(on_hand),
        }
    }

    fn demand(product_id: ProductId, unit: UnitOfMeasure, remaining: i64) -> Demand {
        Demand {
            request_id: RequestId::new(),
            item_id: RequestItemId::new(),
            product_id,
            unit,
            remaining: Quantity::units(remaining),
        }
    }

    fn boxes_of(units: Decimal, presentation_id: PresentationId) -> UnitOfMeasure {
        UnitOfMeasure::Presentation {
            presentation_id,
            units_per_presentation: units,
        }
    }

    #[test]
    fn exact_fulfillment_with_matching_packaging() {
        let product = ProductId::new();
        let box20 = PresentationId::new();
        let batch = stock_batch(product, Some(30), 50, Some(box20));
        let stock = StockSnapshot::from([(product, vec![batch.clone()])]);
        let d = demand(product, boxes_of(dec!(20), box20), 2);

        let plan = plan_allocation(&[d.clone()], &stock).unwrap();

        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].batch_id, batch.batch_id);
        assert_eq!(plan.lines[0].quantity, Quantity::units(40));
        assert_eq!(plan.settlements[0].decrement, Quantity::units(2));
        assert!(plan.coverage[0].shortfall.is_zero());
    }

    #[test]
    fn partial_across_batches_draws_soonest_first() {
        let product = ProductId::new();
        let x = stock_batch(product, Some(5), 30, None);
        let y = stock_batch(product, Some(90), 200, None);
        let stock = StockSnapshot::from([(product, vec![y.clone(), x.clone()])]);

        let plan = plan_allocation(&[demand(product, UnitOfMeasure::Base, 100)], &stock).unwrap();

        let drawn: Vec<(BatchId, Quantity)> = plan.lines.iter().map(|l| (l.batch_id, l.quantity)).collect();
        assert_eq!(
            drawn,
            vec![(x.batch_id, Quantity::units(30)), (y.batch_id, Quantity::units(70))]
        );
        assert_eq!(plan.settlements[0].decrement, Quantity::units(100));
    }

    #[test]
    fn shortage_allocates_what_exists_and_truncates_decrement() {
        let product = ProductId::new();
        let box20 = PresentationId::new();
        let stock = StockSnapshot::from([(product, vec![stock_batch(product, Some(5), 30, None)])]);

        let plan = plan_allocation(&[demand(product, boxes_of(dec!(20), box20), 2)], &stock).unwrap();

        assert_eq!(plan.lines[0].quantity, Quantity::units(30));
        assert_eq!(plan.settlements[0].decrement, Quantity::units(1));
        let coverage = &plan.coverage[0];
        assert_eq!(coverage.required, Quantity::units(40));
        assert_eq!(coverage.allocated, Quantity::units(30));
        assert_eq!(coverage.shortfall, Quantity::units(10));
    }

    #[test]
    fn product_without_batches_is_skipped() {
        let missing = ProductId::new();
        let plan = plan_allocation(&[demand(missing, UnitOfMeasure::Base, 5)], &StockSnapshot::new()).unwrap();

        assert!(plan.lines.is_empty());
        assert!(plan.settlements.is_empty());
        assert_eq!(plan.coverage[0].batches_found, 0);
        assert_eq!(plan.coverage[0].shortfall, Quantity::units(5));
    }

    #[test]
    fn shared_product_is_first_selected_first_served() {
        let product = ProductId::new();
        let stock = StockSnapshot::from([(product, vec![stock_batch(product, Some(5), 12, None)])]);
        let first = demand(product, UnitOfMeasure::Base, 10);
        let second = demand(product, UnitOfMeasure::Base, 10);

        let plan = plan_allocation(&[first.clone(), second.clone()], &stock).unwrap();

        let by_item: Vec<(RequestItemId, Quantity)> =
            plan.settlements.iter().map(|s| (s.item_id, s.allocated)).collect();
        assert_eq!(
            by_item,
            vec![(first.item_id, Quantity::units(10)), (second.item_id, Quantity::units(2))]
        );
        assert_eq!(plan.coverage.len(), 1);
        assert_eq!(plan.coverage[0].shortfall, Quantity::units(8));
    }

    #[test]
    fn packaging_match_preferred_only_on_equal_expiry() {
        let product = ProductId::new();
        let box10 = PresentationId::new();
        let loose_same_day = stock_batch(product, Some(20), 100, None);
        let boxed_same_day = stock_batch(product, Some(20), 100, Some(box10));
        let stock = StockSnapshot::from([(product, vec![loose_same_day, boxed_same_day.clone()])]);

        let plan = plan_allocation(&[demand(product, boxes_of(dec!(10), box10), 3)], &stock).unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].batch_id, boxed_same_day.batch_id);
    }

    #[test]
    fn supplied_plan_is_spread_over_items_and_checked() {
        let product = ProductId::new();
        let batch = stock_batch(product, Some(5), 50, None);
        let stock = StockSnapshot::from([(product, vec![batch.clone()])]);

        let request_id = RequestId::new();
        let mut a = demand(product, UnitOfMeasure::Base, 10);
        let mut b = demand(product, UnitOfMeasure::Base, 10);
        a.request_id = request_id;
        b.request_id = request_id;
        let demands = vec![a.clone(), b.clone()];

        let supplied = vec![SuppliedFulfillment {
            request_id,
            items: vec![SuppliedLine {
                product_id: product,
                batch_id: batch.batch_id,
                quantity: Quantity::units(15),
            }],
        }];
        let plan = validate_supplied(LocationId::new(), &demands, &stock, &supplied).unwrap();
        let split: Vec<(RequestItemId, Quantity)> = plan.lines.iter().map(|l| (l.item_id, l.quantity)).collect();
        assert_eq!(
            split,
            vec![(a.item_id, Quantity::units(10)), (b.item_id, Quantity::units(5))]
        );

        let too_much = vec![SuppliedFulfillment {
            request_id,
            items: vec![SuppliedLine {
                product_id: product,
                batch_id: batch.batch_id,
                quantity: Quantity::units(25),
            }],
        }];
        assert_eq!(
            validate_supplied(LocationId::new(), &demands, &stock, &too_much).unwrap_err().code(),
            "validation_failed"
        );
    }

    #[test]
    fn supplied_plan_cannot_exceed_batch() {
        let product = ProductId::new();
        let batch = stock_batch(product, Some(5), 4, None);
        let stock = StockSnapshot::from([(product, vec![batch.clone()])]);
        let d = demand(product, UnitOfMeasure::Base, 10);

        let supplied = vec![SuppliedFulfillment {
            request_id: d.request_id,
            items: vec![SuppliedLine {
                product_id: product,
                batch_id: batch.batch_id,
                quantity: Quantity::units(6),
            }],
        }];
        match validate_supplied(LocationId::new(), &[d], &stock, &supplied) {
            Err(InventoryError::InsufficientStock { shortfall, .. }) => assert_eq!(shortfall, Quantity::units(2)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn reviewed_lines_are_rechecked_against_demand() {
        let product = ProductId::new();
        let other = ProductId::new();
        let batch = stock_batch(product, Some(5), 100, None);
        let stock = StockSnapshot::from([(product, vec![batch.clone()])]);
        let d = demand(product, UnitOfMeasure::Base, 10);

        let mut lines = plan_allocation(&[d.clone()], &stock).unwrap().lines;
        assert_eq!(review_lines(&[d.clone()], &stock, &lines).unwrap().settlements[0].allocated, Quantity::units(10));

        lines[0].quantity = Quantity::units(90);
        assert_eq!(review_lines(&[d.clone()], &stock, &lines).unwrap_err().code(), "validation_failed");

        lines[0].quantity = Quantity::units(10);
        lines[0].product_id = other;
        assert_eq!(review_lines(&[d.clone()], &stock, &lines).unwrap_err().code(), "validation_failed");

        lines[0].product_id = product;
        lines[0].item_id = RequestItemId::new();
        assert_eq!(review_lines(&[d], &stock, &lines).unwrap_err().code(), "validation_failed");
    }

    #[test]
    fn reviewed_coverage_comes_from_the_lines() {
        let product = ProductId::new();
        let batch = stock_batch(product, Some(5), 100, None);
        let stock = StockSnapshot::from([(product, vec![batch.clone()])]);
        let d = demand(product, UnitOfMeasure::Base, 10);

        let lines = vec![AllocationLine {
            request_id: d.request_id,
            item_id: d.item_id,
            product_id: product,
            batch_id: batch.batch_id,
            quantity: Quantity::units(4),
        }];
        let reviewed = review_lines(&[d], &stock, &lines).unwrap();
        assert_eq!(reviewed.coverage[0].required, Quantity::units(10));
        assert_eq!(reviewed.coverage[0].shortfall, Quantity::units(6));
        assert_eq!(reviewed.settlements[0].decrement, Quantity::units(4));
    }

    #[test]
    fn require_full_coverage_reports_first_shortfall() {
        let product = ProductId::new();
        let stock = StockSnapshot::from([(product, vec![stock_batch(product, None, 3, None)])]);
        let allocation = plan_allocation(&[demand(product, UnitOfMeasure::Base, 5)], &stock).unwrap();
        let plan = FulfillmentPlan::new(LocationId::new(), LocationId::new(), vec![], allocation, None);

        assert!(!plan.is_fully_covered());
        match plan.require_full_coverage() {
            Err(InventoryError::InsufficientStock { shortfall, batch_id, .. }) => {
                assert_eq!(shortfall, Quantity::units(2));
                assert_eq!(batch_id, None);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn never_allocates_more_than_needed_or_held(
            on_hand in proptest::collection::vec(0i64..200, 1..6),
            needs in proptest::collection::vec(1i64..150, 1..6),
        ) {
            let product = ProductId::new();
            let batches: Vec<AvailableBatch> = on_hand
                .iter()
                .enumerate()
                .map(|(i, q)| stock_batch(product, Some(i as i64 * 7), *q, None))
                .collect();
            let stock = StockSnapshot::from([(product, batches.clone())]);
            let demands: Vec<Demand> = needs.iter().map(|n| demand(product, UnitOfMeasure::Base, *n)).collect();

            let plan = plan_allocation(&demands, &stock).unwrap();

            for batch in &batches {
                let drawn = Quantity::checked_sum(
                    plan.lines.iter().filter(|l| l.batch_id == batch.batch_id).map(|l| l.quantity),
                ).unwrap();
                prop_assert!(drawn <= batch.on_hand);
            }
            for d in &demands {
                let got = Quantity::checked_sum(
                    plan.lines.iter().filter(|l| l.item_id == d.item_id).map(|l| l.quantity),
                ).unwrap();
                prop_assert!(got <= d.remaining);
            }

            let total_held: i64 = on_hand.iter().sum();
            let total_needed: i64 = needs.iter().sum();
            prop_assert_eq!(plan.coverage[0].allocated, Quantity::units(total_held.min(total_needed)));
        }
    }
}
