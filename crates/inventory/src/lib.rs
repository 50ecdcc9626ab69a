//! Inventory domain module.
//!
//! This crate contains the business rules of the stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - `units`: presentation counts ↔ base units
//! - `fefo`: first-expire-first-out batch ordering
//! - `ledger`: balance rows and the non-negative delta rule
//! - `movement`: movement input validation and the immutable movement record
//! - `request`: the stock request lifecycle
//! - `allocation`: bulk fulfillment planning
//!
//! Transactions, stores and services composing these live in `medstock-infra`.

pub mod allocation;
pub mod error;
pub mod events;
pub mod fefo;
pub mod ledger;
pub mod movement;
pub mod request;
pub mod units;

pub use allocation::{
    Allocation, AllocationLine, Demand, FulfillmentPlan, ItemSettlement, PlannedRequest,
    ProductCoverage, StockSnapshot, SuppliedFulfillment, SuppliedLine, plan_allocation,
    review_lines, validate_supplied,
};
pub use error::{InventoryError, InventoryResult};
pub use events::{
    InventoryEvent, MovementRecorded, RequestChanged, RequestConfirmed, RequestFulfillment,
};
pub use fefo::{AvailableBatch, compare_expiry, sort_fefo, sort_fefo_preferring};
pub use ledger::{BalanceKey, InventoryBalance, apply_delta};
pub use movement::{
    MovementDraft, MovementKind, MovementNumber, MovementQuantity, MovementReference,
    MovementType, NewMovement, ResolvedMovement, StockMovement, numbering_year,
    validate_quantity,
};
pub use request::{
    Confirmation, ConfirmationDecision, ConfirmationStatus, NewRequestItem, RequestItem,
    RequestStatus, Settlement, StockMovementRequest,
};
pub use units::{UnitOfMeasure, from_base_units, to_base_units};
