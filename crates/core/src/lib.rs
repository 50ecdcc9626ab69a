//! `medstock-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog and the
//! inventory ledger: typed identifiers, the fixed-point `Quantity`, and the
//! small set of traits aggregates and entities implement.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    BatchId, LocationId, MovementId, PresentationId, ProductId, RequestId, RequestItemId,
    TenantId, WarehouseId,
};
pub use value_object::{Quantity, ValueObject};
