//! Catalog read model (products, presentations, warehouses, locations, batches).
//!
//! These records are created by upstream catalog and receiving workflows. The
//! inventory core only reads them; constructors here validate the shape of a
//! record, not its uniqueness (that is the catalog store's job).

pub mod batch;
pub mod product;
pub mod warehouse;

pub use batch::Batch;
pub use product::{Presentation, Product};
pub use warehouse::{Location, Warehouse};
