//! Event contracts and publish/subscribe plumbing.
//!
//! The ledger is state-based (balances are rows, not folds over events), but
//! every committed change is still announced as an event so downstream readers
//! (reporting, notifications) can follow along. Events are published strictly
//! after the owning transaction commits.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
