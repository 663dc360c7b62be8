//! Append-only event log for event-sourced aggregates.
//!
//! Each aggregate owns one stream of [`StreamRecord`]s with gapless versions
//! starting at 1. Appends are version-checked against the caller's expected
//! head, so concurrent writers are detected instead of serialized.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventId, NewEvent, StreamRecord, Version};
pub use memory::InMemoryEventStore;
pub use store::{EventStore, EventStoreExt};
