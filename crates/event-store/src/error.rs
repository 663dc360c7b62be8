use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The stream head did not match the caller's expected version.
    /// Nothing was written.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// An append was attempted with no events.
    #[error("Cannot append an empty batch to aggregate {0}")]
    EmptyAppend(AggregateId),

    /// The batch was malformed (e.g. mixed aggregate types).
    #[error("Invalid batch for aggregate {aggregate_id}: {reason}")]
    InvalidBatch {
        aggregate_id: AggregateId,
        reason: String,
    },

    /// The backing storage could not be reached.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
