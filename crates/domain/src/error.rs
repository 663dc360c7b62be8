//! Domain error types.

use common::AggregateId;
use dispatch::DispatchError;
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The aggregate has no recorded history.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// The aggregate's current state does not allow the mutation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The command carried invalid input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DomainError> for DispatchError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::EventStore(e) => e.into(),
            DomainError::NotFound {
                aggregate_type,
                aggregate_id,
            } => DispatchError::NotFound {
                aggregate_type: aggregate_type.to_string(),
                aggregate_id,
            },
            DomainError::InvalidState(reason) => DispatchError::InvalidState(reason),
            DomainError::InvalidArgument(reason) => DispatchError::InvalidArgument(reason),
            DomainError::Serialization(e) => DispatchError::Internal(e.to_string()),
        }
    }
}
