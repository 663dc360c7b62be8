//! Dispatch error taxonomy.

use common::{AggregateId, ContextError};
use event_store::{EventStoreError, Version};
use thiserror::Error;

/// Errors delivered on a command's reply channel or returned by an event
/// handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A handler is already registered for this command kind.
    #[error("Handler already registered for command {kind}")]
    DuplicateRegistration { kind: String },

    /// No handler is registered for this command kind.
    #[error("No handler registered for command {kind}")]
    HandlerNotFound { kind: String },

    /// The aggregate stream moved on since it was loaded.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The aggregate has no recorded history.
    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: String,
        aggregate_id: AggregateId,
    },

    /// A domain rule rejected the command in the aggregate's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The command could not be decoded or carried invalid input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unexpected failure, including a handler panic.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The caller stopped waiting for the result.
    ///
    /// Only produced on the waiting side of [`CommandBus::dispatch`]; the
    /// handler itself keeps running.
    ///
    /// [`CommandBus::dispatch`]: crate::CommandBus::dispatch
    #[error("Dispatch abandoned: {0}")]
    Cancelled(ContextError),
}

impl DispatchError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if retrying the command after reloading could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl From<EventStoreError> for DispatchError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            } => Self::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ContextError> for DispatchError {
    fn from(err: ContextError) -> Self {
        Self::Cancelled(err)
    }
}
