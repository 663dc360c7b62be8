use async_trait::async_trait;
use common::Context;

use crate::{AggregateId, EventStoreError, NewEvent, Result, StreamRecord, Version};

/// Core trait for event log implementations.
///
/// Streams are append-only and keyed by aggregate id. All implementations
/// must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events to an aggregate stream.
    ///
    /// Fails with [`EventStoreError::ConcurrencyConflict`] when the stream
    /// head is not `expected_version`. The batch is applied atomically as the
    /// contiguous range `expected_version + 1 ..= expected_version + n`, or
    /// not at all.
    ///
    /// Returns the new head version.
    async fn append(
        &self,
        ctx: &Context,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<NewEvent>,
    ) -> Result<Version>;

    /// Loads every record of an aggregate stream in version order.
    ///
    /// An aggregate without history yields an empty vector, not an error.
    async fn load(&self, ctx: &Context, aggregate_id: AggregateId) -> Result<Vec<StreamRecord>>;

    /// Loads the records of a stream starting at `from_version` (inclusive).
    async fn load_from(
        &self,
        ctx: &Context,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<StreamRecord>>;

    /// Loads every record in the store in global insertion order.
    async fn load_all(&self, ctx: &Context) -> Result<Vec<StreamRecord>>;

    /// Returns the head version of a stream ([`Version::initial`] when empty).
    async fn head_version(&self, ctx: &Context, aggregate_id: AggregateId) -> Result<Version>;

    /// Checks that the store can serve requests.
    async fn ping(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event.
    async fn append_one(
        &self,
        ctx: &Context,
        aggregate_id: AggregateId,
        expected_version: Version,
        event: NewEvent,
    ) -> Result<Version> {
        self.append(ctx, aggregate_id, expected_version, vec![event])
            .await
    }

    /// Checks if an aggregate has any recorded history.
    async fn aggregate_exists(&self, ctx: &Context, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.head_version(ctx, aggregate_id).await? > Version::initial())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before it is appended.
///
/// The batch must be non-empty and every event must name the same
/// aggregate type.
pub fn validate_batch(aggregate_id: AggregateId, events: &[NewEvent]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::EmptyAppend(aggregate_id));
    };

    if let Some(odd) = events
        .iter()
        .find(|e| e.aggregate_type != first.aggregate_type)
    {
        return Err(EventStoreError::InvalidBatch {
            aggregate_id,
            reason: format!(
                "mixed aggregate types {} and {}",
                first.aggregate_type, odd.aggregate_type
            ),
        });
    }

    Ok(())
}
