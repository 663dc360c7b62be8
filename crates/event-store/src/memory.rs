use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::Context;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventStoreError, NewEvent, Result, StreamRecord, Version,
    store::{EventStore, validate_batch},
};

#[derive(Default)]
struct Streams {
    by_aggregate: HashMap<AggregateId, Vec<StreamRecord>>,
    last_position: u64,
}

impl Streams {
    fn head(&self, aggregate_id: AggregateId) -> Version {
        self.by_aggregate
            .get(&aggregate_id)
            .and_then(|stream| stream.last())
            .map(|record| record.version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// Streams live behind a single `RwLock`; an append checks the head version
/// and writes the whole batch while holding the write lock, which makes the
/// batch atomic with respect to every other reader and writer.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.streams
            .read()
            .await
            .by_aggregate
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Returns the number of aggregates with at least one event.
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.by_aggregate.len()
    }

    /// Clears all streams.
    pub async fn clear(&self) {
        let mut streams = self.streams.write().await;
        streams.by_aggregate.clear();
        streams.last_position = 0;
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(
        skip(self, ctx, events),
        fields(correlation_id = %ctx.correlation_id(), batch = events.len())
    )]
    async fn append(
        &self,
        ctx: &Context,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<NewEvent>,
    ) -> Result<Version> {
        validate_batch(aggregate_id, &events)?;

        let mut streams = self.streams.write().await;
        metrics::counter!("event_store_appends_total").increment(1);

        let head = streams.head(aggregate_id);
        if head != expected_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(%expected_version, actual = %head, "append rejected");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: head,
            });
        }

        let recorded_at = Utc::now();
        let count = events.len();
        let mut position = streams.last_position;
        let records: Vec<StreamRecord> = events
            .into_iter()
            .enumerate()
            .map(|(offset, event)| {
                position += 1;
                StreamRecord {
                    event_id: event.event_id,
                    aggregate_id,
                    aggregate_type: event.aggregate_type,
                    version: expected_version.advance(offset + 1),
                    event_type: event.event_type,
                    payload: event.payload,
                    metadata: event.metadata,
                    recorded_at,
                    position,
                }
            })
            .collect();

        streams.last_position = position;
        streams
            .by_aggregate
            .entry(aggregate_id)
            .or_default()
            .extend(records);

        let new_head = expected_version.advance(count);
        metrics::counter!("event_store_events_appended_total").increment(count as u64);
        tracing::debug!(%new_head, "events appended");

        Ok(new_head)
    }

    async fn load(&self, _ctx: &Context, aggregate_id: AggregateId) -> Result<Vec<StreamRecord>> {
        let streams = self.streams.read().await;
        Ok(streams
            .by_aggregate
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_from(
        &self,
        _ctx: &Context,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<StreamRecord>> {
        let streams = self.streams.read().await;
        Ok(streams
            .by_aggregate
            .get(&aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|record| record.version >= from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn load_all(&self, _ctx: &Context) -> Result<Vec<StreamRecord>> {
        let streams = self.streams.read().await;
        let mut records: Vec<StreamRecord> =
            streams.by_aggregate.values().flatten().cloned().collect();
        records.sort_by_key(|record| record.position);
        Ok(records)
    }

    async fn head_version(&self, _ctx: &Context, aggregate_id: AggregateId) -> Result<Version> {
        Ok(self.streams.read().await.head(aggregate_id))
    }
}
