//! Loads aggregates from the event log and saves their pending events.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, Context};
use dispatch::EventBus;
use event_store::{EventStore, NewEvent, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;
use crate::recorded::{CORRELATION_ID_KEY, RecordedEvent};

/// Repository for one aggregate type.
///
/// Composes the event store with the event bus: [`get`](Self::get) replays a
/// stream into a fresh instance, [`save`](Self::save) appends the pending
/// events under optimistic concurrency and then publishes them.
pub struct Repository<A, S>
where
    A: Aggregate,
    S: EventStore,
{
    store: S,
    events: Arc<EventBus<RecordedEvent<A::Event>>>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A, S> Repository<A, S>
where
    A: Aggregate,
    S: EventStore,
{
    pub fn new(store: S, events: Arc<EventBus<RecordedEvent<A::Event>>>) -> Self {
        Self {
            store,
            events,
            _aggregate: PhantomData,
        }
    }

    /// Rebuilds the aggregate from its full stream.
    ///
    /// Fails with [`DomainError::NotFound`] when the stream is empty. Every
    /// call returns an independent instance.
    #[tracing::instrument(skip(self, ctx), fields(aggregate_type = A::aggregate_type()))]
    pub async fn get(&self, ctx: &Context, id: AggregateId) -> Result<A, DomainError> {
        let records = self.store.load(ctx, id).await?;
        if records.is_empty() {
            return Err(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id,
            });
        }

        let history = records
            .iter()
            .map(|record| record.payload_as::<A::Event>())
            .collect::<Result<Vec<_>, _>>()?;

        let mut aggregate = A::blank(id);
        aggregate.replay(history);
        Ok(aggregate)
    }

    /// Persists the aggregate's pending events, then publishes each of them.
    ///
    /// The aggregate's version is the expected stream head. On success the
    /// pending events are cleared and the aggregate moves to the new head.
    /// If the append fails nothing is published and the aggregate is left
    /// untouched. Handler failures on the event bus never surface here.
    ///
    /// Saving an aggregate with nothing pending is a no-op.
    #[tracing::instrument(
        skip(self, ctx, aggregate),
        fields(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %aggregate.id(),
            correlation_id = %ctx.correlation_id()
        )
    )]
    pub async fn save(&self, ctx: &Context, aggregate: &mut A) -> Result<Version, DomainError> {
        if aggregate.pending_events().is_empty() {
            return Ok(aggregate.version());
        }

        let aggregate_id = aggregate.id();
        let expected = aggregate.version();
        let correlation_id = ctx.correlation_id();
        let correlation_value = serde_json::to_value(correlation_id)?;

        let batch = aggregate
            .pending_events()
            .iter()
            .map(|event| {
                Ok(
                    NewEvent::from_payload(event.kind().to_string(), A::aggregate_type(), event)?
                        .with_metadata(CORRELATION_ID_KEY, correlation_value.clone()),
                )
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        let event_ids: Vec<_> = batch.iter().map(|event| event.event_id).collect();

        let head = self.store.append(ctx, aggregate_id, expected, batch).await?;

        let events = aggregate.take_pending();
        aggregate.set_version(head);
        metrics::counter!(
            "repository_events_saved_total",
            "aggregate_type" => A::aggregate_type()
        )
        .increment(events.len() as u64);
        tracing::debug!(%expected, %head, "aggregate saved");

        let recorded_at = Utc::now();
        for (offset, (payload, event_id)) in events.into_iter().zip(event_ids).enumerate() {
            self.events.publish(
                ctx,
                RecordedEvent {
                    event_id,
                    aggregate_id,
                    aggregate_type: A::aggregate_type().to_string(),
                    version: expected.advance(offset + 1),
                    recorded_at,
                    correlation_id: Some(correlation_id),
                    payload,
                },
            );
        }

        Ok(head)
    }
}
