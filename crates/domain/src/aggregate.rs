//! Core aggregate and domain event traits.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    /// Enumerated tag naming each kind of event.
    ///
    /// Its `Display` output is the `event_type` stored in the event log and
    /// the key event handlers subscribe under.
    type Kind: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Trait for aggregates in an event-sourced system.
///
/// An aggregate is rebuilt by replaying its stream into a [`blank`] instance.
/// Mutation methods validate the current state and [`record`] the resulting
/// events; nothing is persisted until the repository saves the aggregate.
///
/// One instance must never be shared between concurrent handlers; every
/// repository `get` returns an independent copy.
///
/// [`blank`]: Aggregate::blank
/// [`record`]: Aggregate::record
pub trait Aggregate: Send + Sync + Sized + 'static {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    ///
    /// Stored with every event of the stream.
    fn aggregate_type() -> &'static str;

    /// Creates an instance with no history at version 0.
    fn blank(id: AggregateId) -> Self;

    fn id(&self) -> AggregateId;

    /// Returns the version of the last persisted event applied.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// Must be pure and deterministic, and must not fail: the event is a fact.
    fn apply(&mut self, event: &Self::Event);

    /// Events recorded since the aggregate was loaded or last saved.
    fn pending_events(&self) -> &[Self::Event];

    fn pending_mut(&mut self) -> &mut Vec<Self::Event>;

    /// Applies `event` and queues it for the next save.
    fn record(&mut self, event: Self::Event) {
        self.apply(&event);
        self.pending_mut().push(event);
    }

    /// Removes and returns the pending events.
    fn take_pending(&mut self) -> Vec<Self::Event> {
        std::mem::take(self.pending_mut())
    }

    /// Applies persisted history in order, advancing the version by one per
    /// event.
    fn replay(&mut self, history: impl IntoIterator<Item = Self::Event>) {
        for event in history {
            self.apply(&event);
            self.set_version(self.version().next());
        }
    }
}
