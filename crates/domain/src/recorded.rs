//! Persisted domain events as delivered to event handlers.

use chrono::{DateTime, Utc};
use common::{AggregateId, CorrelationId};
use dispatch::Message;
use event_store::{EventId, StreamRecord, Version};

use crate::aggregate::DomainEvent;

/// Metadata key under which the correlation id of the originating command is
/// stored.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// A domain event together with its position in the event log.
#[derive(Debug, Clone)]
pub struct RecordedEvent<E> {
    pub event_id: EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Version of the aggregate after this event.
    pub version: Version,
    pub recorded_at: DateTime<Utc>,

    /// Correlation id of the command that produced the event, if recorded.
    pub correlation_id: Option<CorrelationId>,
    pub payload: E,
}

impl<E: DomainEvent> RecordedEvent<E> {
    /// Decodes a stream record into a typed event.
    pub fn from_record(record: &StreamRecord) -> Result<Self, serde_json::Error> {
        let correlation_id = record
            .metadata_value(CORRELATION_ID_KEY)
            .cloned()
            .map(serde_json::from_value)
            .transpose()?;

        Ok(Self {
            event_id: record.event_id,
            aggregate_id: record.aggregate_id,
            aggregate_type: record.aggregate_type.clone(),
            version: record.version,
            recorded_at: record.recorded_at,
            correlation_id,
            payload: record.payload_as()?,
        })
    }
}

impl<E: DomainEvent> Message for RecordedEvent<E> {
    type Kind = E::Kind;

    fn kind(&self) -> E::Kind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::{UserEvent, UserEventKind, WasRemoved};
    use event_store::NewEvent;

    fn stored(event: &UserEvent, metadata: Option<serde_json::Value>) -> StreamRecord {
        let new = NewEvent::from_payload(event.kind().to_string(), "User", event).unwrap();
        StreamRecord {
            event_id: new.event_id,
            aggregate_id: AggregateId::new(),
            aggregate_type: new.aggregate_type,
            version: Version::new(4),
            event_type: new.event_type,
            payload: new.payload,
            metadata: metadata
                .map(|v| [(CORRELATION_ID_KEY.to_string(), v)].into())
                .unwrap_or_default(),
            recorded_at: Utc::now(),
            position: 11,
        }
    }

    #[test]
    fn decodes_payload_and_correlation_id() {
        let correlation_id = CorrelationId::new();
        let event = UserEvent::WasRemoved(WasRemoved {
            id: AggregateId::new(),
        });
        let record = stored(&event, Some(serde_json::to_value(correlation_id).unwrap()));

        let recorded = RecordedEvent::<UserEvent>::from_record(&record).unwrap();

        assert_eq!(recorded.version, Version::new(4));
        assert_eq!(recorded.correlation_id, Some(correlation_id));
        assert_eq!(recorded.kind(), UserEventKind::WasRemoved);
    }

    #[test]
    fn missing_correlation_id_is_none() {
        let event = UserEvent::WasRemoved(WasRemoved {
            id: AggregateId::new(),
        });
        let recorded = RecordedEvent::<UserEvent>::from_record(&stored(&event, None)).unwrap();
        assert!(recorded.correlation_id.is_none());
    }

    #[test]
    fn foreign_payload_fails_to_decode() {
        let event = UserEvent::WasRemoved(WasRemoved {
            id: AggregateId::new(),
        });
        let mut record = stored(&event, None);
        record.payload = serde_json::json!({"type": "AccountLocked", "data": {}});

        assert!(RecordedEvent::<UserEvent>::from_record(&record).is_err());
    }
}
