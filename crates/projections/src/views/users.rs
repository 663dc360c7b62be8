//! Users read model: one row per registered, non-removed user.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Context};
use dispatch::{DispatchError, EventBus, EventHandler};
use domain::{Aggregate, RecordedEvent, User, UserEvent, UserEventKind};
use event_store::{EventStore, StreamRecord, Version};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::read_model::ReadModel;

/// Largest page [`UserView::list`] returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Denormalized user as served to queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRow {
    pub id: AggregateId,
    pub email: String,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,

    /// Version of the last event folded into this row.
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

/// One page of users plus the total number of users.
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserRow>,
    pub total: usize,
}

#[derive(Debug, Clone)]
enum Entry {
    Active(UserRow),
    /// Kept so late deliveries of older events cannot resurrect the row.
    Removed(Version),
}

impl Entry {
    fn version(&self) -> Version {
        match self {
            Entry::Active(row) => row.version,
            Entry::Removed(version) => *version,
        }
    }
}

/// Folds one event into the entry for its aggregate.
fn fold(entry: Option<Entry>, event: &RecordedEvent<UserEvent>) -> Option<Entry> {
    let row = |email: &str, google_id: Option<&str>, facebook_id: Option<&str>| {
        Entry::Active(UserRow {
            id: event.aggregate_id,
            email: email.to_string(),
            google_id: google_id.map(str::to_string),
            facebook_id: facebook_id.map(str::to_string),
            version: event.version,
            updated_at: event.recorded_at,
        })
    };

    match &event.payload {
        UserEvent::WasRegisteredWithEmail(data) => Some(row(&data.email, None, None)),
        UserEvent::WasRegisteredWithGoogle(data) => {
            Some(row(&data.email, Some(&data.google_id), None))
        }
        UserEvent::WasRegisteredWithFacebook(data) => {
            Some(row(&data.email, None, Some(&data.facebook_id)))
        }
        UserEvent::EmailAddressWasChanged(data) => match entry {
            Some(Entry::Active(mut row)) => {
                row.email = data.email.clone();
                row.version = event.version;
                row.updated_at = event.recorded_at;
                Some(Entry::Active(row))
            }
            other => other,
        },
        UserEvent::WasRemoved(_) => Some(Entry::Removed(event.version)),
    }
}

/// Read model listing users.
///
/// Event handlers run concurrently, so events of one user may arrive out of
/// order. An event already reflected in the row is ignored; an event that
/// skips ahead makes the view reload that user's stream from the event log.
#[derive(Clone)]
pub struct UserView {
    entries: Arc<RwLock<BTreeMap<AggregateId, Entry>>>,
    store: Arc<dyn EventStore>,
}

impl UserView {
    /// Creates an empty view that reloads streams from `store`.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            store,
        }
    }

    pub async fn get(&self, id: AggregateId) -> Option<UserRow> {
        match self.entries.read().await.get(&id) {
            Some(Entry::Active(row)) => Some(row.clone()),
            _ => None,
        }
    }

    /// Returns page `page` (1-based) of at most `limit` users ordered by id.
    ///
    /// `page` is raised to at least 1 and `limit` is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub async fn list(&self, page: u32, limit: u32) -> UserPage {
        let page = page.max(1) as usize;
        let limit = limit.clamp(1, MAX_PAGE_SIZE) as usize;

        let entries = self.entries.read().await;
        let active = entries.values().filter_map(|entry| match entry {
            Entry::Active(row) => Some(row),
            Entry::Removed(_) => None,
        });

        let total = active.clone().count();
        let users = active
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect();

        UserPage { users, total }
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserRow> {
        self.entries
            .read()
            .await
            .values()
            .find_map(|entry| match entry {
                Entry::Active(row) if row.email == email => Some(row.clone()),
                _ => None,
            })
    }

    /// Folds a published event into the view.
    #[tracing::instrument(
        skip(self, ctx, event),
        fields(user_id = %event.aggregate_id, version = %event.version)
    )]
    pub async fn project(&self, ctx: &Context, event: &RecordedEvent<UserEvent>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let id = event.aggregate_id;
        let current = entries
            .get(&id)
            .map(Entry::version)
            .unwrap_or(Version::initial());

        if event.version <= current {
            tracing::debug!(%current, "event already projected");
            return Ok(());
        }

        if event.version == current.next() {
            if let Some(entry) = fold(entries.remove(&id), event) {
                entries.insert(id, entry);
            }
        } else {
            tracing::debug!(%current, "gap in delivered events, reloading stream");
            metrics::counter!("projection_stream_reloads_total", "projection" => "UserView")
                .increment(1);

            let records = self.store.load(ctx, id).await?;
            entries.remove(&id);
            if let Some(entry) = fold_records(None, &records)? {
                entries.insert(id, entry);
            }
        }

        metrics::counter!("projection_events_applied_total", "projection" => "UserView")
            .increment(1);
        Ok(())
    }

    /// Replaces the view's content with a fold of the whole event log.
    ///
    /// The write lock is held from the log read to the swap, so events
    /// projected meanwhile wait and are folded on top of the rebuilt rows.
    ///
    /// Returns the number of user events applied.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn rebuild(&self, ctx: &Context) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let records = self.store.load_all(ctx).await?;

        let mut rebuilt = BTreeMap::new();
        let mut applied = 0;
        for record in records
            .iter()
            .filter(|r| r.aggregate_type == User::aggregate_type())
        {
            let event = RecordedEvent::<UserEvent>::from_record(record)?;
            if let Some(entry) = fold(rebuilt.remove(&record.aggregate_id), &event) {
                rebuilt.insert(record.aggregate_id, entry);
            }
            applied += 1;
        }

        let users = rebuilt
            .values()
            .filter(|entry| matches!(entry, Entry::Active(_)))
            .count();
        *entries = rebuilt;
        tracing::info!(events = applied, users, "user view rebuilt");
        Ok(applied)
    }
}

fn fold_records(mut entry: Option<Entry>, records: &[StreamRecord]) -> Result<Option<Entry>> {
    for record in records {
        let event = RecordedEvent::<UserEvent>::from_record(record)?;
        entry = fold(entry, &event);
    }
    Ok(entry)
}

#[async_trait]
impl EventHandler<RecordedEvent<UserEvent>> for UserView {
    fn name(&self) -> &'static str {
        "UserView"
    }

    async fn handle(
        &self,
        ctx: Context,
        event: Arc<RecordedEvent<UserEvent>>,
    ) -> std::result::Result<(), DispatchError> {
        self.project(&ctx, &event).await.map_err(Into::into)
    }
}

impl ReadModel for UserView {
    fn name(&self) -> &'static str {
        "UserView"
    }

    fn count(&self) -> usize {
        // Use try_read to avoid blocking; returns 0 if lock is held
        self.entries
            .try_read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| matches!(e, Entry::Active(_)))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Subscribes `view` to every user event kind.
pub fn register_user_projections(
    bus: &mut EventBus<RecordedEvent<UserEvent>>,
    view: Arc<UserView>,
) {
    for kind in UserEventKind::ALL {
        bus.subscribe(kind, view.clone());
    }
}
