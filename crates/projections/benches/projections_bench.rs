use std::sync::Arc;

use common::{AggregateId, Context};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{DomainEvent, RecordedEvent, UserEvent, WasRegisteredWithEmail};
use event_store::{EventId, EventStore, InMemoryEventStore, NewEvent, Version};
use projections::UserView;

fn registered(id: AggregateId, n: usize) -> UserEvent {
    UserEvent::WasRegisteredWithEmail(WasRegisteredWithEmail {
        id,
        email: format!("user{n}@example.com"),
    })
}

/// Populate a store with `n` registered users.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    let ctx = Context::new();
    for i in 0..n {
        let id = AggregateId::new();
        let event = registered(id, i);
        let new = NewEvent::from_payload(event.kind().to_string(), "User", &event).unwrap();
        store
            .append(&ctx, id, Version::initial(), vec![new])
            .await
            .unwrap();
    }
}

fn bench_rebuild_500_users(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 500));
    let view = UserView::new(Arc::new(store));
    let ctx = Context::new();

    c.bench_function("projections/rebuild_500_users", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.rebuild(&ctx).await.unwrap();
            });
        });
    });
}

fn bench_project_in_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let view = UserView::new(Arc::new(InMemoryEventStore::new()));
    let ctx = Context::new();

    let mut n = 0;
    c.bench_function("projections/project_registration", |b| {
        b.iter(|| {
            n += 1;
            let id = AggregateId::new();
            let event = RecordedEvent {
                event_id: EventId::new(),
                aggregate_id: id,
                aggregate_type: "User".to_string(),
                version: Version::first(),
                recorded_at: chrono::Utc::now(),
                correlation_id: None,
                payload: registered(id, n),
            };
            rt.block_on(async { view.project(&ctx, &event).await.unwrap() });
        });
    });
}

fn bench_list_page(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 1000));
    let view = UserView::new(Arc::new(store));
    rt.block_on(async { view.rebuild(&Context::new()).await.unwrap() });

    c.bench_function("projections/list_page_10_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.list(10, 50).await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_rebuild_500_users,
    bench_project_in_order,
    bench_list_page,
);
criterion_main!(benches);
