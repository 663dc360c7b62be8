use std::sync::Arc;

use common::{AggregateId, Context};
use criterion::{Criterion, criterion_group, criterion_main};
use dispatch::{CommandBus, EventBus};
use domain::{
    Aggregate, ChangeEmailAddress, RegisterWithEmail, Repository, User, UserCommand,
    register_user_handlers,
};
use event_store::InMemoryEventStore;

fn repository(store: InMemoryEventStore) -> Arc<Repository<User, InMemoryEventStore>> {
    Arc::new(Repository::new(store, Arc::new(EventBus::new())))
}

fn bench_register_and_save(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::new();
    let repo = repository(InMemoryEventStore::new());

    c.bench_function("domain/register_and_save", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut user = User::blank(AggregateId::new());
                user.register_with_email("bench@example.com").unwrap();
                repo.save(&ctx, &mut user).await.unwrap();
            });
        });
    });
}

fn bench_dispatch_change_email(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::new();
    let mut bus = CommandBus::new();
    register_user_handlers(&mut bus, repository(InMemoryEventStore::new())).unwrap();
    let id = AggregateId::new();

    rt.block_on(async {
        bus.dispatch(
            &ctx,
            UserCommand::RegisterWithEmail(RegisterWithEmail {
                id,
                email: "bench@example.com".into(),
            }),
        )
        .await
        .unwrap();
    });

    let mut n = 0u64;
    c.bench_function("domain/dispatch_change_email", |b| {
        b.iter(|| {
            n += 1;
            let command = UserCommand::ChangeEmailAddress(ChangeEmailAddress {
                id,
                email: format!("bench{n}@example.com"),
            });
            rt.block_on(async { bus.dispatch(&ctx, command).await.unwrap() });
        });
    });
}

fn bench_reconstruction(c: &mut Criterion, changes: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ctx = Context::new();
    let repo = repository(InMemoryEventStore::new());
    let id = AggregateId::new();

    rt.block_on(async {
        let mut user = User::blank(id);
        user.register_with_email("bench@example.com").unwrap();
        for v in 0..changes {
            user.change_email_address(&format!("bench{v}@example.com"))
                .unwrap();
        }
        repo.save(&ctx, &mut user).await.unwrap();
    });

    c.bench_function(&format!("domain/reconstruct_{}_events", changes + 1), |b| {
        b.iter(|| {
            rt.block_on(async {
                repo.get(&ctx, id).await.unwrap();
            });
        });
    });
}

fn bench_reconstruction_50(c: &mut Criterion) {
    bench_reconstruction(c, 49);
}

fn bench_reconstruction_100(c: &mut Criterion) {
    bench_reconstruction(c, 99);
}

criterion_group!(
    benches,
    bench_register_and_save,
    bench_dispatch_change_email,
    bench_reconstruction_50,
    bench_reconstruction_100,
);
criterion_main!(benches);
