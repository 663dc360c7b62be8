//! Event bus: any number of handlers per event kind.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use common::Context;
use tracing::Instrument;

use crate::{DispatchError, Message, contain};

/// Reacts to published events, e.g. by updating a projection.
///
/// Failures are logged by the bus and never reach the publisher.
#[async_trait]
pub trait EventHandler<E: Message>: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, ctx: Context, event: Arc<E>) -> Result<(), DispatchError>;
}

/// Adapts a named async closure into an [`EventHandler`].
pub struct FnEventHandler<F> {
    name: &'static str,
    f: F,
}

/// Wraps `f` so it can be subscribed on an [`EventBus`].
pub fn event_handler_fn<E, F, Fut>(name: &'static str, f: F) -> FnEventHandler<F>
where
    E: Message,
    F: Fn(Context, Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    FnEventHandler { name, f }
}

#[async_trait]
impl<E, F, Fut> EventHandler<E> for FnEventHandler<F>
where
    E: Message,
    F: Fn(Context, Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, ctx: Context, event: Arc<E>) -> Result<(), DispatchError> {
        (self.f)(ctx, event).await
    }
}

/// Fans each published event out to every handler subscribed to its kind.
///
/// Every handler invocation runs on its own Tokio task, so handlers neither
/// wait for nor affect each other. [`publish`](Self::publish) returns as soon
/// as the tasks are spawned. There is no ordering between handlers, and none
/// between two events published back to back.
pub struct EventBus<E: Message> {
    handlers: HashMap<E::Kind, Vec<Arc<dyn EventHandler<E>>>>,
}

impl<E: Message> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Adds `handler` to the subscribers of `kind`.
    ///
    /// The same handler may be subscribed to several kinds, and several
    /// handlers to one kind.
    pub fn subscribe(&mut self, kind: E::Kind, handler: Arc<dyn EventHandler<E>>) {
        tracing::debug!(%kind, handler = handler.name(), "event handler subscribed");
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Returns the number of handlers subscribed to `kind`.
    pub fn handler_count(&self, kind: E::Kind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Spawns one task per handler subscribed to the event's kind and
    /// returns how many were spawned.
    ///
    /// An event nobody subscribed to is dropped and 0 is returned. Handler
    /// errors and panics are logged and counted, never returned.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, ctx: &Context, event: E) -> usize {
        let kind = event.kind();

        let Some(handlers) = self.handlers.get(&kind).filter(|h| !h.is_empty()) else {
            tracing::debug!(%kind, "no subscribers for event");
            return 0;
        };

        metrics::counter!("events_published_total", "kind" => kind.to_string()).increment(1);

        let event = Arc::new(event);
        for handler in handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            let ctx = ctx.detached();
            let span = tracing::info_span!(
                "event_handler",
                handler = handler.name(),
                %kind,
                correlation_id = %ctx.correlation_id()
            );

            tokio::spawn(
                async move {
                    if let Err(err) = contain(handler.handle(ctx, event)).await {
                        metrics::counter!(
                            "event_handler_failures_total",
                            "handler" => handler.name()
                        )
                        .increment(1);
                        tracing::warn!(error = %err, "event handler failed");
                    }
                }
                .instrument(span),
            );
        }

        handlers.len()
    }
}

impl<E: Message> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Happened,
        Ignored,
    }

    impl std::fmt::Display for TestKind {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[derive(Debug)]
    struct TestEvent {
        kind: TestKind,
        value: u32,
    }

    impl Message for TestEvent {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            self.kind
        }
    }

    fn happened(value: u32) -> TestEvent {
        TestEvent {
            kind: TestKind::Happened,
            value,
        }
    }

    fn forwarding(
        name: &'static str,
        tx: mpsc::UnboundedSender<(&'static str, u32)>,
    ) -> Arc<dyn EventHandler<TestEvent>> {
        Arc::new(event_handler_fn(
            name,
            move |_ctx, event: Arc<TestEvent>| {
                let tx = tx.clone();
                async move {
                    tx.send((name, event.value))
                        .map_err(|e| DispatchError::internal(e.to_string()))
                }
            },
        ))
    }

    async fn receive(rx: &mut mpsc::UnboundedReceiver<(&'static str, u32)>) -> (&'static str, u32) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler did not run in time")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(TestKind::Happened, forwarding("first", tx.clone()));
        bus.subscribe(TestKind::Happened, forwarding("second", tx));

        let spawned = bus.publish(&Context::new(), happened(7));
        assert_eq!(spawned, 2);

        let mut seen = vec![receive(&mut rx).await, receive(&mut rx).await];
        seen.sort();
        assert_eq!(seen, vec![("first", 7), ("second", 7)]);
    }

    #[tokio::test]
    async fn unsubscribed_kind_is_a_no_op() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(TestKind::Happened, forwarding("only", tx));

        let spawned = bus.publish(
            &Context::new(),
            TestEvent {
                kind: TestKind::Ignored,
                value: 1,
            },
        );

        assert_eq!(spawned, 0);
        assert_eq!(bus.handler_count(TestKind::Ignored), 0);
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_do_not_stop_others() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();

        bus.subscribe(
            TestKind::Happened,
            Arc::new(event_handler_fn(
                "panics",
                |_ctx, event: Arc<TestEvent>| async move {
                    if event.value > 0 {
                        panic!("projection bug");
                    }
                    Ok(())
                },
            )),
        );
        bus.subscribe(
            TestKind::Happened,
            Arc::new(event_handler_fn(
                "fails",
                |_ctx, _event: Arc<TestEvent>| async {
                    Err(DispatchError::internal("read model unavailable"))
                },
            )),
        );
        bus.subscribe(TestKind::Happened, forwarding("healthy", tx));

        assert_eq!(bus.publish(&Context::new(), happened(3)), 3);
        assert_eq!(receive(&mut rx).await, ("healthy", 3));

        // The bus keeps working after a handler panicked.
        assert_eq!(bus.publish(&Context::new(), happened(4)), 3);
        assert_eq!(receive(&mut rx).await, ("healthy", 4));
    }

    #[tokio::test]
    async fn publish_does_not_wait_for_handlers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(
            TestKind::Happened,
            Arc::new(event_handler_fn(
                "slow",
                move |_ctx, event: Arc<TestEvent>| {
                    let tx = tx.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        tx.send(event.value)
                            .map_err(|e| DispatchError::internal(e.to_string()))
                    }
                },
            )),
        );

        bus.publish(&Context::new(), happened(9));
        assert!(rx.try_recv().is_err());

        let value = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(value, Some(9));
    }

    #[tokio::test]
    async fn handlers_are_isolated_from_publisher_cancellation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut bus = EventBus::new();
        bus.subscribe(
            TestKind::Happened,
            Arc::new(event_handler_fn(
                "checks_ctx",
                move |ctx: Context, _event: Arc<TestEvent>| {
                    let tx = tx.clone();
                    async move {
                        tx.send(ctx.is_done())
                            .map_err(|e| DispatchError::internal(e.to_string()))
                    }
                },
            )),
        );

        let ctx = Context::new();
        ctx.cancel();
        bus.publish(&ctx, happened(1));

        let cancelled = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(cancelled, Some(false));
    }
}
