//! Command bus: one handler per command kind.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::Context;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::{DispatchError, Message, contain};

/// Outcome of a command, delivered exactly once on its reply channel.
pub type CommandResult = Result<(), DispatchError>;

/// Handles every command of one kind.
///
/// A handler reports domain failures through its return value. Panics are
/// caught by the bus and reported as [`DispatchError::Internal`].
#[async_trait]
pub trait CommandHandler<C: Message>: Send + Sync {
    async fn handle(&self, ctx: Context, command: C) -> CommandResult;
}

/// Adapts an async closure into a [`CommandHandler`].
pub struct FnCommandHandler<F>(F);

/// Wraps `f` so it can be subscribed on a [`CommandBus`].
pub fn command_handler_fn<C, F, Fut>(f: F) -> FnCommandHandler<F>
where
    C: Message,
    F: Fn(Context, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    FnCommandHandler(f)
}

#[async_trait]
impl<C, F, Fut> CommandHandler<C> for FnCommandHandler<F>
where
    C: Message,
    F: Fn(Context, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult> + Send + 'static,
{
    async fn handle(&self, ctx: Context, command: C) -> CommandResult {
        (self.0)(ctx, command).await
    }
}

/// Routes each command to the single handler registered for its kind.
///
/// Handlers are registered through `&mut self` while the process starts up;
/// afterwards the bus is shared behind an `Arc` and only read.
///
/// Each published command runs on its own Tokio task with a
/// [detached](Context::detached) context. The task is never tied to the
/// caller: if the caller stops waiting, the handler still runs to completion
/// and its result is discarded.
pub struct CommandBus<C: Message> {
    handlers: HashMap<C::Kind, Arc<dyn CommandHandler<C>>>,
}

impl<C: Message> CommandBus<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers the handler for `kind`.
    ///
    /// Fails with [`DispatchError::DuplicateRegistration`] if `kind` already
    /// has a handler; the existing registration is kept.
    pub fn subscribe(
        &mut self,
        kind: C::Kind,
        handler: Arc<dyn CommandHandler<C>>,
    ) -> Result<(), DispatchError> {
        if self.handlers.contains_key(&kind) {
            return Err(DispatchError::DuplicateRegistration {
                kind: kind.to_string(),
            });
        }

        tracing::debug!(%kind, "command handler registered");
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn is_registered(&self, kind: C::Kind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Returns the number of registered command kinds.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Starts handling `command` and returns immediately.
    ///
    /// The outcome is sent on `reply` exactly once. An unregistered kind is
    /// answered with [`DispatchError::HandlerNotFound`] before this returns
    /// and no handler runs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn publish(&self, ctx: &Context, command: C, reply: oneshot::Sender<CommandResult>) {
        let kind = command.kind();

        let Some(handler) = self.handlers.get(&kind).map(Arc::clone) else {
            tracing::warn!(
                %kind,
                correlation_id = %ctx.correlation_id(),
                "no handler registered for command"
            );
            metrics::counter!("command_failures_total", "kind" => kind.to_string()).increment(1);
            let _ = reply.send(Err(DispatchError::HandlerNotFound {
                kind: kind.to_string(),
            }));
            return;
        };

        metrics::counter!("commands_dispatched_total", "kind" => kind.to_string()).increment(1);

        let ctx = ctx.detached();
        let span = tracing::info_span!(
            "command",
            %kind,
            correlation_id = %ctx.correlation_id()
        );

        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = contain(handler.handle(ctx, command)).await;

                metrics::histogram!("command_duration_seconds", "kind" => kind.to_string())
                    .record(started.elapsed().as_secs_f64());
                match &result {
                    Ok(()) => tracing::debug!("command handled"),
                    Err(err) => {
                        metrics::counter!("command_failures_total", "kind" => kind.to_string())
                            .increment(1);
                        tracing::info!(error = %err, "command failed");
                    }
                }

                if reply.send(result).is_err() {
                    tracing::debug!("caller stopped waiting, result discarded");
                }
            }
            .instrument(span),
        );
    }

    /// Publishes `command` and waits for its outcome or for `ctx` to finish,
    /// whichever comes first.
    ///
    /// When `ctx` finishes first this returns [`DispatchError::Cancelled`],
    /// but the handler is not interrupted: its effects still happen. A
    /// context that is already done is rejected without publishing.
    pub async fn dispatch(&self, ctx: &Context, command: C) -> CommandResult {
        if let Some(reason) = ctx.err() {
            return Err(DispatchError::Cancelled(reason));
        }

        let (reply, outcome) = oneshot::channel();
        self.publish(ctx, command, reply);

        tokio::select! {
            biased;
            result = outcome => result.unwrap_or_else(|_| {
                Err(DispatchError::internal("command task ended without replying"))
            }),
            reason = ctx.done() => {
                tracing::info!(
                    %reason,
                    correlation_id = %ctx.correlation_id(),
                    "stopped waiting for command, handler keeps running"
                );
                Err(DispatchError::Cancelled(reason))
            }
        }
    }
}

impl<C: Message> Default for CommandBus<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use common::ContextError;
    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestKind {
        Ping,
        Explode,
        Slow,
    }

    impl std::fmt::Display for TestKind {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[derive(Debug)]
    enum TestCommand {
        Ping(usize),
        Explode,
        Slow(Duration),
    }

    impl Message for TestCommand {
        type Kind = TestKind;

        fn kind(&self) -> TestKind {
            match self {
                TestCommand::Ping(_) => TestKind::Ping,
                TestCommand::Explode => TestKind::Explode,
                TestCommand::Slow(_) => TestKind::Slow,
            }
        }
    }

    fn counting_handler(count: Arc<AtomicUsize>) -> Arc<dyn CommandHandler<TestCommand>> {
        Arc::new(command_handler_fn(move |_ctx, command: TestCommand| {
            let count = Arc::clone(&count);
            async move {
                match command {
                    TestCommand::Ping(n) if n == 0 => {
                        Err(DispatchError::InvalidArgument("zero".into()))
                    }
                    TestCommand::Ping(n) => {
                        count.fetch_add(n, Ordering::SeqCst);
                        Ok(())
                    }
                    _ => Err(DispatchError::internal("wrong command")),
                }
            }
        }))
    }

    fn exploding_handler() -> Arc<dyn CommandHandler<TestCommand>> {
        Arc::new(command_handler_fn(|_ctx, _command: TestCommand| async {
            if std::hint::black_box(true) {
                panic!("handler exploded");
            }
            Ok(())
        }))
    }

    fn slow_handler(
        done: Arc<Notify>,
        finished: Arc<AtomicUsize>,
    ) -> Arc<dyn CommandHandler<TestCommand>> {
        Arc::new(command_handler_fn(move |ctx: Context, command: TestCommand| {
            let done = Arc::clone(&done);
            let finished = Arc::clone(&finished);
            async move {
                if let TestCommand::Slow(delay) = command {
                    tokio::time::sleep(delay).await;
                }
                assert!(!ctx.is_done(), "handler context must not be cancelled");
                finished.fetch_add(1, Ordering::SeqCst);
                done.notify_one();
                Ok(())
            }
        }))
    }

    #[test]
    fn duplicate_subscription_is_rejected() {
        let mut bus = CommandBus::<TestCommand>::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(TestKind::Ping, counting_handler(Arc::clone(&count)))
            .unwrap();
        let second = bus.subscribe(TestKind::Ping, counting_handler(count));

        assert!(matches!(
            second,
            Err(DispatchError::DuplicateRegistration { kind }) if kind == "Ping"
        ));
        assert_eq!(bus.len(), 1);
    }

    #[tokio::test]
    async fn dispatch_runs_registered_handler() {
        let mut bus = CommandBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(TestKind::Ping, counting_handler(Arc::clone(&count)))
            .unwrap();

        bus.dispatch(&Context::new(), TestCommand::Ping(3))
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn handler_errors_are_delivered() {
        let mut bus = CommandBus::new();
        bus.subscribe(TestKind::Ping, counting_handler(Arc::new(AtomicUsize::new(0))))
            .unwrap();

        let result = bus.dispatch(&Context::new(), TestCommand::Ping(0)).await;
        assert!(matches!(result, Err(DispatchError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn unregistered_kind_yields_handler_not_found() {
        let mut bus = CommandBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(TestKind::Ping, counting_handler(Arc::clone(&count)))
            .unwrap();

        let (reply, outcome) = oneshot::channel();
        bus.publish(&Context::new(), TestCommand::Explode, reply);

        // Answered synchronously, before any task could run.
        let result = outcome.await.unwrap();
        assert!(matches!(
            result,
            Err(DispatchError::HandlerNotFound { kind }) if kind == "Explode"
        ));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panic_becomes_internal_and_bus_keeps_serving() {
        let mut bus = CommandBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(TestKind::Explode, exploding_handler()).unwrap();
        bus.subscribe(TestKind::Ping, counting_handler(Arc::clone(&count)))
            .unwrap();

        let result = bus.dispatch(&Context::new(), TestCommand::Explode).await;
        match result {
            Err(DispatchError::Internal(message)) => assert!(message.contains("handler exploded")),
            other => panic!("unexpected: {other:?}"),
        }

        bus.dispatch(&Context::new(), TestCommand::Ping(1))
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_caller_does_not_interrupt_handler() {
        let mut bus = CommandBus::new();
        let done = Arc::new(Notify::new());
        let finished = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            TestKind::Slow,
            slow_handler(Arc::clone(&done), Arc::clone(&finished)),
        )
        .unwrap();

        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let result = bus
            .dispatch(&ctx, TestCommand::Slow(Duration::from_millis(100)))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Cancelled(ContextError::DeadlineExceeded))
        ));
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        done.notified().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_caller_does_not_cancel_handler_context() {
        let mut bus = CommandBus::new();
        let done = Arc::new(Notify::new());
        let finished = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            TestKind::Slow,
            slow_handler(Arc::clone(&done), Arc::clone(&finished)),
        )
        .unwrap();
        let bus = Arc::new(bus);

        let ctx = Context::new();
        let waiter = {
            let bus = Arc::clone(&bus);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                bus.dispatch(&ctx, TestCommand::Slow(Duration::from_millis(50)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        ctx.cancel();

        let result = waiter.await.unwrap();
        assert!(matches!(
            result,
            Err(DispatchError::Cancelled(ContextError::Cancelled))
        ));

        done.notified().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropped_reply_receiver_is_tolerated() {
        let mut bus = CommandBus::new();
        let done = Arc::new(Notify::new());
        let finished = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            TestKind::Slow,
            slow_handler(Arc::clone(&done), Arc::clone(&finished)),
        )
        .unwrap();

        let (reply, outcome) = oneshot::channel();
        drop(outcome);
        bus.publish(
            &Context::new(),
            TestCommand::Slow(Duration::from_millis(1)),
            reply,
        );

        done.notified().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_finished_context_is_not_published() {
        let mut bus = CommandBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(TestKind::Ping, counting_handler(Arc::clone(&count)))
            .unwrap();

        let ctx = Context::new();
        ctx.cancel();
        let result = bus.dispatch(&ctx, TestCommand::Ping(1)).await;

        assert!(matches!(result, Err(DispatchError::Cancelled(_))));
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
