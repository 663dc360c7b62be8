//! Request context: correlation, cancellation and deadline.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::CorrelationId;

/// Why a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Carries a correlation id, a cancellation signal and an optional deadline
/// through dispatch, repository and event store calls.
///
/// Cloning is cheap and clones share the same cancellation signal.
#[derive(Debug, Clone)]
pub struct Context {
    correlation_id: CorrelationId,
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Creates a root context with a fresh correlation id and no deadline.
    pub fn new() -> Self {
        Self::with_correlation_id(CorrelationId::new())
    }

    /// Creates a root context for an existing correlation id.
    pub fn with_correlation_id(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Returns a copy whose deadline is at most `timeout` from now.
    ///
    /// An earlier deadline already present is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a copy whose deadline is at most `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derives a context that is cancelled together with `self` but can also
    /// be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id,
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a context that keeps the correlation id but is never cancelled
    /// by `self` and has no deadline.
    ///
    /// Work that must run to completion after its caller stopped waiting,
    /// such as a dispatched command handler, runs under a detached context.
    pub fn detached(&self) -> Self {
        Self::with_correlation_id(self.correlation_id)
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every context derived from it with [`child`](Self::child).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => ContextError::Cancelled,
                () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
