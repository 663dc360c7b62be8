//! Liveness and readiness endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use common::Context;
use event_store::EventStore;

use crate::AppState;
use crate::error::ApiError;

pub const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// GET /health: the process is up.
pub async fn live() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /readiness: the event store answers a ping within
/// [`READINESS_TIMEOUT`].
pub async fn ready(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    let ctx = Context::new().with_timeout(READINESS_TIMEOUT);
    match tokio::time::timeout(READINESS_TIMEOUT, state.store.ping(&ctx)).await {
        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT),
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "event store not ready");
            Err(ApiError::Unavailable(format!("event store unavailable: {err}")))
        }
        Err(_) => {
            tracing::warn!(timeout = ?READINESS_TIMEOUT, "event store ping timed out");
            Err(ApiError::Unavailable(format!(
                "event store did not answer within {READINESS_TIMEOUT:?}"
            )))
        }
    }
}
