//! Command dispatch endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::{Context, CorrelationId};
use dispatch::Message;
use domain::UserCommand;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the caller's correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// POST /dispatch/{command}: decodes the body as the named command and waits
/// for its handler.
///
/// Success is 204 with a `Location` header naming the user the command
/// targeted, which is how callers learn an id generated at registration.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Path(command): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let command = UserCommand::decode(&command, &body)?;
    let ctx = request_context(&headers)?.with_timeout(state.command_timeout);

    tracing::info!(
        correlation_id = %ctx.correlation_id(),
        command = %command.kind(),
        user_id = %command.user_id(),
        "dispatching command"
    );

    let kind = command.kind();
    let user_id = command.user_id();
    let result = state.commands.dispatch(&ctx, command).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("api_commands_total", "command" => kind.as_str(), "outcome" => outcome)
        .increment(1);

    result?;
    Ok((
        StatusCode::NO_CONTENT,
        [(header::LOCATION, format!("/users/{user_id}"))],
    )
        .into_response())
}

fn request_context(headers: &HeaderMap) -> Result<Context, ApiError> {
    let Some(value) = headers.get(CORRELATION_HEADER) else {
        return Ok(Context::new());
    };

    let uuid = value
        .to_str()
        .ok()
        .and_then(|v| uuid::Uuid::parse_str(v).ok())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {CORRELATION_HEADER} header")))?;

    Ok(Context::with_correlation_id(CorrelationId::from_uuid(uuid)))
}
