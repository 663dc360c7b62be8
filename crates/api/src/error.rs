//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ContextError;
use dispatch::DispatchError;
use domain::DomainError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A command or query failed inside the dispatch core.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// A dependency is not ready to serve.
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Dispatch(err) => dispatch_status(err),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

fn dispatch_status(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::HandlerNotFound { .. } | DispatchError::NotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        DispatchError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DispatchError::InvalidState(_)
        | DispatchError::ConcurrencyConflict { .. }
        | DispatchError::DuplicateRegistration { .. } => StatusCode::CONFLICT,
        DispatchError::Cancelled(ContextError::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::Cancelled(ContextError::Cancelled) => StatusCode::REQUEST_TIMEOUT,
        DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Dispatch(err.into())
    }
}
