//! Panic containment at the handler task boundary.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::DispatchError;

/// Runs a handler future, turning a panic into [`DispatchError::Internal`].
///
/// This is the only place a panic is intercepted. The future's own errors
/// pass through untouched.
pub async fn contain<F, T>(future: F) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, DispatchError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            metrics::counter!("handler_panics_total").increment(1);
            tracing::error!(panic = %message, "recovered from handler panic");
            Err(DispatchError::Internal(format!(
                "handler panicked: {message}"
            )))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
