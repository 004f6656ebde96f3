//! Isolation wrapper for plugin-authored callbacks.
//!
//! Every listener, hook handler, lifecycle callback and route handler runs
//! through [`guarded`], which turns an `Err`, a panic, or an exceeded time
//! budget into a [`CallbackFailure`] instead of unwinding into the kernel.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;

use quill_core::error::AppError;
use quill_core::result::AppResult;

/// Why a guarded callback did not complete successfully.
#[derive(Debug)]
pub(crate) enum CallbackFailure {
    /// The callback returned an error.
    Error(AppError),
    /// The callback panicked.
    Panic(String),
    /// The callback exceeded its time budget.
    TimedOut(Duration),
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{err}"),
            Self::Panic(message) => write!(f, "panicked: {message}"),
            Self::TimedOut(limit) => write!(f, "timed out after {} ms", limit.as_millis()),
        }
    }
}

impl From<CallbackFailure> for AppError {
    fn from(failure: CallbackFailure) -> Self {
        match failure {
            CallbackFailure::Error(err) => err,
            CallbackFailure::Panic(_) => AppError::plugin(failure.to_string()),
            CallbackFailure::TimedOut(_) => AppError::timeout(failure.to_string()),
        }
    }
}

/// Runs a callback future, catching errors, panics and (optionally) timeouts.
pub(crate) async fn guarded<T, F>(future: F, timeout: Option<Duration>) -> Result<T, CallbackFailure>
where
    F: Future<Output = AppResult<T>>,
{
    let call = AssertUnwindSafe(future).catch_unwind();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(CallbackFailure::TimedOut(limit)),
        },
        None => call.await,
    };

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(CallbackFailure::Error(err)),
        Err(payload) => Err(CallbackFailure::Panic(panic_message(payload.as_ref()))),
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
