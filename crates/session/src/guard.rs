//! Best-effort execution: run something whose failure must not escape.
//!
//! Used at exactly the places where an error has nobody to report to:
//! subscription handlers and keepalive heartbeats.  Errors and panics are
//! traced at `debug` and discarded.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

/// Await `fut`, swallowing both `Err` results and panics.
pub async fn best_effort<F, T, E>(context: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::debug!(context = %context, error = %e, "best-effort task failed");
            None
        }
        Err(panic) => {
            tracing::debug!(
                context = %context,
                panic = %panic_message(panic.as_ref()),
                "best-effort task panicked"
            );
            None
        }
    }
}

/// Synchronous counterpart of [`best_effort`].
pub fn best_effort_sync<F, T, E>(context: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::debug!(context = %context, error = %e, "best-effort handler failed");
            None
        }
        Err(panic) => {
            tracing::debug!(
                context = %context,
                panic = %panic_message(panic.as_ref()),
                "best-effort handler panicked"
            );
            None
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}
