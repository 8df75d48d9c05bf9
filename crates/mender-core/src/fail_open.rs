//! Fail-open utilities for best-effort side effects
//!
//! Some operations must never decide the outcome of a run: writing the
//! final report to disk, cleaning up a clone directory, removing a stopped
//! container. These helpers log the failure and carry on.
//!
//! DO NOT use fail-open for:
//! - Stage transitions (control flow)
//! - Test outcomes (correctness)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation whose failure must not propagate.
///
/// Logs the error via `tracing::warn!` and returns `None`.
///
/// ```no_run
/// use mender_core::fail_open::fail_open;
/// use mender_core::Result;
///
/// async fn persist_report() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let saved = fail_open("report_store", || persist_report()).await;
///     // saved is None if the write failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Synchronous variant for cleanup paths that cannot await
pub fn fail_open_sync<T>(operation_name: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}
