//! Async wrappers over synchronous operations.
//!
//! Every operation in the crate is synchronous and fast. The async variants
//! exist only so a caller on a runtime thread can push the work onto the
//! blocking pool. Cancellation is cooperative and checked once, before
//! dispatch: a token that is already cancelled yields
//! [`WorkerError::Cancelled`] without running anything, and cancelling after
//! dispatch does not undo a committed mutation.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure of an async wrapper itself, as opposed to the wrapped operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// The token was cancelled before the work was dispatched.
    #[error("Operation cancelled before dispatch")]
    Cancelled,

    /// The blocking task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Join(String),
}

/// Run `f` on the blocking pool unless `token` is already cancelled.
pub async fn run_cancellable<F, T>(token: &CancellationToken, f: F) -> Result<T, WorkerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    if token.is_cancelled() {
        return Err(WorkerError::Cancelled);
    }
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WorkerError::Join(e.to_string()))
}
