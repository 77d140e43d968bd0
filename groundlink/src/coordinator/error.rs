//! Coordinator errors.

use thiserror::Error;

use crate::facade::DataAccessError;
use crate::worker::WorkerError;

/// Errors surfaced by coordinator reads and their async wrappers.
///
/// Domain operations themselves never fail with this type; they log and
/// return `false`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinatorError {
    /// A facade read failed.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// The cancellation token fired before the work was dispatched.
    #[error("Coordinator operation cancelled")]
    Cancelled,

    /// The blocking worker panicked or was aborted.
    #[error("Coordinator worker failed: {0}")]
    Worker(String),
}

impl From<WorkerError> for CoordinatorError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Cancelled => CoordinatorError::Cancelled,
            WorkerError::Join(reason) => CoordinatorError::Worker(reason),
        }
    }
}
