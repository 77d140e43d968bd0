//! Facade access errors.

use thiserror::Error;

/// Errors raised by facade reads and writes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataAccessError {
    /// The named variable does not exist in the simulation.
    #[error("Variable not found: {0}")]
    NotFound(String),

    /// The variable exists but holds a different kind of value.
    #[error("Type mismatch reading {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The simulation rejected or failed the read.
    #[error("Failed to read {name}: {reason}")]
    ReadFailed { name: String, reason: String },

    /// The simulation rejected or failed the write.
    #[error("Failed to write {name}: {reason}")]
    WriteFailed { name: String, reason: String },

    /// The simulation connection is not available.
    #[error("Simulation unavailable: {0}")]
    Unavailable(String),
}
