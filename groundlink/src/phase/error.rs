//! Phase machine errors.

use thiserror::Error;

/// Programmer errors raised by phase conversions.
///
/// Ordinary rejected transitions are not errors; see
/// [`super::TransitionOutcome`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PhaseError {
    /// A raw ordinal or name that is not one of the seven phases.
    #[error("Unknown flight phase: {0}")]
    UnknownPhase(String),
}

/// Errors raised while saving or restoring phase state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O failure on the sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid JSON or names an unknown phase.
    #[error("Invalid phase state document: {0}")]
    Format(#[from] serde_json::Error),

    /// The document parsed but holds impossible values.
    #[error("Invalid phase state document: {0}")]
    InvalidDocument(String),
}
