//! CLI error handling with user-friendly messages.
//!
//! Centralizes error reporting for the CLI so every command fails with the
//! same formatting and exit code.

use std::fmt;
use std::path::PathBuf;
use std::process;

use groundlink::config::ConfigFileError;
use groundlink::phase::{FlightPhase, PersistenceError};
use groundlink::worker::WorkerError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Config file could not be read or written
    Config(ConfigFileError),
    /// Tokio runtime could not be built
    Runtime(std::io::Error),
    /// A blocking orchestration pass was cancelled or panicked
    Worker(WorkerError),
    /// The scripted cycle could not advance
    Simulation {
        phase: FlightPhase,
        target: FlightPhase,
        reason: String,
    },
    /// Phase state could not be saved
    StateSave {
        path: PathBuf,
        error: PersistenceError,
    },
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Fix the value in the config file or delete it to restore defaults.");
            eprintln!("Run 'groundlink config path' to see where it lives.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Worker(e) => write!(f, "Orchestration pass failed: {}", e),
            CliError::Simulation {
                phase,
                target,
                reason,
            } => write!(
                f,
                "Simulation stuck in {}: cannot move to {} ({})",
                phase, target, reason
            ),
            CliError::StateSave { path, error } => {
                write!(f, "Failed to save phase state to '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Worker(e) => Some(e),
            CliError::StateSave { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<WorkerError> for CliError {
    fn from(e: WorkerError) -> Self {
        CliError::Worker(e)
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}
