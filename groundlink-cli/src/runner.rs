//! CLI runner for common setup.
//!
//! Loads the config file and installs logging so command handlers start from
//! the same state.

use tracing::info;

use groundlink::config::ConfigFile;
use groundlink::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Keeps logging alive for as long as a command runs.
pub struct CliRunner {
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load config (defaults when absent) and initialize logging from it.
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("GroundLink v{}", groundlink::VERSION);
        info!("GroundLink CLI: {} command", command);
        info!(
            "Logging to {}",
            self.config
                .logging
                .directory
                .join(&self.config.logging.file)
                .display()
        );
    }
}
