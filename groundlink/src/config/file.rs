//! Loading and saving `config.ini`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::{FuelConfig, LoggingSettings, PhaseSettings};
use super::{parser, writer};

/// Errors that can occur while reading or writing the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid value for {section}.{key}: '{value}' ({reason})")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to create config directory: {0}")]
    DirectoryError(#[from] io::Error),
}

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub phase: PhaseSettings,
    pub fuel: FuelConfig,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, writer::to_config_string(self))
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Write a default config file if none exists yet, returning its path.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

/// `~/.groundlink`
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".groundlink")
}

/// `~/.groundlink/config.ini`
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::fuel::FuelUnits;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.phase.timeout_scan_interval = Duration::from_millis(250);
        config.phase.state_file = dir.path().join("state.json");
        config.fuel.units = FuelUnits::Pounds;
        config.fuel.rate_per_second = 61.5;
        config.fuel.tick_interval = Duration::from_millis(500);
        config.fuel.tolerance = 2.0;
        config.logging.directory = dir.path().join("logs");
        config.logging.file = "session.log".to_string();

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[fuel]\nunits = lbs\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.fuel.units, FuelUnits::Pounds);
        assert_eq!(config.fuel.rate_per_second, 28.0);
        assert_eq!(config.phase, PhaseSettings::default());
    }

    #[test]
    fn test_invalid_value_names_section_and_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, "[fuel]\nrate_per_second = fast\n").unwrap();

        match ConfigFile::load_from(&path) {
            Err(ConfigFileError::InvalidValue { section, key, .. }) => {
                assert_eq!(section, "fuel");
                assert_eq!(key, "rate_per_second");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_config_file_path_is_under_config_directory() {
        assert!(config_file_path().starts_with(config_directory()));
        assert!(config_file_path().ends_with("config.ini"));
    }
}
