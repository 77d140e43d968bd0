//! Settings structs, one per `[section]` of the config file.

use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    default_log_directory, default_state_file, DEFAULT_FUEL_RATE_PER_SECOND,
    DEFAULT_FUEL_TICK_INTERVAL_MS, DEFAULT_FUEL_TOLERANCE, DEFAULT_TIMEOUT_SCAN_INTERVAL_MS,
};
use crate::coordinator::fuel::{FuelSettings, FuelUnits};
use crate::logging::default_log_file;
use crate::phase::PhaseMachineOptions;

/// `[phase]`
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSettings {
    /// How often expired phase timeouts are collected.
    pub timeout_scan_interval: Duration,
    /// Where `simulate` saves the machine state.
    pub state_file: PathBuf,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            timeout_scan_interval: Duration::from_millis(DEFAULT_TIMEOUT_SCAN_INTERVAL_MS),
            state_file: default_state_file(),
        }
    }
}

impl PhaseSettings {
    pub fn machine_options(&self) -> PhaseMachineOptions {
        PhaseMachineOptions::default().with_scan_interval(self.timeout_scan_interval)
    }
}

/// `[fuel]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelConfig {
    pub units: FuelUnits,
    pub rate_per_second: f64,
    pub tick_interval: Duration,
    pub tolerance: f64,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            units: FuelUnits::Kilograms,
            rate_per_second: DEFAULT_FUEL_RATE_PER_SECOND,
            tick_interval: Duration::from_millis(DEFAULT_FUEL_TICK_INTERVAL_MS),
            tolerance: DEFAULT_FUEL_TOLERANCE,
        }
    }
}

impl From<FuelConfig> for FuelSettings {
    fn from(config: FuelConfig) -> Self {
        FuelSettings {
            units: config.units,
            rate_per_second: config.rate_per_second,
            tick_interval: config.tick_interval,
            tolerance: config.tolerance,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file: default_log_file().to_string(),
        }
    }
}
