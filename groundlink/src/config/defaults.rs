//! Default values for every configuration key.

use std::path::PathBuf;

use super::file::config_directory;

pub const DEFAULT_TIMEOUT_SCAN_INTERVAL_MS: u64 = 100;
pub const DEFAULT_FUEL_RATE_PER_SECOND: f64 = 28.0;
pub const DEFAULT_FUEL_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_FUEL_TOLERANCE: f64 = 1.0;

/// `~/.groundlink/phase_state.json`
pub fn default_state_file() -> PathBuf {
    config_directory().join("phase_state.json")
}

/// `~/.groundlink/logs`
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}
