//! Configuration file support.
//!
//! GroundLink reads an INI file at `~/.groundlink/config.ini`. Every key is
//! optional; anything missing falls back to the values in [`defaults`].
//!
//! ```ini
//! [phase]
//! timeout_scan_interval_ms = 100
//! state_file = ~/.groundlink/phase_state.json
//!
//! [fuel]
//! units = kg
//! rate_per_second = 28
//! tick_interval_ms = 1000
//! tolerance = 1.0
//!
//! [logging]
//! directory = ~/.groundlink/logs
//! file = groundlink.log
//! ```

pub mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use settings::{FuelConfig, LoggingSettings, PhaseSettings};
