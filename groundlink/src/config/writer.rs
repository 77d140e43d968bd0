//! INI serialization: [`ConfigFile`] → commented INI text.

use std::path::Path;

use super::file::ConfigFile;

/// Render `config` as the text written to `config.ini`.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[phase]
; How often expired phase timeouts are collected, in milliseconds (default: 100)
timeout_scan_interval_ms = {}
; Where the phase machine state is saved by `groundlink simulate`
state_file = {}

[fuel]
; Units the aircraft reports fuel in: kg or lbs
units = {}
; Fuel transferred per second while refueling or defueling
rate_per_second = {}
; Simulated time covered by one transfer tick, in milliseconds
tick_interval_ms = {}
; A transfer completes once within this many units of the target
tolerance = {}

[logging]
; Directory for the session log (cleared on every start)
directory = {}
file = {}
"#,
        config.phase.timeout_scan_interval.as_millis(),
        path_to_string(&config.phase.state_file),
        config.fuel.units.abbreviation(),
        config.fuel.rate_per_second,
        config.fuel.tick_interval.as_millis(),
        config.fuel.tolerance,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Paths under the home directory are written with a `~/` prefix.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
