//! INI parsing: `Ini` → [`ConfigFile`].
//!
//! This is the only place INI key names are mapped onto struct fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use crate::coordinator::fuel::FuelUnits;

/// Overlay the values found in `ini` onto [`ConfigFile::default()`].
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [phase] section
    if let Some(section) = ini.section(Some("phase")) {
        if let Some(ms) = parse_key::<u64>(section, "phase", "timeout_scan_interval_ms", |ms| {
            *ms > 0
        })? {
            config.phase.timeout_scan_interval = Duration::from_millis(ms);
        }
        if let Some(v) = non_empty(section, "state_file") {
            config.phase.state_file = expand_tilde(v);
        }
    }

    // [fuel] section
    if let Some(section) = ini.section(Some("fuel")) {
        if let Some(v) = section.get("units") {
            config.fuel.units = FuelUnits::from_str(v).map_err(|reason| {
                ConfigFileError::InvalidValue {
                    section: "fuel".to_string(),
                    key: "units".to_string(),
                    value: v.to_string(),
                    reason,
                }
            })?;
        }
        if let Some(rate) =
            parse_key::<f64>(section, "fuel", "rate_per_second", |r| r.is_finite() && *r > 0.0)?
        {
            config.fuel.rate_per_second = rate;
        }
        if let Some(ms) = parse_key::<u64>(section, "fuel", "tick_interval_ms", |ms| *ms > 0)? {
            config.fuel.tick_interval = Duration::from_millis(ms);
        }
        if let Some(tolerance) =
            parse_key::<f64>(section, "fuel", "tolerance", |t| t.is_finite() && *t >= 0.0)?
        {
            config.fuel.tolerance = tolerance;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

/// Parse `key` as `T`, rejecting values that fail `valid`.
fn parse_key<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
    valid: impl Fn(&T) -> bool,
) -> Result<Option<T>, ConfigFileError> {
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Ok(Some(value)),
        _ => Err(ConfigFileError::InvalidValue {
            section: section_name.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: format!("not a valid {} for this key", std::any::type_name::<T>()),
        }),
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_is_default() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_phase_section() {
        let config = parse("[phase]\ntimeout_scan_interval_ms = 40\nstate_file = /tmp/s.json\n")
            .unwrap();
        assert_eq!(config.phase.timeout_scan_interval, Duration::from_millis(40));
        assert_eq!(config.phase.state_file, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn test_zero_scan_interval_rejected() {
        let err = parse("[phase]\ntimeout_scan_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { ref key, .. } if key == "timeout_scan_interval_ms"));
    }

    #[test]
    fn test_fuel_section() {
        let config = parse(
            "[fuel]\nunits = pounds\nrate_per_second = 40.5\ntick_interval_ms = 250\ntolerance = 0\n",
        )
        .unwrap();
        assert_eq!(config.fuel.units, FuelUnits::Pounds);
        assert_eq!(config.fuel.rate_per_second, 40.5);
        assert_eq!(config.fuel.tick_interval, Duration::from_millis(250));
        assert_eq!(config.fuel.tolerance, 0.0);
    }

    #[test]
    fn test_unknown_fuel_units_rejected() {
        let err = parse("[fuel]\nunits = gallons\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue { section, value, .. } => {
                assert_eq!(section, "fuel");
                assert_eq!(value, "gallons");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(parse("[fuel]\nrate_per_second = -3\n").is_err());
    }

    #[test]
    fn test_blank_logging_values_keep_defaults() {
        let config = parse("[logging]\ndirectory =\nfile = \n").unwrap();
        assert_eq!(config.logging, ConfigFile::default().logging);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/var/log"), PathBuf::from("/var/log"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x/y"), home.join("x/y"));
        }
    }
}
