//! `groundlink config` - show the effective configuration.

use groundlink::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Print the config path and every effective value.
///
/// With `init`, a commented default file is written first if none exists.
pub fn run(init: bool) -> Result<(), CliError> {
    let path = if init {
        let path = ConfigFile::ensure_exists()?;
        println!("Config file ready at {}", path.display());
        path
    } else {
        config_file_path()
    };

    let config = ConfigFile::load_from(&path)?;
    let exists = path.exists();

    println!("Configuration Settings");
    println!("======================");
    println!();
    println!(
        "File: {}{}",
        path.display(),
        if exists { "" } else { " (not found, using defaults)" }
    );
    println!();
    print!("{}", render(&config));

    Ok(())
}

fn render(config: &ConfigFile) -> String {
    format!(
        "[phase]\n  timeout_scan_interval_ms = {}\n  state_file = {}\n\n\
         [fuel]\n  units = {}\n  rate_per_second = {}\n  tick_interval_ms = {}\n  tolerance = {}\n\n\
         [logging]\n  directory = {}\n  file = {}\n",
        config.phase.timeout_scan_interval.as_millis(),
        config.phase.state_file.display(),
        config.fuel.units.abbreviation(),
        config.fuel.rate_per_second,
        config.fuel.tick_interval.as_millis(),
        config.fuel.tolerance,
        config.logging.directory.display(),
        config.logging.file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_every_key() {
        let text = render(&ConfigFile::default());
        for key in [
            "timeout_scan_interval_ms = 100",
            "state_file",
            "units = kg",
            "rate_per_second = 28",
            "tick_interval_ms = 1000",
            "tolerance = 1",
            "directory",
            "file = groundlink.log",
        ] {
            assert!(text.contains(key), "missing {key}");
        }
    }
}
