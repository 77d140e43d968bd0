//! GroundLink CLI - Command-line interface
//!
//! This binary drives the GroundLink library: it inspects the configuration
//! and runs scripted turnaround cycles against in-memory simulators.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "groundlink")]
#[command(version = groundlink::VERSION)]
#[command(about = "Phase-aware coordination of aircraft and ground-service simulations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the configuration file path and effective settings
    Config {
        /// Write a commented default config file if none exists
        #[arg(long)]
        init: bool,
    },

    /// Run one scripted turnaround cycle against in-memory simulators
    Simulate {
        /// Tick budget for each gate phase (refueling, boarding, deboarding)
        #[arg(long, default_value = "60")]
        ticks: u32,

        /// Where to save the final phase state (default: from config.ini)
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { init } => commands::config::run(init),
        Commands::Simulate { ticks, state_file } => {
            commands::simulate::run(SimulateArgs { ticks, state_file })
        }
    };

    if let Err(e) = result {
        e.exit();
    }
}
