//! relayctl - zero-cross relay simulation and calibration tool
//!
//! Drives a relay manager against simulated relays and mains, and inspects
//! or resets the calibration records it persists.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod config;
mod error;
mod output;
mod sim;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{SimulateArgs, StoreArgs};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "relayctl")]
#[command(about = "Simulate zero-cross synchronized relays and manage their calibration")]
#[command(version)]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch simulated relays and report how calibration converged
    Simulate(SimulateArgs),

    /// Show persisted calibration records
    ShowConfig(StoreArgs),

    /// Reset persisted calibration records to factory defaults
    ResetConfig(StoreArgs),

    /// Print the built-in simulation config as YAML
    DefaultConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "relayctl={log_level},relaysync_manager={log_level},\
                     relaysync_zerocross={log_level},relaysync_calibration={log_level}"
                )
                .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e
                .downcast_ref::<CliError>()
                .map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Simulate(args) => commands::simulate(args, cli.json),
        Commands::ShowConfig(args) => commands::show_config(args, cli.json),
        Commands::ResetConfig(args) => commands::reset_config(args, cli.json),
        Commands::DefaultConfig => commands::default_config(),
    }
}
