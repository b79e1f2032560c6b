//! espota - OTA firmware updates for ESP32 devices over HTTP
//!
//! Checks that a device is reachable, uploads a firmware image to its `/ota`
//! endpoint and waits for it to come back after the reboot.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use espota_client::{DeviceEndpoint, SequencerConfig, UpdateSequencer};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "espota")]
#[command(author, version, about = "ESP32 OTA Update CLI Tool")]
#[command(after_help = "Examples:
  espota check 192.168.1.100                # Check device status
  espota ping 192.168.1.100                 # Ping device
  espota info 192.168.1.100                 # Get device info
  espota update 192.168.1.100 firmware.bin  # Perform OTA update
  espota list                               # List available firmware files")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ESPOTA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format for `list` and `info`
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Device address shared by the network commands
#[derive(Args)]
struct DeviceArgs {
    /// ESP32 device IP address or hostname
    ip: String,

    /// HTTP port (default: 80)
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check device connectivity
    Check {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Ping device
    Ping {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Get device information
    Info {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Perform OTA update
    Update {
        #[command(flatten)]
        device: DeviceArgs,

        /// Path to firmware binary file
        firmware: PathBuf,
    },

    /// List available firmware files
    List,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(ExitCode::from(commands::EXIT_FAILURE));
    };

    // Load config file
    let config = match &cli.config {
        Some(config_path) => Config::load_from(config_path)?,
        None => Config::load()?,
    };
    let merged = config.merge_with_args(cli.no_color);
    debug!(port = merged.port, "Configuration loaded");

    let ctx = OutputContext::new(cli.output, merged.no_color, cli.quiet);

    let code = match command {
        Commands::Check { device } => {
            let sequencer = create_sequencer(device, &merged)?;
            commands::check(&sequencer, &ctx).await
        }

        Commands::Ping { device } => {
            let sequencer = create_sequencer(device, &merged)?;
            commands::ping(&sequencer, &ctx).await
        }

        Commands::Info { device } => {
            let sequencer = create_sequencer(device, &merged)?;
            commands::info(&sequencer, &ctx).await
        }

        Commands::Update { device, firmware } => {
            let sequencer = create_sequencer(device, &merged)?;
            commands::update(&sequencer, firmware, &ctx).await
        }

        Commands::List => commands::list(&merged.firmware_paths, &ctx),
    };

    Ok(ExitCode::from(code))
}

/// Create an update sequencer for the addressed device
fn create_sequencer(device: &DeviceArgs, merged: &MergedConfig) -> Result<UpdateSequencer> {
    let port = device.port.unwrap_or(merged.port);
    let endpoint = DeviceEndpoint::new(device.ip.as_str(), port)
        .with_context(|| format!("Invalid device address: {}", device.ip))?;
    let config: SequencerConfig = merged.sequencer_config()?;

    UpdateSequencer::with_config(endpoint, config).context("Failed to create HTTP client")
}
