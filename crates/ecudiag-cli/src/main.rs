//! ecudiag - Command-line tool for serial ECU diagnostics
//!
//! # Usage
//!
//! ```bash
//! # List serial ports
//! ecudiag ports
//!
//! # Watch live telemetry (Ctrl+C to stop)
//! ecudiag --port /dev/ttyUSB0 monitor
//!
//! # Tune thresholds
//! ecudiag --port /dev/ttyUSB0 set-max-rpm 6500
//! ecudiag --port /dev/ttyUSB0 patch '{"fan_trigger_temp": 98}'
//!
//! # Fault codes
//! ecudiag --port /dev/ttyUSB0 dtc
//! ecudiag --port /dev/ttyUSB0 clear-dtc --yes
//!
//! # Firmware update
//! ecudiag --port /dev/ttyUSB0 flash firmware.hex
//! ```

mod commands;
mod config;
mod output;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecudiag_client::DiagClient;
use ecudiag_link::{create_transport, TransportConfig};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::{Config, MergedConfig};
use output::{OutputContext, OutputFormat};

/// ecudiag - Serial ECU diagnostic tool
#[derive(Parser)]
#[command(name = "ecudiag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port the ECU is attached to
    #[arg(short, long, env = "ECUDIAG_PORT", global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, env = "ECUDIAG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write log events to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll live telemetry once a second and log it to CSV
    Monitor {
        /// CSV log file (default: diagnostic_log.csv)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Polling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many polls
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Set the maximum engine RPM
    SetMaxRpm {
        value: u32,
    },

    /// Set the coolant temperature at which the fan engages
    SetFanTemp {
        #[arg(allow_negative_numbers = true)]
        value: i32,
    },

    /// Set the fuel level (percent) below which a warning is raised
    SetFuelWarning {
        value: u32,
    },

    /// Show the device configuration
    Config,

    /// List active diagnostic trouble codes
    Dtc,

    /// Clear all diagnostic trouble codes
    ClearDtc {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Apply a partial configuration given as a JSON object
    Patch {
        /// Inline JSON, e.g. '{"max_rpm": 7000}'
        #[arg(required_unless_present = "file")]
        json: Option<String>,

        /// Read the JSON patch from a file
        #[arg(short, long, conflicts_with = "json")]
        file: Option<PathBuf>,
    },

    /// Copy the telemetry log to a timestamped export file
    ExportLog {
        /// Telemetry log to export (default: diagnostic_log.csv)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Directory to write the export into
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Read the device firmware version
    Version,

    /// Send a firmware image to the device
    Flash {
        /// Firmware image, one record per line
        file: PathBuf,

        /// Version the device must report before the transfer starts
        #[arg(long)]
        expected_version: Option<String>,

        /// Continue on a version mismatch without asking
        #[arg(long)]
        force: bool,
    },

    /// List available serial ports
    Ports,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(
        cli.port.as_deref(),
        cli.baud,
        Some(cli.output.into()),
        cli.no_color,
    );

    // Create output context
    let ctx = OutputContext::new(cli.output, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Monitor {
            log,
            interval_ms,
            count,
        } => {
            let client = connect(&merged)?;
            let log = log.clone().unwrap_or_else(|| merged.telemetry_log.clone());
            let interval = interval_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(merged.poll_interval);
            commands::monitor(&client, &log, interval, *count, &ctx).await?;
        }

        Commands::SetMaxRpm { value } => {
            let client = connect(&merged)?;
            commands::set_max_rpm(&client, *value, &ctx).await?;
        }

        Commands::SetFanTemp { value } => {
            let client = connect(&merged)?;
            commands::set_fan_temp(&client, *value, &ctx).await?;
        }

        Commands::SetFuelWarning { value } => {
            let client = connect(&merged)?;
            commands::set_fuel_warning(&client, *value, &ctx).await?;
        }

        Commands::Config => {
            let client = connect(&merged)?;
            commands::config(&client, &ctx).await?;
        }

        Commands::Dtc => {
            let client = connect(&merged)?;
            commands::dtc(&client, &ctx).await?;
        }

        Commands::ClearDtc { yes } => {
            let client = connect(&merged)?;
            commands::clear_dtc(&client, *yes, &ctx).await?;
        }

        Commands::Patch { json, file } => {
            let patch = match (json, file) {
                (_, Some(path)) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read patch file: {}", path.display()))?,
                (Some(json), None) => json.clone(),
                (None, None) => anyhow::bail!("No patch given"),
            };
            let client = connect(&merged)?;
            commands::patch(&client, &patch, &ctx).await?;
        }

        Commands::ExportLog { log, dir } => {
            let log = log.clone().unwrap_or_else(|| merged.telemetry_log.clone());
            commands::export_log(&log, dir, &ctx)?;
        }

        Commands::Version => {
            let client = connect(&merged)?;
            commands::version(&client, &ctx).await?;
        }

        Commands::Flash {
            file,
            expected_version,
            force,
        } => {
            let client = connect(&merged)?;
            let expected = expected_version
                .clone()
                .unwrap_or_else(|| merged.expected_version.clone());
            commands::flash(&client, file, &expected, *force, &ctx).await?;
        }

        Commands::Ports => {
            commands::ports(&ctx)?;
        }
    }

    Ok(())
}

/// Console logging to stderr, plus an optional session log file
fn init_logging(cli: &Cli) -> Result<()> {
    let console_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(EnvFilter::new("info")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Open the configured serial port and wrap it in a client
fn connect(merged: &MergedConfig) -> Result<DiagClient> {
    let serial = merged.serial()?;
    debug!(port = %serial.port, baud = serial.baud_rate, "Opening serial port");
    let transport = create_transport(&TransportConfig::Serial(serial.clone()))
        .with_context(|| format!("Failed to open serial port {}", serial.port))?;
    Ok(DiagClient::with_timings(transport, merged.timings))
}

// Implement conversion for OutputFormat to string (for config merge)
impl From<OutputFormat> for &str {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}
