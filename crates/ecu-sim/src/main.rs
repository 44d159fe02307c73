//! ECU Simulator
//!
//! Emulates a diagnostic ECU on a serial port for exercising the `ecudiag`
//! operator tool.
//!
//! # Usage
//!
//! ```bash
//! ./ecu-sim --port /dev/ttyUSB1
//! ```
//!
//! Pair with a virtual null-modem (e.g. `socat -d -d pty,raw,echo=0 pty,raw,echo=0`)
//! to run both ends on one machine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ecu_sim::{EcuParts, RandomFaults, SimulatedEcu, Simulator, SimulatorConfig};
use ecudiag_core::store::{FileFirmwareSink, FirmwareSink, JsonConfigStore, JsonDtcStore};
use ecudiag_link::{create_transport, TransportConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ecu-sim")]
#[command(about = "Serial-link ECU simulator for diagnostic tool development")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(short, long)]
    baud: Option<u32>,

    /// Directory for ecu_config.json, dtc_codes.json and received_firmware.hex
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Probability (0.0 - 1.0) of rejecting a firmware line
    #[arg(long)]
    fault_rate: Option<f64>,

    /// Seed for firmware line rejection
    #[arg(long)]
    seed: Option<u64>,

    /// Disable unsolicited telemetry lines
    #[arg(long)]
    no_telemetry: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "ecu_sim=debug,ecudiag_link=debug"
    } else {
        "ecu_sim=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = if let Some(path) = &args.config {
        info!("Loading config from: {}", path.display());
        SimulatorConfig::load(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
    } else {
        SimulatorConfig::default()
    };
    apply_args(&mut config, &args);

    info!("Starting ECU Simulator");
    info!(
        port = %config.serial.port,
        baud = config.serial.baud_rate,
        data_dir = %config.storage.data_dir.display(),
        fault_rate = config.faults.rate,
        version = %config.device.firmware_version
    );

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.storage.data_dir.display()
        )
    })?;

    let mut firmware_sink = FileFirmwareSink::new(config.storage.firmware_path());
    if let Err(e) = firmware_sink.clear() {
        warn!(error = %e, "Could not clear previous firmware image");
    }

    let ecu = SimulatedEcu::new(EcuParts {
        config_store: Box::new(JsonConfigStore::new(config.storage.config_path())),
        dtc_store: Box::new(JsonDtcStore::new(config.storage.dtc_path())),
        firmware_sink: Box::new(firmware_sink),
        faults: Box::new(RandomFaults::new(config.faults.rate, config.faults.seed)),
        firmware_version: config.device.firmware_version.clone(),
        end_processing_delay: config.device.end_processing_delay(),
        telemetry_seed: config.device.telemetry_seed,
    });

    let transport = create_transport(&TransportConfig::Serial(config.serial.clone()))
        .with_context(|| format!("Failed to open serial port {}", config.serial.port))?;

    let simulator = Simulator::new(Arc::clone(&transport), &config.device).spawn(ecu);

    info!("ECU Simulator ready - waiting for requests");
    info!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    simulator.shutdown().await;

    info!("ECU Simulator stopped");
    Ok(())
}

fn apply_args(config: &mut SimulatorConfig, args: &Args) {
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(rate) = args.fault_rate {
        config.faults.rate = rate;
    }
    if args.seed.is_some() {
        config.faults.seed = args.seed;
    }
    if args.no_telemetry {
        config.device.telemetry_interval_ms = 0;
    }
}
