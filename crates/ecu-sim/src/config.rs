//! Simulator configuration
//!
//! Loaded from TOML; every field has a default so an empty file (or no file
//! at all) gives the stock device on `/dev/ttyUSB1`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ecudiag_core::wire::DEFAULT_FIRMWARE_VERSION;
use ecudiag_link::SerialConfig;
use serde::{Deserialize, Serialize};

/// Complete simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Serial link parameters
    #[serde(default = "default_serial")]
    pub serial: SerialConfig,

    /// Device storage files
    #[serde(default)]
    pub storage: StorageConfig,

    /// Device behaviour
    #[serde(default)]
    pub device: DeviceSettings,

    /// Firmware line rejection
    #[serde(default)]
    pub faults: FaultConfig,
}

fn default_serial() -> SerialConfig {
    SerialConfig::new("/dev/ttyUSB1")
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            serial: default_serial(),
            storage: StorageConfig::default(),
            device: DeviceSettings::default(),
            faults: FaultConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the files below
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_config_file")]
    pub config_file: String,

    #[serde(default = "default_dtc_file")]
    pub dtc_file: String,

    /// Where a completed firmware image is written; cleared at startup
    #[serde(default = "default_firmware_file")]
    pub firmware_file: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_config_file() -> String {
    "ecu_config.json".to_string()
}

fn default_dtc_file() -> String {
    "dtc_codes.json".to_string()
}

fn default_firmware_file() -> String {
    "received_firmware.hex".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            config_file: default_config_file(),
            dtc_file: default_dtc_file(),
            firmware_file: default_firmware_file(),
        }
    }
}

impl StorageConfig {
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(&self.config_file)
    }

    pub fn dtc_path(&self) -> PathBuf {
        self.data_dir.join(&self.dtc_file)
    }

    pub fn firmware_path(&self) -> PathBuf {
        self.data_dir.join(&self.firmware_file)
    }
}

// =============================================================================
// Device behaviour
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Reply to `GET_VER`
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,

    /// Period of unsolicited telemetry lines; 0 disables them
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,

    /// Sleep between input checks when the line is idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Simulated processing time before `UPDATE_SUCCESS`
    #[serde(default = "default_end_processing_delay_ms")]
    pub end_processing_delay_ms: u64,

    /// Seed for simulated telemetry values; random when absent
    #[serde(default)]
    pub telemetry_seed: Option<u64>,
}

fn default_firmware_version() -> String {
    DEFAULT_FIRMWARE_VERSION.to_string()
}

fn default_telemetry_interval_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_end_processing_delay_ms() -> u64 {
    1000
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            firmware_version: default_firmware_version(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            end_processing_delay_ms: default_end_processing_delay_ms(),
            telemetry_seed: None,
        }
    }
}

impl DeviceSettings {
    pub fn telemetry_interval(&self) -> Option<Duration> {
        (self.telemetry_interval_ms > 0).then(|| Duration::from_millis(self.telemetry_interval_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn end_processing_delay(&self) -> Duration {
        Duration::from_millis(self.end_processing_delay_ms)
    }
}

// =============================================================================
// Fault injection
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Probability (0.0 - 1.0) that a valid firmware line is answered `ERROR`
    #[serde(default = "default_fault_rate")]
    pub rate: f64,

    /// Seed for the rejection draw; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_fault_rate() -> f64 {
    0.1
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            rate: default_fault_rate(),
            seed: None,
        }
    }
}
