//! Configuration file handling for ecudiag

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ecudiag_client::ClientTimings;
use ecudiag_core::wire::DEFAULT_FIRMWARE_VERSION;
use ecudiag_link::SerialConfig;
use serde::{Deserialize, Serialize};

/// Default telemetry log written by `monitor`
pub const DEFAULT_LOG_FILE: &str = "diagnostic_log.csv";

/// Configuration for the CLI tool
///
/// ```toml
/// port = "/dev/ttyUSB0"
/// baud_rate = 9600
/// telemetry_log = "diagnostic_log.csv"
/// expected_version = "FW_1.0.3"
///
/// [timings]
/// command_settle_ms = 100
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default serial port
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    /// Read timeout for a single reply
    pub read_timeout_ms: Option<u64>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// CSV file appended to by `monitor`
    pub telemetry_log: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    /// Version `flash` expects the device to report
    pub expected_version: Option<String>,
    pub timings: Option<ClientTimings>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ecudiag");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        port: Option<&str>,
        baud_rate: Option<u32>,
        output: Option<&str>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            port: port.map(String::from).or_else(|| self.port.clone()),
            baud_rate: baud_rate.or(self.baud_rate).unwrap_or(9600),
            read_timeout_ms: self.read_timeout_ms.unwrap_or(500),
            output: output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: no_color || self.no_color.unwrap_or(false),
            telemetry_log: self
                .telemetry_log
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            poll_interval: Duration::from_millis(self.poll_interval_ms.unwrap_or(1000)),
            expected_version: self
                .expected_version
                .clone()
                .unwrap_or_else(|| DEFAULT_FIRMWARE_VERSION.to_string()),
            timings: self.timings.unwrap_or_default(),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    #[allow(dead_code)]
    pub output: String,
    pub no_color: bool,
    pub telemetry_log: PathBuf,
    pub poll_interval: Duration,
    pub expected_version: String,
    pub timings: ClientTimings,
}

impl MergedConfig {
    /// Serial settings for the selected port
    pub fn serial(&self) -> Result<SerialConfig> {
        let port = self
            .port
            .as_deref()
            .context("No serial port selected; pass --port or run `ecudiag ports`")?;

        let mut serial = SerialConfig::new(port);
        serial.baud_rate = self.baud_rate;
        serial.read_timeout_ms = self.read_timeout_ms;
        Ok(serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_override_file() {
        let config: Config = toml::from_str(
            r#"
port = "/dev/ttyUSB3"
baud_rate = 19200
no_color = true
"#,
        )
        .unwrap();

        let merged = config.merge_with_args(Some("/dev/ttyACM0"), None, Some("json"), false);
        assert_eq!(merged.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(merged.baud_rate, 19200);
        assert_eq!(merged.output, "json");
        assert!(merged.no_color);
    }

    #[test]
    fn test_defaults() {
        let merged = Config::default().merge_with_args(None, None, None, false);
        assert_eq!(merged.port, None);
        assert_eq!(merged.baud_rate, 9600);
        assert_eq!(merged.telemetry_log, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(merged.poll_interval, Duration::from_secs(1));
        assert_eq!(merged.expected_version, "FW_1.0.3");
        assert_eq!(merged.timings, ClientTimings::default());
        assert!(merged.serial().is_err());
    }

    #[test]
    fn test_timings_section() {
        let config: Config = toml::from_str(
            r#"
port = "COM3"
read_timeout_ms = 800

[timings]
line_settle_ms = 20
"#,
        )
        .unwrap();

        let merged = config.merge_with_args(None, Some(115200), None, false);
        assert_eq!(merged.timings.line_settle_ms, 20);
        assert_eq!(merged.timings.command_settle_ms, 100);

        let serial = merged.serial().unwrap();
        assert_eq!(serial.port, "COM3");
        assert_eq!(serial.baud_rate, 115200);
        assert_eq!(serial.read_timeout_ms, 800);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "port = \"/dev/ttyS0\"\nexpected_version = \"FW_2.0.0\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(config.expected_version.as_deref(), Some("FW_2.0.0"));

        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
