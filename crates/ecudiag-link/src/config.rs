//! Transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Physical or virtual serial port
    Serial(SerialConfig),
    /// Scripted transport for testing
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// Parity setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial port configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Maximum wait for a terminated line
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Maximum wait for the port to accept a line
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    500
}

impl SerialConfig {
    /// 9600-8N1 with 500 ms timeouts
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::None,
            stop_bits: default_stop_bits(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_timeouts(mut self, read_ms: u64, write_ms: u64) -> Self {
        self.read_timeout_ms = read_ms;
        self.write_timeout_ms = write_ms;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Mock transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency before a reply becomes readable (milliseconds)
    #[serde(default)]
    pub latency_ms: u64,
    /// How long `read_line` waits on an empty inbox before timing out
    #[serde(default = "default_mock_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_mock_read_timeout() -> u64 {
    20
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            read_timeout_ms: default_mock_read_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_defaults_are_9600_8n1() {
        let config: SerialConfig = serde_json::from_str(r#"{"port": "/dev/ttyS0"}"#).unwrap();
        assert_eq!(config, SerialConfig::new("/dev/ttyS0"));
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.read_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_transport_config_is_tagged() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"type": "serial", "port": "COM3", "baud_rate": 19200}"#)
                .unwrap();
        match config {
            TransportConfig::Serial(serial) => {
                assert_eq!(serial.port, "COM3");
                assert_eq!(serial.baud_rate, 19200);
            }
            TransportConfig::Mock(_) => panic!("expected serial config"),
        }
    }
}
