//! Serial port transport
//!
//! Blocking `serialport` I/O runs on the blocking thread pool. Bytes read
//! past a terminator are kept in a pending buffer for the next `read_line`.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serialport::SerialPort;
use tracing::{debug, warn};

use super::{LineTransport, TransportError};
use crate::config::{Parity, SerialConfig};

/// Longest line accepted before input is treated as noise
pub const MAX_LINE_LEN: usize = 1024;

/// An enumerated serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// List serial ports present on this machine
pub fn available_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports =
        serialport::available_ports().map_err(|e| TransportError::PortUnavailable(e.to_string()))?;

    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match &port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let product = usb.product.clone().unwrap_or_else(|| "USB Serial".into());
                    match &usb.manufacturer {
                        Some(manufacturer) => format!("{} ({})", product, manufacturer),
                        None => product,
                    }
                }
                serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
                serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
                serialport::SerialPortType::Unknown => "Serial Port".to_string(),
            };
            PortInfo {
                name: port.port_name,
                description,
            }
        })
        .collect())
}

struct PortState {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

/// Line transport over a serial port
pub struct SerialLineTransport {
    config: SerialConfig,
    state: Arc<Mutex<PortState>>,
}

impl SerialLineTransport {
    /// Open the port described by `config`
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let data_bits = match config.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            other => {
                return Err(TransportError::InvalidConfig(format!(
                    "unsupported data bits: {}",
                    other
                )))
            }
        };
        let stop_bits = match config.stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            other => {
                return Err(TransportError::InvalidConfig(format!(
                    "unsupported stop bits: {}",
                    other
                )))
            }
        };

        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .parity(to_serialport_parity(config.parity))
            .stop_bits(stop_bits)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| TransportError::PortUnavailable(format!("{}: {}", config.port, e)))?;

        debug!(port = %config.port, baud = config.baud_rate, "Serial port opened");

        Ok(Self {
            config: config.clone(),
            state: Arc::new(Mutex::new(PortState {
                port,
                pending: Vec::new(),
            })),
        })
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PortState) -> Result<T, TransportError> + Send + 'static,
    {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = state.lock();
            op(&mut guard)
        })
        .await
        .map_err(|e| TransportError::ReceiveFailed(format!("serial task failed: {}", e)))?
    }
}

fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

/// Remove and return the first complete line in `pending`, `\r` stripped.
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = pending.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

fn read_line_blocking(state: &mut PortState, timeout: Duration) -> Result<String, TransportError> {
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 256];

    loop {
        if let Some(line) = take_line(&mut state.pending) {
            return Ok(line);
        }
        if state.pending.len() > MAX_LINE_LEN {
            warn!(len = state.pending.len(), "Dropping unterminated input");
            state.pending.clear();
            return Err(TransportError::ReadTimeout);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::ReadTimeout);
        }
        state
            .port
            .set_timeout(remaining)
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

        match state.port.read(&mut chunk) {
            Ok(0) => return Err(TransportError::ConnectionClosed),
            Ok(n) => state.pending.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl LineTransport for SerialLineTransport {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(ecudiag_core::wire::TERMINATOR.as_bytes());
        let timeout = self.config.write_timeout();

        self.blocking(move |state| {
            state
                .port
                .set_timeout(timeout)
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            state
                .port
                .write_all(&bytes)
                .and_then(|_| state.port.flush())
                .map_err(|e| match e.kind() {
                    ErrorKind::TimedOut => TransportError::WriteTimeout,
                    _ => TransportError::SendFailed(e.to_string()),
                })
        })
        .await
    }

    async fn read_line(&self) -> Result<String, TransportError> {
        let timeout = self.config.read_timeout();
        self.blocking(move |state| read_line_blocking(state, timeout))
            .await
    }

    async fn discard_input(&self) -> Result<(), TransportError> {
        self.blocking(|state| {
            state.pending.clear();
            state
                .port
                .clear(serialport::ClearBuffer::Input)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))
        })
        .await
    }

    async fn input_pending(&self) -> Result<bool, TransportError> {
        self.blocking(|state| {
            if !state.pending.is_empty() {
                return Ok(true);
            }
            state
                .port
                .bytes_to_read()
                .map(|n| n > 0)
                .map_err(|e| TransportError::ReceiveFailed(e.to_string()))
        })
        .await
    }

    fn read_timeout(&self) -> Duration {
        self.config.read_timeout()
    }

    fn name(&self) -> String {
        self.config.port.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_line_strips_terminators() {
        let mut pending = b"READY\r\nOK\npartial".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some("READY"));
        assert_eq!(take_line(&mut pending).as_deref(), Some("OK"));
        assert_eq!(take_line(&mut pending), None);
        assert_eq!(pending, b"partial");
    }

    #[test]
    fn test_take_line_replaces_invalid_utf8() {
        let mut pending = vec![0x4F, 0xFF, 0x4B, b'\n'];
        let line = take_line(&mut pending).unwrap();
        assert!(line.contains('\u{FFFD}'));
    }

    #[test]
    fn test_invalid_data_bits_rejected() {
        let mut config = SerialConfig::new("/dev/null");
        config.data_bits = 9;
        assert!(matches!(
            SerialLineTransport::open(&config),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
