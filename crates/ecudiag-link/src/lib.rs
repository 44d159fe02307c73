//! ecudiag-link - Line transports for serial ECU diagnostics
//!
//! A [`LineTransport`] moves newline-terminated text lines over a half-duplex
//! channel and exposes the three primitives the protocol engine needs:
//! write a line, read a line with a timeout, and discard unread input.
//!
//! Implementations:
//! - [`transport::serial::SerialLineTransport`] - a real serial port (9600-8N1 by default)
//! - [`transport::memory::MemoryLineTransport`] - a connected in-process pair for tests
//! - [`transport::mock::MockLineTransport`] - scripted request/reply table
//!
//! # Example
//!
//! ```ignore
//! use ecudiag_link::{create_transport, TransportConfig, SerialConfig};
//!
//! let config = TransportConfig::Serial(SerialConfig::new("/dev/ttyUSB0"));
//! let transport = create_transport(&config)?;
//! transport.write_line("GET_VER").await?;
//! let version = transport.read_line().await?;
//! ```

pub mod config;
pub mod transport;

pub use config::{MockConfig, Parity, SerialConfig, TransportConfig};
pub use transport::{available_ports, create_transport, LineTransport, PortInfo, TransportError};
