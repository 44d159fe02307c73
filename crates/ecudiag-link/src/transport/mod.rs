//! Transport layer for line-oriented diagnostics
//!
//! This module provides transports for talking to a device:
//! - Serial transport backed by the `serialport` crate
//! - In-memory pair for wiring a client to a simulator in one process
//! - Mock transport for testing

mod adapter;
pub mod error;
pub mod memory;
pub mod mock;
pub mod serial;

pub use adapter::LineTransport;
pub use error::TransportError;
pub use serial::{available_ports, PortInfo};

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport based on configuration
pub fn create_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn LineTransport>, TransportError> {
    match config {
        TransportConfig::Serial(cfg) => {
            let transport = serial::SerialLineTransport::open(cfg)?;
            Ok(Arc::new(transport))
        }
        TransportConfig::Mock(cfg) => {
            let transport = mock::MockLineTransport::new(cfg);
            Ok(Arc::new(transport))
        }
    }
}
