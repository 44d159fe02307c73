//! ecudiag-client - Operator side of the serial ECU diagnostic protocol
//!
//! Provides the request/response engine and everything built on it.
//!
//! # Example
//!
//! ```rust,no_run
//! use ecudiag_client::DiagClient;
//! use ecudiag_link::{create_transport, SerialConfig, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let transport = create_transport(&TransportConfig::Serial(SerialConfig::new("/dev/ttyUSB0")))?;
//!     let client = DiagClient::new(transport);
//!
//!     let sample = client.read_telemetry().await?;
//!     println!("{} rpm", sample.rpm);
//!
//!     client.set_max_rpm(6500).await?;
//!     for dtc in client.read_dtcs().await? {
//!         println!("[{}] {}", dtc.code, dtc.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`protocol`] - one round-trip: discard, write, settle, read, classify
//! - [`client`] - typed diagnostic operations
//! - [`firmware`] - firmware transfer state machine
//! - [`poller`] - periodic telemetry polling
//! - [`testing`] - mock and in-process simulator helpers

pub mod client;
pub mod error;
pub mod firmware;
pub mod poller;
pub mod protocol;
pub mod testing;

pub use client::{ClientTimings, DiagClient};
pub use error::{ClientError, Result};
pub use firmware::{
    FirmwareError, FirmwareImage, FirmwareUploader, TransferProgress, TransferReport,
    TransferState, UploadConfig,
};
pub use poller::{PollEvent, PollStats, PollerHandle, TelemetryPoller};
pub use protocol::{Expect, ProtocolClient, Reply};
