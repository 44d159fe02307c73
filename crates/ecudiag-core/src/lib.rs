//! ecudiag-core - Shared protocol vocabulary for serial ECU diagnostics
//!
//! This crate holds everything both ends of the diagnostic link agree on:
//!
//! - [`wire`] - literal verbs and replies exchanged over the line
//! - [`codec`] - the closed [`Command`] enum and payload encoders/decoders
//! - [`models`] - device configuration, DTC records and telemetry samples
//! - [`store`] - persistence seams (config, DTC list, telemetry log, firmware sink)
//!
//! Nothing in here performs I/O on the serial port; see `ecudiag-link`.

pub mod codec;
pub mod digest;
pub mod error;
pub mod models;
pub mod store;
pub mod wire;

pub use codec::{parse_or_zero, Command};
pub use digest::image_digest;
pub use error::{CodecError, StoreError};
pub use models::*;
