//! Persistence seams
//!
//! The protocol layers only see these traits. File-backed implementations
//! are used by the binaries; in-memory ones by tests.

mod file;
mod memory;

pub use file::{
    CsvTelemetryLog, FileFirmwareSink, JsonConfigStore, JsonDtcStore, LogExport,
    TELEMETRY_CSV_HEADER,
};
pub use memory::{MemoryConfigStore, MemoryDtcStore, MemoryFirmwareSink, MemoryTelemetrySink};

use crate::error::StoreError;
use crate::models::{DtcRecord, EcuConfig, TelemetrySample};

/// Durable home of the device configuration
pub trait ConfigStore: Send {
    fn load(&self) -> Result<EcuConfig, StoreError>;
    fn save(&self, config: &EcuConfig) -> Result<(), StoreError>;
}

/// Durable home of the device DTC list
pub trait DtcStore: Send {
    fn load(&self) -> Result<Vec<DtcRecord>, StoreError>;
    fn save(&self, records: &[DtcRecord]) -> Result<(), StoreError>;
}

/// Append-only destination for polled telemetry
pub trait TelemetrySink: Send {
    fn append(&mut self, sample: &TelemetrySample) -> Result<(), StoreError>;
}

/// Destination for a completed firmware image on the device
pub trait FirmwareSink: Send {
    fn write_all(&mut self, lines: &[String]) -> Result<(), StoreError>;

    /// Remove any image left over from a previous run
    fn clear(&mut self) -> Result<(), StoreError>;
}
