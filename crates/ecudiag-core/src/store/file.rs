//! File-backed stores

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::{ConfigStore, DtcStore, FirmwareSink, TelemetrySink};
use crate::error::StoreError;
use crate::models::{default_dtcs, DtcRecord, EcuConfig, TelemetrySample};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::json(path, e))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(value).map_err(|e| StoreError::json(path, e))?;
    fs::write(path, content).map_err(|e| StoreError::io(path, e))
}

// =============================================================================
// Device configuration / DTC list
// =============================================================================

/// Device configuration kept as a JSON document
///
/// A missing file is created with [`EcuConfig::default`] on first load.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<EcuConfig, StoreError> {
        if !self.path.exists() {
            let config = EcuConfig::default();
            info!(path = %self.path.display(), "Config file missing, writing defaults");
            self.save(&config)?;
            return Ok(config);
        }
        read_json(&self.path)
    }

    fn save(&self, config: &EcuConfig) -> Result<(), StoreError> {
        debug!(path = %self.path.display(), ?config, "Saving config");
        write_json(&self.path, config)
    }
}

/// DTC list kept as a JSON array
///
/// A missing file is created with [`default_dtcs`] on first load.
#[derive(Debug, Clone)]
pub struct JsonDtcStore {
    path: PathBuf,
}

impl JsonDtcStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DtcStore for JsonDtcStore {
    fn load(&self) -> Result<Vec<DtcRecord>, StoreError> {
        if !self.path.exists() {
            let records = default_dtcs();
            info!(path = %self.path.display(), "DTC file missing, writing defaults");
            self.save(&records)?;
            return Ok(records);
        }
        read_json(&self.path)
    }

    fn save(&self, records: &[DtcRecord]) -> Result<(), StoreError> {
        debug!(path = %self.path.display(), count = records.len(), "Saving DTCs");
        write_json(&self.path, records)
    }
}

// =============================================================================
// Telemetry log
// =============================================================================

/// Header row of the telemetry CSV log
pub const TELEMETRY_CSV_HEADER: &str = "Timestamp,Speed,RPM,Temperature,FuelLevel";

/// Summary of an exported telemetry log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogExport {
    pub path: PathBuf,
    pub entries: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

/// Telemetry appended as CSV rows
#[derive(Debug, Clone)]
pub struct CsvTelemetryLog {
    path: PathBuf,
}

impl CsvTelemetryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the log into `dir` as `ecu_export_<YYYYmmdd_HHMMSS>.csv`
    pub fn export(&self, dir: &Path) -> Result<LogExport, StoreError> {
        self.export_at(dir, Local::now())
    }

    pub fn export_at(&self, dir: &Path, now: DateTime<Local>) -> Result<LogExport, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }

        let target = dir.join(format!("ecu_export_{}.csv", now.format("%Y%m%d_%H%M%S")));
        fs::copy(&self.path, &target).map_err(|e| StoreError::io(&target, e))?;

        let content = fs::read_to_string(&target).map_err(|e| StoreError::io(&target, e))?;
        let rows: Vec<&str> = content
            .lines()
            .filter(|line| !line.trim().is_empty() && *line != TELEMETRY_CSV_HEADER)
            .collect();
        let timestamp_of = |row: &&str| row.split(',').next().map(str::to_string);

        info!(path = %target.display(), entries = rows.len(), "Exported telemetry log");

        Ok(LogExport {
            entries: rows.len(),
            first_timestamp: rows.first().and_then(timestamp_of),
            last_timestamp: rows.last().and_then(timestamp_of),
            path: target,
        })
    }
}

impl TelemetrySink for CsvTelemetryLog {
    fn append(&mut self, sample: &TelemetrySample) -> Result<(), StoreError> {
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;

        let mut row = String::new();
        if needs_header {
            row.push_str(TELEMETRY_CSV_HEADER);
            row.push('\n');
        }
        row.push_str(&format!(
            "{},{},{},{},{}\n",
            sample.formatted_timestamp(),
            sample.speed,
            sample.rpm,
            sample.temperature,
            sample.fuel
        ));

        file.write_all(row.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

// =============================================================================
// Firmware sink
// =============================================================================

/// Received firmware written as a text file, one line per record
#[derive(Debug, Clone)]
pub struct FileFirmwareSink {
    path: PathBuf,
}

impl FileFirmwareSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FirmwareSink for FileFirmwareSink {
    fn write_all(&mut self, lines: &[String]) -> Result<(), StoreError> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content).map_err(|e| StoreError::io(&self.path, e))?;
        info!(path = %self.path.display(), lines = lines.len(), "Firmware image written");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed previous firmware image");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}
