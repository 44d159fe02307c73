//! In-memory stores
//!
//! Clones share state, so a test can hand one clone to the device and keep
//! another to inspect what was persisted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{ConfigStore, DtcStore, FirmwareSink, TelemetrySink};
use crate::error::StoreError;
use crate::models::{default_dtcs, DtcRecord, EcuConfig, TelemetrySample};

#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    config: Arc<Mutex<EcuConfig>>,
    fail_saves: Arc<AtomicBool>,
}

impl MemoryConfigStore {
    pub fn new(config: EcuConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Last saved configuration
    pub fn saved(&self) -> EcuConfig {
        *self.config.lock()
    }

    /// Make every subsequent save fail
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(EcuConfig::default())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<EcuConfig, StoreError> {
        Ok(*self.config.lock())
    }

    fn save(&self, config: &EcuConfig) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("config store rejected save".into()));
        }
        *self.config.lock() = *config;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDtcStore {
    records: Arc<Mutex<Vec<DtcRecord>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryDtcStore {
    pub fn new(records: Vec<DtcRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            saves: Arc::new(Mutex::new(0)),
        }
    }

    pub fn saved(&self) -> Vec<DtcRecord> {
        self.records.lock().clone()
    }

    /// Number of saves performed so far
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl Default for MemoryDtcStore {
    fn default() -> Self {
        Self::new(default_dtcs())
    }
}

impl DtcStore for MemoryDtcStore {
    fn load(&self) -> Result<Vec<DtcRecord>, StoreError> {
        Ok(self.records.lock().clone())
    }

    fn save(&self, records: &[DtcRecord]) -> Result<(), StoreError> {
        *self.records.lock() = records.to_vec();
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTelemetrySink {
    samples: Arc<Mutex<Vec<TelemetrySample>>>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<TelemetrySample> {
        self.samples.lock().clone()
    }
}

impl TelemetrySink for MemoryTelemetrySink {
    fn append(&mut self, sample: &TelemetrySample) -> Result<(), StoreError> {
        self.samples.lock().push(sample.clone());
        Ok(())
    }
}

/// Captures firmware images written by the device
#[derive(Debug, Clone, Default)]
pub struct MemoryFirmwareSink {
    image: Arc<Mutex<Option<Vec<String>>>>,
}

impl MemoryFirmwareSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently written image, if any
    pub fn image(&self) -> Option<Vec<String>> {
        self.image.lock().clone()
    }
}

impl FirmwareSink for MemoryFirmwareSink {
    fn write_all(&mut self, lines: &[String]) -> Result<(), StoreError> {
        *self.image.lock() = Some(lines.to_vec());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        *self.image.lock() = None;
        Ok(())
    }
}
