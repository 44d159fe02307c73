//! Simulated ECU command dispatcher
//!
//! [`SimulatedEcu`] owns every piece of device state: configuration, DTC
//! list, firmware reception session and the random sources. It is driven
//! one line at a time and is not shared; see [`crate::actor`] for the task
//! that serialises access to it.

use std::time::Duration;

use ecudiag_core::codec::{encode_dtc_listing, encode_telemetry};
use ecudiag_core::models::{COOLANT_OVER_TEMPERATURE, FUEL_LEVEL_SENSOR};
use ecudiag_core::store::{ConfigStore, DtcStore, FirmwareSink};
use ecudiag_core::wire::reply;
use ecudiag_core::{
    image_digest, Command, ConfigPatch, DtcRecord, EcuConfig, TelemetryReading,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::error::DeviceError;
use crate::fault::{FaultInjector, NoFaults};
use crate::firmware::FirmwareReceiver;

/// Lowest simulated engine speed
const IDLE_RPM: u32 = 800;

/// Coolant must exceed the fan trigger by this much to raise P0217
const OVER_TEMPERATURE_MARGIN: i32 = 10;

/// A line to send back, possibly after a processing delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReply {
    pub line: String,
    pub delay: Duration,
}

impl DeviceReply {
    pub fn now(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(line: impl Into<String>, delay: Duration) -> Self {
        Self {
            line: line.into(),
            delay,
        }
    }
}

/// Point-in-time view of the device, for tests and status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub config: EcuConfig,
    pub dtcs: Vec<DtcRecord>,
    pub firmware_version: String,
    pub receiving_firmware: bool,
    pub lines_buffered: usize,
    pub lines_rejected: usize,
}

/// Builder-style inputs for [`SimulatedEcu`]
pub struct EcuParts {
    pub config_store: Box<dyn ConfigStore>,
    pub dtc_store: Box<dyn DtcStore>,
    pub firmware_sink: Box<dyn FirmwareSink>,
    pub faults: Box<dyn FaultInjector>,
    pub firmware_version: String,
    pub end_processing_delay: Duration,
    pub telemetry_seed: Option<u64>,
}

/// Device state and command handlers
pub struct SimulatedEcu {
    config: EcuConfig,
    dtcs: Vec<DtcRecord>,
    config_store: Box<dyn ConfigStore>,
    dtc_store: Box<dyn DtcStore>,
    firmware_sink: Box<dyn FirmwareSink>,
    faults: Box<dyn FaultInjector>,
    receiver: FirmwareReceiver,
    rng: StdRng,
    firmware_version: String,
    end_processing_delay: Duration,
}

impl SimulatedEcu {
    /// Build a device, loading its state from the stores
    ///
    /// A store that cannot be read falls back to factory defaults with a
    /// warning; the device still starts.
    pub fn new(parts: EcuParts) -> Self {
        let config = parts.config_store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load device configuration, using defaults");
            EcuConfig::default()
        });
        let dtcs = parts.dtc_store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load DTC list, using defaults");
            ecudiag_core::models::default_dtcs()
        });
        let rng = match parts.telemetry_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            max_rpm = config.max_rpm,
            fan_trigger_temp = config.fan_trigger_temp,
            fuel_warning_level = config.fuel_warning_level,
            dtcs = dtcs.len(),
            version = %parts.firmware_version,
            "Device state loaded"
        );

        Self {
            config,
            dtcs,
            config_store: parts.config_store,
            dtc_store: parts.dtc_store,
            firmware_sink: parts.firmware_sink,
            faults: parts.faults,
            receiver: FirmwareReceiver::new(),
            rng,
            firmware_version: parts.firmware_version,
            end_processing_delay: parts.end_processing_delay,
        }
    }

    /// Device backed by in-memory stores, no faults and no processing delay
    pub fn in_memory() -> Self {
        use ecudiag_core::store::{MemoryConfigStore, MemoryDtcStore, MemoryFirmwareSink};

        Self::new(EcuParts {
            config_store: Box::new(MemoryConfigStore::default()),
            dtc_store: Box::new(MemoryDtcStore::default()),
            firmware_sink: Box::new(MemoryFirmwareSink::new()),
            faults: Box::new(NoFaults),
            firmware_version: ecudiag_core::wire::DEFAULT_FIRMWARE_VERSION.to_string(),
            end_processing_delay: Duration::ZERO,
            telemetry_seed: None,
        })
    }

    pub fn config(&self) -> &EcuConfig {
        &self.config
    }

    pub fn dtcs(&self) -> &[DtcRecord] {
        &self.dtcs
    }

    pub fn is_receiving_firmware(&self) -> bool {
        self.receiver.is_receiving()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            config: self.config,
            dtcs: self.dtcs.clone(),
            firmware_version: self.firmware_version.clone(),
            receiving_firmware: self.receiver.is_receiving(),
            lines_buffered: self.receiver.lines().len(),
            lines_rejected: self.receiver.rejected(),
        }
    }

    /// Handle one received line; blank lines get no reply
    pub fn process_line(&mut self, raw: &str) -> Option<DeviceReply> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }
        info!(%line, "Received");

        let receiving = self.receiver.is_receiving();
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "Unrecognised command");
                let answer = if receiving {
                    reply::UNKNOWN_COMMAND
                } else {
                    reply::UNKNOWN_VERB
                };
                return Some(DeviceReply::now(answer));
            }
        };

        if receiving && !command.is_firmware_verb() {
            debug!(verb = command.verb(), "Ignoring command during firmware reception");
            return Some(DeviceReply::now(reply::UNKNOWN_COMMAND));
        }

        let verb = command.verb();
        let response = match self.dispatch(command) {
            Ok(response) => response,
            Err(e) => {
                error!(verb, error = %e, "Command handler failed");
                DeviceReply::now(reply::INTERNAL_ERROR)
            }
        };
        debug!(reply = %response.line, "Replying");
        Some(response)
    }

    fn dispatch(&mut self, command: Command) -> Result<DeviceReply, DeviceError> {
        match command {
            Command::GetData => Ok(DeviceReply::now(encode_telemetry(&self.sample()))),
            Command::SetMaxRpm(value) => self.handle_set_max_rpm(&value),
            Command::SetFanTemp(value) => self.handle_set_fan_temp(&value),
            Command::SetFuelWarning(value) => self.handle_set_fuel_warning(&value),
            Command::GetDtc => Ok(DeviceReply::now(encode_dtc_listing(&self.dtcs))),
            Command::ClearDtc => self.handle_clear_dtc(),
            Command::GetConfig => Ok(DeviceReply::now(serde_json::to_string(&self.config)?)),
            Command::ApplyPatch(payload) => self.handle_apply_patch(&payload),
            Command::GetVersion => Ok(DeviceReply::now(self.firmware_version.clone())),
            Command::StartFirmware => Ok(self.handle_start_firmware()),
            Command::Firmware(data) => Ok(self.handle_firmware_line(&data)),
            Command::EndFirmware => self.handle_end_firmware(),
        }
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    fn sample(&mut self) -> TelemetryReading {
        let max_rpm = self.config.max_rpm.max(IDLE_RPM);
        TelemetryReading {
            speed: self.rng.gen_range(0..=120),
            rpm: self.rng.gen_range(IDLE_RPM..=max_rpm).min(i32::MAX as u32) as i32,
            temperature: self.rng.gen_range(70..=110),
            fuel: self.rng.gen_range(0..=100),
        }
    }

    /// Produce an unsolicited telemetry line
    ///
    /// Raises P0217 / P0460 when the sample crosses the configured
    /// thresholds. Returns `None` while firmware reception is active.
    pub fn autonomous_sample(&mut self) -> Option<String> {
        if self.receiver.is_receiving() {
            return None;
        }
        let reading = self.sample();
        self.check_thresholds(&reading);
        Some(encode_telemetry(&reading))
    }

    /// Append threshold DTCs for `reading` if they are not already listed
    pub fn check_thresholds(&mut self, reading: &TelemetryReading) {
        let mut raised = Vec::new();
        let over_temperature = self
            .config
            .fan_trigger_temp
            .saturating_add(OVER_TEMPERATURE_MARGIN);
        if reading.temperature > over_temperature {
            raised.push(COOLANT_OVER_TEMPERATURE);
        }
        if i64::from(reading.fuel) < i64::from(self.config.fuel_warning_level) {
            raised.push(FUEL_LEVEL_SENSOR);
        }

        let mut next = self.dtcs.clone();
        for (code, description) in raised {
            if !next.iter().any(|r| r.code == code) {
                info!(code, description, "Raising DTC");
                next.push(DtcRecord::new(code, description));
            }
        }
        if next.len() == self.dtcs.len() {
            return;
        }

        match self.dtc_store.save(&next) {
            Ok(()) => self.dtcs = next,
            Err(e) => warn!(error = %e, "Failed to persist raised DTCs"),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    fn commit_config(&mut self, next: EcuConfig) -> Result<(), DeviceError> {
        self.config_store.save(&next)?;
        self.config = next;
        Ok(())
    }

    fn handle_set_max_rpm(&mut self, value: &str) -> Result<DeviceReply, DeviceError> {
        let Ok(max_rpm) = value.trim().parse::<u32>() else {
            return Ok(DeviceReply::now(reply::INVALID_RPM));
        };
        self.commit_config(EcuConfig {
            max_rpm,
            ..self.config
        })?;
        info!(max_rpm, "Max RPM set");
        Ok(DeviceReply::now(format!("{}:{}", reply::MAX_RPM_SET, max_rpm)))
    }

    fn handle_set_fan_temp(&mut self, value: &str) -> Result<DeviceReply, DeviceError> {
        let Ok(fan_trigger_temp) = value.trim().parse::<i32>() else {
            return Ok(DeviceReply::now(reply::INVALID_TEMPERATURE));
        };
        self.commit_config(EcuConfig {
            fan_trigger_temp,
            ..self.config
        })?;
        info!(fan_trigger_temp, "Fan trigger temperature set");
        Ok(DeviceReply::now(format!(
            "{}:{}",
            reply::FAN_TEMP_SET,
            fan_trigger_temp
        )))
    }

    fn handle_set_fuel_warning(&mut self, value: &str) -> Result<DeviceReply, DeviceError> {
        let Ok(fuel_warning_level) = value.trim().parse::<u32>() else {
            return Ok(DeviceReply::now(reply::INVALID_FUEL_LEVEL));
        };
        self.commit_config(EcuConfig {
            fuel_warning_level,
            ..self.config
        })?;
        info!(fuel_warning_level, "Fuel warning level set");
        Ok(DeviceReply::now(format!(
            "{}:{}",
            reply::FUEL_WARNING_SET,
            fuel_warning_level
        )))
    }

    fn handle_apply_patch(&mut self, payload: &str) -> Result<DeviceReply, DeviceError> {
        let patch: ConfigPatch = match serde_json::from_str(payload) {
            Ok(patch) => patch,
            Err(e) => {
                debug!(error = %e, "Rejected patch");
                return Ok(DeviceReply::now(reply::INVALID_PATCH));
            }
        };
        self.commit_config(patch.apply(&self.config))?;
        info!(?patch, "Patch applied");
        Ok(DeviceReply::now(reply::PATCH_APPLIED))
    }

    // =========================================================================
    // Fault codes
    // =========================================================================

    fn handle_clear_dtc(&mut self) -> Result<DeviceReply, DeviceError> {
        let next: Vec<DtcRecord> = self
            .dtcs
            .iter()
            .map(|r| DtcRecord {
                active: false,
                ..r.clone()
            })
            .collect();
        self.dtc_store.save(&next)?;
        self.dtcs = next;
        info!(records = self.dtcs.len(), "DTCs cleared");
        Ok(DeviceReply::now(reply::DTC_CLEARED))
    }

    // =========================================================================
    // Firmware reception
    // =========================================================================

    fn handle_start_firmware(&mut self) -> DeviceReply {
        if self.receiver.is_receiving() {
            warn!(
                discarded = self.receiver.lines().len(),
                "Restarting firmware reception"
            );
        }
        self.receiver.start();
        info!("Firmware reception started");
        DeviceReply::now(reply::READY)
    }

    fn handle_firmware_line(&mut self, data: &str) -> DeviceReply {
        if !self.receiver.is_receiving() {
            return DeviceReply::now(reply::NOT_RECEIVING);
        }
        if self.faults.should_reject(data) {
            self.receiver.reject();
            debug!(line = %data, "Injected firmware line failure");
            return DeviceReply::now(reply::ERROR);
        }
        self.receiver.accept(data);
        debug!(buffered = self.receiver.lines().len(), "Firmware line accepted");
        DeviceReply::now(reply::OK)
    }

    fn handle_end_firmware(&mut self) -> Result<DeviceReply, DeviceError> {
        if !self.receiver.is_receiving() {
            return Ok(DeviceReply::now(reply::NOT_RECEIVING));
        }

        // Persist before leaving reception mode so a failed write can be retried
        self.firmware_sink.write_all(self.receiver.lines())?;
        let rejected = self.receiver.rejected();
        let image = self.receiver.finish();
        info!(
            lines = image.len(),
            rejected,
            digest = %image_digest(&image),
            "Firmware image stored"
        );
        Ok(DeviceReply::after(
            reply::UPDATE_SUCCESS,
            self.end_processing_delay,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecudiag_core::store::{MemoryConfigStore, MemoryDtcStore, MemoryFirmwareSink};
    use pretty_assertions::assert_eq;

    use crate::fault::ScriptedFaults;

    struct Rig {
        ecu: SimulatedEcu,
        config_store: MemoryConfigStore,
        dtc_store: MemoryDtcStore,
        firmware: MemoryFirmwareSink,
    }

    fn rig_with_faults(faults: Box<dyn FaultInjector>) -> Rig {
        let config_store = MemoryConfigStore::default();
        let dtc_store = MemoryDtcStore::default();
        let firmware = MemoryFirmwareSink::new();
        let ecu = SimulatedEcu::new(EcuParts {
            config_store: Box::new(config_store.clone()),
            dtc_store: Box::new(dtc_store.clone()),
            firmware_sink: Box::new(firmware.clone()),
            faults,
            firmware_version: "FW_1.0.3".to_string(),
            end_processing_delay: Duration::from_millis(1000),
            telemetry_seed: Some(11),
        });
        Rig {
            ecu,
            config_store,
            dtc_store,
            firmware,
        }
    }

    fn rig() -> Rig {
        rig_with_faults(Box::new(NoFaults))
    }

    fn send(ecu: &mut SimulatedEcu, line: &str) -> String {
        ecu.process_line(line).map(|r| r.line).unwrap_or_default()
    }

    #[test]
    fn test_blank_line_gets_no_reply() {
        let mut rig = rig();
        assert_eq!(rig.ecu.process_line("  \r"), None);
    }

    #[test]
    fn test_get_data_ranges() {
        let mut rig = rig();
        for _ in 0..50 {
            let line = send(&mut rig.ecu, "GET_DATA");
            let reading = ecudiag_core::codec::decode_telemetry(&line);
            assert!((0..=120).contains(&reading.speed));
            assert!((800..=6000).contains(&reading.rpm));
            assert!((70..=110).contains(&reading.temperature));
            assert!((0..=100).contains(&reading.fuel));
        }
    }

    #[test]
    fn test_set_then_get_config() {
        let mut rig = rig();
        assert_eq!(send(&mut rig.ecu, "SET_MAX_RPM:7200"), "MAX_RPM_SET:7200");
        assert_eq!(send(&mut rig.ecu, "SET_FAN_TEMP:101"), "FAN_TEMP_SET:101");
        assert_eq!(send(&mut rig.ecu, "SET_FUEL_WARNING:20"), "FUEL_WARNING_SET:20");

        let config: EcuConfig = serde_json::from_str(&send(&mut rig.ecu, "GET_CONFIG")).unwrap();
        let expected = EcuConfig {
            max_rpm: 7200,
            fan_trigger_temp: 101,
            fuel_warning_level: 20,
        };
        assert_eq!(config, expected);
        assert_eq!(rig.config_store.saved(), expected);
    }

    #[test]
    fn test_invalid_set_values() {
        let mut rig = rig();
        assert_eq!(send(&mut rig.ecu, "SET_MAX_RPM:fast"), "ERROR:Invalid RPM value");
        assert_eq!(send(&mut rig.ecu, "SET_FAN_TEMP:"), "ERROR:Invalid temperature value");
        assert_eq!(
            send(&mut rig.ecu, "SET_FUEL_WARNING:1.5"),
            "ERROR:Invalid fuel level value"
        );
        assert_eq!(*rig.ecu.config(), EcuConfig::default());
    }

    #[test]
    fn test_apply_patch_positive_only() {
        let mut rig = rig();
        assert_eq!(
            send(&mut rig.ecu, r#"APPLY_PATCH:{"max_rpm":7000,"fan_trigger_temp":0,"fuel_warning_level":-3}"#),
            "PATCH_APPLIED"
        );
        assert_eq!(
            *rig.ecu.config(),
            EcuConfig {
                max_rpm: 7000,
                ..EcuConfig::default()
            }
        );

        assert_eq!(send(&mut rig.ecu, "APPLY_PATCH:{}"), "PATCH_APPLIED");
        assert_eq!(rig.ecu.config().max_rpm, 7000);
    }

    #[test]
    fn test_apply_patch_invalid() {
        let mut rig = rig();
        assert_eq!(
            send(&mut rig.ecu, "APPLY_PATCH:{max_rpm=1}"),
            "ERROR:Invalid JSON patch"
        );
        assert_eq!(*rig.ecu.config(), EcuConfig::default());
    }

    #[test]
    fn test_store_failure_leaves_state_unchanged() {
        let mut rig = rig();
        rig.config_store.set_fail_saves(true);

        assert_eq!(send(&mut rig.ecu, "SET_MAX_RPM:9000"), "ERROR:Internal error");
        assert_eq!(rig.ecu.config().max_rpm, 6000);

        // Dispatcher keeps working
        assert_eq!(send(&mut rig.ecu, "GET_VER"), "FW_1.0.3");
    }

    #[test]
    fn test_dtc_listing_and_clear() {
        let mut rig = rig();
        assert_eq!(
            send(&mut rig.ecu, "GET_DTC"),
            "[P0300] Random Misfire;;[P0420] Catalyst System Efficiency Below Threshold;;"
        );

        assert_eq!(send(&mut rig.ecu, "CLEAR_DTC"), "DTC_CLEARED");
        assert_eq!(rig.ecu.dtcs().len(), 2);
        assert!(rig.ecu.dtcs().iter().all(|r| !r.active));
        assert_eq!(rig.dtc_store.saved(), rig.ecu.dtcs().to_vec());
        assert_eq!(send(&mut rig.ecu, "GET_DTC"), "NO_DTC");
    }

    #[test]
    fn test_threshold_dtcs_are_idempotent() {
        let mut rig = rig();
        let hot_and_empty = TelemetryReading {
            speed: 50,
            rpm: 3000,
            temperature: 106,
            fuel: 3,
        };

        rig.ecu.check_thresholds(&hot_and_empty);
        rig.ecu.check_thresholds(&hot_and_empty);

        let codes: Vec<&str> = rig.ecu.dtcs().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["P0300", "P0420", "P0217", "P0460"]);
        assert_eq!(rig.dtc_store.save_count(), 1);
    }

    #[test]
    fn test_threshold_boundaries() {
        let mut rig = rig();
        rig.ecu.check_thresholds(&TelemetryReading {
            speed: 0,
            rpm: 800,
            temperature: 105,
            fuel: 15,
        });
        assert_eq!(rig.ecu.dtcs().len(), 2);
    }

    #[test]
    fn test_extreme_fan_trigger_never_overheats() {
        let mut ecu = SimulatedEcu::in_memory();
        assert_eq!(send(&mut ecu, "SET_FAN_TEMP:2147483647"), "FAN_TEMP_SET:2147483647");

        for _ in 0..20 {
            assert!(ecu.autonomous_sample().is_some());
        }
        assert!(ecu.dtcs().iter().all(|r| r.code != "P0217"));

        ecu.check_thresholds(&TelemetryReading {
            speed: 0,
            rpm: 800,
            temperature: i32::MAX,
            fuel: 50,
        });
        assert!(ecu.dtcs().iter().all(|r| r.code != "P0217"));
    }

    #[test]
    fn test_unknown_verb() {
        let mut rig = rig();
        assert_eq!(send(&mut rig.ecu, "REBOOT"), "ERROR:Unknown command");
    }

    #[test]
    fn test_firmware_session() {
        let mut rig = rig();
        assert_eq!(send(&mut rig.ecu, "START_FIRMWARE"), "READY");
        assert_eq!(send(&mut rig.ecu, "FIRMWARE::0300300002337A1E"), "OK");
        assert_eq!(send(&mut rig.ecu, "FIRMWARE::00000001FF"), "OK");

        let end = rig.ecu.process_line("END_FIRMWARE").unwrap();
        assert_eq!(end, DeviceReply::after("UPDATE_SUCCESS", Duration::from_millis(1000)));
        assert_eq!(
            rig.firmware.image().unwrap(),
            vec![":0300300002337A1E".to_string(), ":00000001FF".to_string()]
        );
        assert!(!rig.ecu.is_receiving_firmware());
    }

    #[test]
    fn test_rejected_line_is_not_buffered() {
        let mut rig = rig_with_faults(Box::new(ScriptedFaults::on_attempts([1])));
        send(&mut rig.ecu, "START_FIRMWARE");
        assert_eq!(send(&mut rig.ecu, "FIRMWARE:A"), "ERROR");
        assert_eq!(send(&mut rig.ecu, "FIRMWARE:A"), "OK");
        send(&mut rig.ecu, "END_FIRMWARE");
        assert_eq!(rig.firmware.image().unwrap(), vec!["A".to_string()]);
    }

    #[test]
    fn test_firmware_outside_reception() {
        let mut rig = rig();
        assert_eq!(
            send(&mut rig.ecu, "FIRMWARE:A"),
            "ERROR: Not in firmware reception mode"
        );
        assert_eq!(
            send(&mut rig.ecu, "END_FIRMWARE"),
            "ERROR: Not in firmware reception mode"
        );
        assert!(rig.firmware.image().is_none());
    }

    #[test]
    fn test_only_firmware_verbs_during_reception() {
        let mut rig = rig();
        send(&mut rig.ecu, "START_FIRMWARE");
        assert_eq!(send(&mut rig.ecu, "GET_DTC"), "UNKNOWN_COMMAND");
        assert_eq!(send(&mut rig.ecu, "REBOOT"), "UNKNOWN_COMMAND");
        assert!(rig.ecu.autonomous_sample().is_none());
        assert!(rig.ecu.is_receiving_firmware());
        assert_eq!(send(&mut rig.ecu, "FIRMWARE:A"), "OK");
    }

    #[test]
    fn test_start_resets_session() {
        let mut rig = rig();
        send(&mut rig.ecu, "START_FIRMWARE");
        send(&mut rig.ecu, "FIRMWARE:stale");
        send(&mut rig.ecu, "START_FIRMWARE");
        send(&mut rig.ecu, "FIRMWARE:fresh");
        send(&mut rig.ecu, "END_FIRMWARE");
        assert_eq!(rig.firmware.image().unwrap(), vec!["fresh".to_string()]);
    }
}
