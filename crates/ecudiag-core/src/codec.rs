//! Command codec
//!
//! Commands are single ASCII lines: a verb, optionally followed by
//! `:<payload>`. Multi-field payloads use `KEY1:V1,KEY2:V2` with decimal
//! integer values. Decoding is permissive: unknown keys are skipped and a
//! value that fails to parse decodes as `0` (see [`parse_or_zero`]).

use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;
use crate::models::{DtcEntry, DtcRecord, TelemetryReading};
use crate::wire::{self, reply, telemetry, verb};

/// Every request the device understands
///
/// `SET_*` payloads are kept as received so the device can answer
/// `ERROR:Invalid ... value` for unparseable numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetData,
    SetMaxRpm(String),
    SetFanTemp(String),
    SetFuelWarning(String),
    GetDtc,
    ClearDtc,
    GetConfig,
    ApplyPatch(String),
    GetVersion,
    StartFirmware,
    Firmware(String),
    EndFirmware,
}

impl Command {
    pub fn set_max_rpm(value: u32) -> Self {
        Self::SetMaxRpm(value.to_string())
    }

    pub fn set_fan_temp(value: i32) -> Self {
        Self::SetFanTemp(value.to_string())
    }

    pub fn set_fuel_warning(value: u32) -> Self {
        Self::SetFuelWarning(value.to_string())
    }

    /// The verb this command is sent with
    pub fn verb(&self) -> &'static str {
        match self {
            Self::GetData => verb::GET_DATA,
            Self::SetMaxRpm(_) => verb::SET_MAX_RPM,
            Self::SetFanTemp(_) => verb::SET_FAN_TEMP,
            Self::SetFuelWarning(_) => verb::SET_FUEL_WARNING,
            Self::GetDtc => verb::GET_DTC,
            Self::ClearDtc => verb::CLEAR_DTC,
            Self::GetConfig => verb::GET_CONFIG,
            Self::ApplyPatch(_) => verb::APPLY_PATCH,
            Self::GetVersion => verb::GET_VER,
            Self::StartFirmware => verb::START_FIRMWARE,
            Self::Firmware(_) => verb::FIRMWARE,
            Self::EndFirmware => verb::END_FIRMWARE,
        }
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::SetMaxRpm(p)
            | Self::SetFanTemp(p)
            | Self::SetFuelWarning(p)
            | Self::ApplyPatch(p)
            | Self::Firmware(p) => Some(p),
            _ => None,
        }
    }

    /// Verbs a device keeps serving while a firmware session is open
    pub fn is_firmware_verb(&self) -> bool {
        matches!(
            self,
            Self::StartFirmware | Self::Firmware(_) | Self::EndFirmware
        )
    }

    /// Encode as a wire line (without terminator)
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload() {
            Some(payload) => write!(f, "{}{}{}", self.verb(), wire::PAYLOAD_SEPARATOR, payload),
            None => write!(f, "{}", self.verb()),
        }
    }
}

impl FromStr for Command {
    type Err = CodecError;

    /// Decode a received line. Bare verbs match exactly after trimming;
    /// payload-carrying verbs match on `<VERB>:`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CodecError::EmptyLine);
        }

        let command = match line {
            verb::GET_DATA => Self::GetData,
            verb::GET_DTC => Self::GetDtc,
            verb::CLEAR_DTC => Self::ClearDtc,
            verb::GET_CONFIG => Self::GetConfig,
            verb::GET_VER => Self::GetVersion,
            verb::START_FIRMWARE => Self::StartFirmware,
            verb::END_FIRMWARE => Self::EndFirmware,
            _ => {
                let (head, payload) = line
                    .split_once(wire::PAYLOAD_SEPARATOR)
                    .ok_or_else(|| CodecError::UnknownCommand(line.to_string()))?;
                let payload = payload.to_string();
                match head {
                    verb::SET_MAX_RPM => Self::SetMaxRpm(payload),
                    verb::SET_FAN_TEMP => Self::SetFanTemp(payload),
                    verb::SET_FUEL_WARNING => Self::SetFuelWarning(payload),
                    verb::APPLY_PATCH => Self::ApplyPatch(payload),
                    verb::FIRMWARE => Self::Firmware(payload),
                    _ => return Err(CodecError::UnknownCommand(line.to_string())),
                }
            }
        };

        Ok(command)
    }
}

// =============================================================================
// Numeric policy
// =============================================================================

/// Fail-soft integer parsing: anything that is not a decimal `i32` is `0`.
pub fn parse_or_zero(value: &str) -> i32 {
    value.trim().parse().unwrap_or(0)
}

/// Split a `KEY1:V1,KEY2:V2` payload into `(key, value)` pairs.
///
/// Fragments without a `:` are skipped.
pub fn decode_fields(payload: &str) -> impl Iterator<Item = (&str, &str)> {
    payload.split(wire::FIELD_SEPARATOR).filter_map(|part| {
        part.split_once(wire::PAYLOAD_SEPARATOR)
            .map(|(k, v)| (k.trim(), v.trim()))
    })
}

// =============================================================================
// Telemetry
// =============================================================================

/// Encode a reading as `SPEED:{},RPM:{},TEMP:{},FUEL:{}`
pub fn encode_telemetry(reading: &TelemetryReading) -> String {
    format!(
        "{}:{},{}:{},{}:{},{}:{}",
        telemetry::SPEED,
        reading.speed,
        telemetry::RPM,
        reading.rpm,
        telemetry::TEMP,
        reading.temperature,
        telemetry::FUEL,
        reading.fuel
    )
}

/// Decode a telemetry line. Missing fields stay `0`.
pub fn decode_telemetry(line: &str) -> TelemetryReading {
    let mut reading = TelemetryReading::default();
    for (key, value) in decode_fields(line) {
        match key {
            telemetry::SPEED => reading.speed = parse_or_zero(value),
            telemetry::RPM => reading.rpm = parse_or_zero(value),
            telemetry::TEMP => reading.temperature = parse_or_zero(value),
            telemetry::FUEL => reading.fuel = parse_or_zero(value),
            _ => {}
        }
    }
    reading
}

// =============================================================================
// DTC listing
// =============================================================================

/// Encode the active records as `[code] description;;...`, or `NO_DTC`.
///
/// Descriptions are not escaped. A description containing `;;` splits into
/// two entries when decoded; this matches every deployed tool.
pub fn encode_dtc_listing(records: &[DtcRecord]) -> String {
    let listing: String = records
        .iter()
        .filter(|r| r.active)
        .map(|r| format!("[{}] {}{}", r.code, r.description, wire::DTC_RECORD_SEPARATOR))
        .collect();

    if listing.is_empty() {
        reply::NO_DTC.to_string()
    } else {
        listing
    }
}

/// Decode a `GET_DTC` reply. `NO_DTC` and blank fragments yield nothing.
pub fn decode_dtc_listing(line: &str) -> Vec<DtcEntry> {
    let line = line.trim();
    if line == reply::NO_DTC {
        return Vec::new();
    }

    line.split(wire::DTC_RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(|fragment| {
            let bracketed = fragment
                .strip_prefix('[')
                .and_then(|rest| rest.split_once(']'));
            match bracketed {
                Some((code, description)) => DtcEntry {
                    code: code.trim().to_string(),
                    description: description.trim().to_string(),
                },
                None => DtcEntry {
                    code: String::new(),
                    description: fragment.to_string(),
                },
            }
        })
        .collect()
}
