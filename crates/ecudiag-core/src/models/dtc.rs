//! Diagnostic trouble code records

use serde::{Deserialize, Serialize};

/// Coolant temperature exceeded the fan trigger by more than 10 degC
pub const COOLANT_OVER_TEMPERATURE: (&str, &str) = ("P0217", "Engine Coolant Over Temperature");

/// Fuel level dropped below the warning threshold
pub const FUEL_LEVEL_SENSOR: (&str, &str) = ("P0460", "Fuel Level Sensor Circuit");

/// A stored DTC
///
/// Codes are unique within a device's list. Clearing flips `active` and
/// keeps the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtcRecord {
    pub code: String,
    pub description: String,
    #[serde(rename = "is_active", default)]
    pub active: bool,
}

impl DtcRecord {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            active: true,
        }
    }
}

/// DTC list installed on a factory-fresh device
pub fn default_dtcs() -> Vec<DtcRecord> {
    vec![
        DtcRecord::new("P0300", "Random Misfire"),
        DtcRecord::new("P0420", "Catalyst System Efficiency Below Threshold"),
    ]
}

/// One decoded entry of a `GET_DTC` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtcEntry {
    pub code: String,
    pub description: String,
}
