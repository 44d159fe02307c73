//! Wire literals
//!
//! Every string that crosses the serial line is defined here so the device
//! and the operator tools cannot drift apart. Lines are ASCII and terminated
//! by [`TERMINATOR`].

/// Line terminator appended by the transport on write
pub const TERMINATOR: &str = "\n";

/// Separator between a verb and its payload (`SET_MAX_RPM:6500`)
pub const PAYLOAD_SEPARATOR: char = ':';

/// Separator between fields of a multi-field payload (`SPEED:72,RPM:2200`)
pub const FIELD_SEPARATOR: char = ',';

/// Separator between DTC records in a `GET_DTC` listing
pub const DTC_RECORD_SEPARATOR: &str = ";;";

/// Request verbs (operator -> device)
pub mod verb {
    pub const GET_DATA: &str = "GET_DATA";
    pub const SET_MAX_RPM: &str = "SET_MAX_RPM";
    pub const SET_FAN_TEMP: &str = "SET_FAN_TEMP";
    pub const SET_FUEL_WARNING: &str = "SET_FUEL_WARNING";
    pub const GET_DTC: &str = "GET_DTC";
    pub const CLEAR_DTC: &str = "CLEAR_DTC";
    pub const GET_CONFIG: &str = "GET_CONFIG";
    pub const APPLY_PATCH: &str = "APPLY_PATCH";
    pub const GET_VER: &str = "GET_VER";
    pub const START_FIRMWARE: &str = "START_FIRMWARE";
    pub const FIRMWARE: &str = "FIRMWARE";
    pub const END_FIRMWARE: &str = "END_FIRMWARE";
}

/// Reply literals (device -> operator)
pub mod reply {
    pub const MAX_RPM_SET: &str = "MAX_RPM_SET";
    pub const FAN_TEMP_SET: &str = "FAN_TEMP_SET";
    pub const FUEL_WARNING_SET: &str = "FUEL_WARNING_SET";
    pub const NO_DTC: &str = "NO_DTC";
    pub const DTC_CLEARED: &str = "DTC_CLEARED";
    pub const PATCH_APPLIED: &str = "PATCH_APPLIED";
    pub const READY: &str = "READY";
    pub const OK: &str = "OK";
    pub const ERROR: &str = "ERROR";
    pub const UPDATE_SUCCESS: &str = "UPDATE_SUCCESS";
    pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";

    /// Prefix shared by every `ERROR:<reason>` reply
    pub const ERROR_PREFIX: &str = "ERROR:";

    pub const INVALID_RPM: &str = "ERROR:Invalid RPM value";
    pub const INVALID_TEMPERATURE: &str = "ERROR:Invalid temperature value";
    pub const INVALID_FUEL_LEVEL: &str = "ERROR:Invalid fuel level value";
    pub const INVALID_PATCH: &str = "ERROR:Invalid JSON patch";
    pub const UNKNOWN_VERB: &str = "ERROR:Unknown command";
    pub const INTERNAL_ERROR: &str = "ERROR:Internal error";
    pub const NOT_RECEIVING: &str = "ERROR: Not in firmware reception mode";
}

/// Telemetry field keys
pub mod telemetry {
    pub const SPEED: &str = "SPEED";
    pub const RPM: &str = "RPM";
    pub const TEMP: &str = "TEMP";
    pub const FUEL: &str = "FUEL";
}

/// Firmware version reported by a factory-fresh device
pub const DEFAULT_FIRMWARE_VERSION: &str = "FW_1.0.3";
