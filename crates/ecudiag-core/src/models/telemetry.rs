//! Telemetry readings

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Timestamp format used in the telemetry log and exports
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One set of live values as carried on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Vehicle speed in km/h
    pub speed: i32,
    pub rpm: i32,
    /// Coolant temperature in degC
    pub temperature: i32,
    /// Fuel level in percent
    pub fuel: i32,
}

/// A reading stamped with the time the operator received it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Local>,
    pub speed: i32,
    pub rpm: i32,
    pub temperature: i32,
    pub fuel: i32,
}

impl TelemetrySample {
    pub fn new(timestamp: DateTime<Local>, reading: TelemetryReading) -> Self {
        Self {
            timestamp,
            speed: reading.speed,
            rpm: reading.rpm,
            temperature: reading.temperature,
            fuel: reading.fuel,
        }
    }

    /// Stamp a reading with the current local time
    pub fn now(reading: TelemetryReading) -> Self {
        Self::new(Local::now(), reading)
    }

    pub fn reading(&self) -> TelemetryReading {
        TelemetryReading {
            speed: self.speed,
            rpm: self.rpm,
            temperature: self.temperature,
            fuel: self.fuel,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}
