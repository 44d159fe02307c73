//! Device configuration model

use serde::{Deserialize, Serialize};

/// Tunable device thresholds
///
/// Serialized with the same field names on disk, in `GET_CONFIG` replies and
/// in `APPLY_PATCH` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcuConfig {
    /// Upper bound for simulated engine speed
    #[serde(default = "default_max_rpm")]
    pub max_rpm: u32,

    /// Coolant temperature (degC) at which the fan engages
    #[serde(default = "default_fan_trigger_temp")]
    pub fan_trigger_temp: i32,

    /// Fuel percentage below which a warning is raised
    #[serde(default = "default_fuel_warning_level")]
    pub fuel_warning_level: u32,
}

fn default_max_rpm() -> u32 {
    6000
}

fn default_fan_trigger_temp() -> i32 {
    95
}

fn default_fuel_warning_level() -> u32 {
    15
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            max_rpm: default_max_rpm(),
            fan_trigger_temp: default_fan_trigger_temp(),
            fuel_warning_level: default_fuel_warning_level(),
        }
    }
}

/// Partial configuration carried by `APPLY_PATCH`
///
/// Absent fields deserialize as `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub max_rpm: i32,
    #[serde(default)]
    pub fan_trigger_temp: i32,
    #[serde(default)]
    pub fuel_warning_level: i32,
}

impl ConfigPatch {
    /// Produce the configuration that results from applying this patch.
    ///
    /// Only strictly positive values overwrite. A patch value of `0` or below
    /// leaves the field untouched, so a patch cannot lower
    /// `fan_trigger_temp` to zero or below. Existing tools depend on this.
    pub fn apply(&self, current: &EcuConfig) -> EcuConfig {
        let mut next = *current;
        if self.max_rpm > 0 {
            next.max_rpm = self.max_rpm as u32;
        }
        if self.fan_trigger_temp > 0 {
            next.fan_trigger_temp = self.fan_trigger_temp;
        }
        if self.fuel_warning_level > 0 {
            next.fuel_warning_level = self.fuel_warning_level as u32;
        }
        next
    }
}
