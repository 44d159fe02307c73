//! Output formatting for ecudiag (table, json, csv)

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use ecudiag_core::TelemetrySample;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                let keys: Vec<String> = pairs.iter().map(|(k, _)| escape_csv(k)).collect();
                println!("{}", keys.join(","));
                let values: Vec<String> = pairs.iter().map(|(_, v)| escape_csv(v)).collect();
                println!("{}", values.join(","));
            }
        }
    }

    /// Print one live telemetry sample
    pub fn print_sample(&self, sample: &TelemetrySample) {
        match self.format {
            OutputFormat::Table => {
                println!(
                    "[{}] Speed: {} km/h | RPM: {} | Temp: {} °C | Fuel: {} %",
                    sample.formatted_timestamp(),
                    sample.speed,
                    paint(sample.rpm.to_string(), rpm_level(sample.rpm)),
                    paint(sample.temperature.to_string(), temperature_level(sample.temperature)),
                    paint(sample.fuel.to_string(), fuel_level(sample.fuel)),
                );
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(&TelemetryRow::from(sample)) {
                    println!("{}", json);
                }
            }
            OutputFormat::Csv => {
                println!(
                    "{},{},{},{},{}",
                    sample.formatted_timestamp(),
                    sample.speed,
                    sample.rpm,
                    sample.temperature,
                    sample.fuel
                );
            }
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T]) {
    if data.is_empty() {
        return;
    }

    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        println!("{}", headers.join(","));

        for item in data {
            if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        row.get(*h)
                            .map(|v| match v {
                                serde_json::Value::String(s) => escape_csv(s),
                                other => escape_csv(&other.to_string()),
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Telemetry highlighting
// =============================================================================

/// How alarming a live value is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Normal,
    Elevated,
    Critical,
}

pub fn rpm_level(rpm: i32) -> Level {
    if rpm > 5000 {
        Level::Critical
    } else if rpm > 3500 {
        Level::Elevated
    } else {
        Level::Normal
    }
}

pub fn temperature_level(temperature: i32) -> Level {
    if temperature > 95 {
        Level::Critical
    } else if temperature > 85 {
        Level::Elevated
    } else {
        Level::Normal
    }
}

/// Low fuel is the alarming direction
pub fn fuel_level(fuel: i32) -> Level {
    if fuel < 15 {
        Level::Critical
    } else if fuel < 30 {
        Level::Elevated
    } else {
        Level::Normal
    }
}

fn paint(value: String, level: Level) -> ColoredString {
    match level {
        Level::Normal => value.green(),
        Level::Elevated => value.yellow(),
        Level::Critical => value.red(),
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Telemetry sample for monitor output
#[derive(Debug, Tabled, Serialize)]
pub struct TelemetryRow {
    #[tabled(rename = "Timestamp")]
    pub timestamp: String,
    #[tabled(rename = "Speed")]
    pub speed: i32,
    #[tabled(rename = "RPM")]
    pub rpm: i32,
    #[tabled(rename = "Temperature")]
    pub temperature: i32,
    #[tabled(rename = "Fuel")]
    pub fuel: i32,
}

impl From<&TelemetrySample> for TelemetryRow {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            timestamp: sample.formatted_timestamp(),
            speed: sample.speed,
            rpm: sample.rpm,
            temperature: sample.temperature,
            fuel: sample.fuel,
        }
    }
}

/// Fault code display for dtc command
#[derive(Debug, Tabled, Serialize)]
pub struct DtcRow {
    #[tabled(rename = "Code")]
    pub code: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

/// Setting display for config command
#[derive(Debug, Tabled, Serialize)]
pub struct ConfigRow {
    #[tabled(rename = "Setting")]
    pub setting: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Serial port display for ports command
#[derive(Debug, Tabled, Serialize)]
pub struct PortRow {
    #[tabled(rename = "Port")]
    pub port: String,
    #[tabled(rename = "Description")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_thresholds() {
        assert_eq!(rpm_level(800), Level::Normal);
        assert_eq!(rpm_level(3500), Level::Normal);
        assert_eq!(rpm_level(3501), Level::Elevated);
        assert_eq!(rpm_level(5000), Level::Elevated);
        assert_eq!(rpm_level(5001), Level::Critical);
    }

    #[test]
    fn test_temperature_thresholds() {
        assert_eq!(temperature_level(85), Level::Normal);
        assert_eq!(temperature_level(86), Level::Elevated);
        assert_eq!(temperature_level(95), Level::Elevated);
        assert_eq!(temperature_level(96), Level::Critical);
    }

    #[test]
    fn test_fuel_thresholds() {
        assert_eq!(fuel_level(30), Level::Normal);
        assert_eq!(fuel_level(29), Level::Elevated);
        assert_eq!(fuel_level(15), Level::Elevated);
        assert_eq!(fuel_level(14), Level::Critical);
        assert_eq!(fuel_level(0), Level::Critical);
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("P0300"), "P0300");
        assert_eq!(escape_csv("Misfire, cylinder 1"), "\"Misfire, cylinder 1\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
