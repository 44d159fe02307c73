//! Shared data models

mod config;
mod dtc;
mod telemetry;

pub use config::*;
pub use dtc::*;
pub use telemetry::*;
