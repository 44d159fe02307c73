//! ecu-sim - Serial-link ECU simulator
//!
//! Answers the line protocol the way a field device does: live telemetry,
//! configuration thresholds, a persisted DTC list and a firmware reception
//! mode with configurable line rejection.
//!
//! # Modules
//!
//! - [`device`] - command dispatcher and device state
//! - [`actor`] - single-owner task serialising access to the device
//! - [`simulator`] - dispatch and telemetry loops over a line transport
//! - [`fault`] - firmware line fault injectors
//! - [`config`] - TOML configuration

pub mod actor;
pub mod config;
pub mod device;
pub mod error;
pub mod fault;
pub mod firmware;
pub mod simulator;

pub use actor::EcuHandle;
pub use config::SimulatorConfig;
pub use device::{DeviceReply, DeviceSnapshot, EcuParts, SimulatedEcu};
pub use error::DeviceError;
pub use fault::{FaultInjector, NoFaults, RandomFaults, ScriptedFaults};
pub use simulator::{Simulator, SimulatorHandle};
