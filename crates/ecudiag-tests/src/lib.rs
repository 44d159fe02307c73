//! End-to-end tests for ecudiag
//!
//! Every test starts a simulated ECU on an in-memory line and drives it
//! through the real client engine, so no serial hardware is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ecudiag-tests
//! ```
//!
//! # Test Structure
//!
//! - `diagnostics_e2e.rs` - configuration, DTC and identification commands
//! - `firmware_e2e.rs` - firmware transfer sessions, with and without faults
//! - `poller_e2e.rs` - periodic telemetry polling and autonomous telemetry

// This crate only contains tests, no library code
