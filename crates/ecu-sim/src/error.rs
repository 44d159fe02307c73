//! Device-side error types

use ecudiag_core::StoreError;
use thiserror::Error;

/// Failures inside a command handler
///
/// None of these reach the wire verbatim; the dispatcher answers
/// `ERROR:Internal error` and keeps running.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Device actor is not running")]
    ActorGone,
}
