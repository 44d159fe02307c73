//! Error types for client operations

use ecudiag_link::TransportError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to a device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The link itself failed (port gone, write rejected)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device answered, but not with the expected reply
    #[error("{command} rejected by device: {reply}")]
    Rejected { command: String, reply: String },

    /// No reply within the read timeout
    #[error("No reply to {command}")]
    Timeout { command: String },

    /// Reply was not a printable text line
    #[error("Malformed reply to {command}: {raw:?}")]
    Malformed { command: String, raw: String },

    /// Caller supplied something that must not be sent
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ClientError {
    /// The device replied with an `ERROR:` line
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Rejected { reply, .. } if reply.starts_with(ecudiag_core::wire::reply::ERROR))
    }
}
