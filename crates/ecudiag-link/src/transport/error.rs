//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Port unavailable: {0}")]
    PortUnavailable(String),

    #[error("Read timed out")]
    ReadTimeout,

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Errors that a later attempt on the same connection may not hit again
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::WriteTimeout)
    }
}
