//! Line transport trait

use std::time::Duration;

use async_trait::async_trait;

use super::TransportError;

/// Transport-agnostic interface for line-oriented communication
///
/// One conversation at a time: callers never overlap a write with a read
/// on the same transport.
#[async_trait]
pub trait LineTransport: Send + Sync {
    /// Write `line` followed by the terminator
    ///
    /// Fails with [`TransportError::WriteTimeout`] if the bytes cannot be
    /// accepted within the write timeout.
    async fn write_line(&self, line: &str) -> Result<(), TransportError>;

    /// Read one line, terminator stripped
    ///
    /// Blocks until a terminator arrives or the read timeout elapses
    /// ([`TransportError::ReadTimeout`]). Excessively long unterminated
    /// input is dropped and reported as a timeout.
    async fn read_line(&self) -> Result<String, TransportError>;

    /// Drop any buffered, unread input
    async fn discard_input(&self) -> Result<(), TransportError>;

    /// Whether unread input is waiting
    async fn input_pending(&self) -> Result<bool, TransportError>;

    /// Configured read timeout
    fn read_timeout(&self) -> Duration;

    /// Human-readable endpoint name for logs
    fn name(&self) -> String;
}
