//! Protocol client engine
//!
//! One request, one reply: discard stale input, write the command line,
//! wait a fixed settle delay, read exactly one line and classify it against
//! the caller's expectation. No retries happen at this layer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ecudiag_core::wire::reply;
use ecudiag_core::Command;
use ecudiag_link::{LineTransport, TransportError};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Outcome of one request/response round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Reply matched the expectation
    Ack(String),
    /// Device answered something else
    Nack(String),
    /// Nothing (or an empty line) arrived in time
    Timeout,
    /// Reply contained bytes that are not printable text
    MalformedLine(String),
}

impl Reply {
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack(_))
    }

    /// Convert to the acknowledged payload, or an error naming `command`
    pub fn into_result(self, command: &Command) -> Result<String> {
        match self {
            Self::Ack(payload) => Ok(payload),
            Self::Nack(reply) => Err(ClientError::Rejected {
                command: command.verb().to_string(),
                reply,
            }),
            Self::Timeout => Err(ClientError::Timeout {
                command: command.verb().to_string(),
            }),
            Self::MalformedLine(raw) => Err(ClientError::Malformed {
                command: command.verb().to_string(),
                raw,
            }),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack(payload) => write!(f, "ack '{}'", payload),
            Self::Nack(reply) => write!(f, "nack '{}'", reply),
            Self::Timeout => write!(f, "timeout"),
            Self::MalformedLine(raw) => write!(f, "malformed {:?}", raw),
        }
    }
}

/// What a successful reply looks like
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    /// Reply equals the literal (`DTC_CLEARED`)
    Exact(String),
    /// Reply starts with the literal (`MAX_RPM_SET:`)
    Prefix(String),
    /// Any reply that is not an `ERROR` line or `UNKNOWN_COMMAND`
    NotError,
}

impl Expect {
    pub fn exact(literal: impl Into<String>) -> Self {
        Self::Exact(literal.into())
    }

    pub fn prefix(literal: impl Into<String>) -> Self {
        Self::Prefix(literal.into())
    }

    pub fn matches(&self, reply_line: &str) -> bool {
        match self {
            Self::Exact(expected) => reply_line == expected,
            Self::Prefix(prefix) => reply_line.starts_with(prefix.as_str()),
            Self::NotError => {
                !reply_line.starts_with(reply::ERROR) && reply_line != reply::UNKNOWN_COMMAND
            }
        }
    }
}

/// Classify one raw line read from the transport
pub fn classify(raw: &str, expect: &Expect) -> Reply {
    let line = raw.trim();
    if line.is_empty() {
        return Reply::Timeout;
    }
    if line
        .chars()
        .any(|c| c.is_control() || c == char::REPLACEMENT_CHARACTER)
    {
        return Reply::MalformedLine(raw.to_string());
    }
    if expect.matches(line) {
        Reply::Ack(line.to_string())
    } else {
        Reply::Nack(line.to_string())
    }
}

/// Request/response engine shared by the diagnostic client and the uploader
#[derive(Clone)]
pub struct ProtocolClient {
    transport: Arc<dyn LineTransport>,
}

impl ProtocolClient {
    pub fn new(transport: Arc<dyn LineTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn LineTransport> {
        &self.transport
    }

    /// Perform one round-trip
    ///
    /// Returns `Err` only when the request could not be written; every
    /// read-side failure becomes [`Reply::Timeout`].
    pub async fn send(&self, command: &Command, expect: &Expect, settle: Duration) -> Result<Reply> {
        let line = command.to_line();

        self.transport.discard_input().await?;
        debug!(command = %line, "Sending");
        self.transport.write_line(&line).await?;

        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }

        let reply = match self.transport.read_line().await {
            Ok(raw) => classify(&raw, expect),
            Err(TransportError::ReadTimeout) => Reply::Timeout,
            Err(e) => {
                warn!(command = command.verb(), error = %e, "Read failed");
                Reply::Timeout
            }
        };

        match &reply {
            Reply::Ack(_) => debug!(command = command.verb(), %reply, "Reply"),
            _ => warn!(command = command.verb(), %reply, "Unexpected reply"),
        }
        Ok(reply)
    }
}
