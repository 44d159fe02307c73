//! Error types for codec and persistence operations

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while decoding a line into a [`crate::Command`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Line was empty after trimming
    #[error("Empty command line")]
    EmptyLine,

    /// Verb is not part of the command vocabulary
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Errors raised by collaborator stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored document could not be (de)serialized
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Expected file does not exist
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// Store refused the operation (used by in-memory stores in tests)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
