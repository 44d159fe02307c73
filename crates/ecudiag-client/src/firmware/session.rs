//! Firmware transfer states and their legal transitions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::FirmwareError;

/// Client-side firmware transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Idle,
    VersionChecked,
    Transferring,
    Completed,
    Aborted,
}

impl TransferState {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether `self -> next` is a legal step
    pub fn can_advance_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Idle, VersionChecked) | (VersionChecked, Transferring) | (Transferring, Completed) => {
                true
            }
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::VersionChecked => "version checked",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Tracks the state of one transfer and refuses illegal jumps
#[derive(Debug, Clone)]
pub struct TransferSession {
    state: TransferState,
    history: Vec<TransferState>,
}

impl TransferSession {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            history: vec![TransferState::Idle],
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Every state visited, in order, starting with `Idle`
    pub fn history(&self) -> &[TransferState] {
        &self.history
    }

    pub fn advance(&mut self, next: TransferState) -> Result<(), FirmwareError> {
        if !self.state.can_advance_to(next) {
            return Err(FirmwareError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "Transfer state change");
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for TransferSession {
    fn default() -> Self {
        Self::new()
    }
}
