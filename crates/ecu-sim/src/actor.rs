//! Device actor
//!
//! A single task owns the [`SimulatedEcu`]; the dispatch loop and the
//! telemetry ticker talk to it through an [`EcuHandle`]. Requests are handled
//! strictly one at a time, in arrival order.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::device::{DeviceReply, DeviceSnapshot, SimulatedEcu};
use crate::error::DeviceError;

const MAILBOX_SIZE: usize = 32;

enum EcuMessage {
    Line {
        line: String,
        reply: oneshot::Sender<Option<DeviceReply>>,
    },
    Tick {
        reply: oneshot::Sender<Option<String>>,
    },
    Snapshot {
        reply: oneshot::Sender<DeviceSnapshot>,
    },
}

/// Cloneable sender side of the device actor
#[derive(Clone)]
pub struct EcuHandle {
    tx: mpsc::Sender<EcuMessage>,
}

impl EcuHandle {
    /// Move `ecu` into a new actor task
    pub fn spawn(ecu: SimulatedEcu) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(MAILBOX_SIZE);
        let task = tokio::spawn(run(ecu, rx));
        (Self { tx }, task)
    }

    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EcuMessage,
    ) -> Result<T, DeviceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| DeviceError::ActorGone)?;
        reply_rx.await.map_err(|_| DeviceError::ActorGone)
    }

    /// Dispatch one received line
    pub async fn process_line(&self, line: impl Into<String>) -> Result<Option<DeviceReply>, DeviceError> {
        let line = line.into();
        self.call(|reply| EcuMessage::Line { line, reply }).await
    }

    /// Ask for an unsolicited telemetry line
    pub async fn tick(&self) -> Result<Option<String>, DeviceError> {
        self.call(|reply| EcuMessage::Tick { reply }).await
    }

    pub async fn snapshot(&self) -> Result<DeviceSnapshot, DeviceError> {
        self.call(|reply| EcuMessage::Snapshot { reply }).await
    }
}

async fn run(mut ecu: SimulatedEcu, mut rx: mpsc::Receiver<EcuMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            EcuMessage::Line { line, reply } => {
                let _ = reply.send(ecu.process_line(&line));
            }
            EcuMessage::Tick { reply } => {
                let _ = reply.send(ecu.autonomous_sample());
            }
            EcuMessage::Snapshot { reply } => {
                let _ = reply.send(ecu.snapshot());
            }
        }
    }
    debug!("Device actor stopped");
}
