//! Simulator runtime
//!
//! Two loops share the device's line:
//! - dispatch: if input is pending read one line, hand it to the device
//!   actor and write the reply; otherwise sleep for the poll interval
//! - ticker: every telemetry interval write one unsolicited sample

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ecudiag_link::{LineTransport, TransportError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::actor::EcuHandle;
use crate::config::DeviceSettings;
use crate::device::SimulatedEcu;

/// How long shutdown waits for each task
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Wires a device to a line transport
pub struct Simulator {
    transport: Arc<dyn LineTransport>,
    poll_interval: Duration,
    telemetry_interval: Option<Duration>,
}

impl Simulator {
    pub fn new(transport: Arc<dyn LineTransport>, settings: &DeviceSettings) -> Self {
        Self {
            transport,
            poll_interval: settings.poll_interval(),
            telemetry_interval: settings.telemetry_interval(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `None` disables unsolicited telemetry
    pub fn with_telemetry_interval(mut self, interval: Option<Duration>) -> Self {
        self.telemetry_interval = interval;
        self
    }

    /// Start the device actor and both loops
    pub fn spawn(self, ecu: SimulatedEcu) -> SimulatorHandle {
        let running = Arc::new(AtomicBool::new(true));
        let (ecu, actor_task) = EcuHandle::spawn(ecu);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(dispatch_loop(
            self.transport.clone(),
            ecu.clone(),
            running.clone(),
            self.poll_interval,
        )));

        if let Some(interval) = self.telemetry_interval {
            tasks.push(tokio::spawn(telemetry_loop(
                self.transport.clone(),
                ecu.clone(),
                running.clone(),
                interval,
            )));
        }

        info!(
            link = %self.transport.name(),
            telemetry = self.telemetry_interval.is_some(),
            "Simulator running"
        );

        SimulatorHandle {
            ecu,
            running,
            tasks,
            actor_task: Some(actor_task),
        }
    }
}

/// Running simulator; dropping it stops the loops
pub struct SimulatorHandle {
    ecu: EcuHandle,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    actor_task: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    /// Direct access to the device, bypassing the line
    pub fn ecu(&self) -> &EcuHandle {
        &self.ecu
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both loops, letting an in-progress reply finish
    pub async fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        for task in self.tasks.drain(..) {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Simulator task did not stop in time");
            }
        }
        if let Some(actor) = self.actor_task.take() {
            actor.abort();
        }
        info!("Simulator stopped");
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for task in &self.tasks {
            task.abort();
        }
        if let Some(actor) = &self.actor_task {
            actor.abort();
        }
    }
}

async fn dispatch_loop(
    transport: Arc<dyn LineTransport>,
    ecu: EcuHandle,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match transport.input_pending().await {
            Ok(true) => {}
            Ok(false) => {
                tokio::time::sleep(poll_interval).await;
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Input check failed");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        }

        let line = match transport.read_line().await {
            Ok(line) => line,
            // Partial line; the rest arrives on a later pass
            Err(TransportError::ReadTimeout) => continue,
            Err(e) => {
                warn!(error = %e, "Read failed");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        let reply = match ecu.process_line(line).await {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Device actor unavailable");
                break;
            }
        };

        if !reply.delay.is_zero() {
            debug!(delay_ms = reply.delay.as_millis() as u64, "Processing");
            tokio::time::sleep(reply.delay).await;
        }
        if let Err(e) = transport.write_line(&reply.line).await {
            warn!(error = %e, reply = %reply.line, "Failed to send reply");
        }
    }
    debug!("Dispatch loop stopped");
}

async fn telemetry_loop(
    transport: Arc<dyn LineTransport>,
    ecu: EcuHandle,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately
    ticker.tick().await;

    while running.load(Ordering::SeqCst) {
        ticker.tick().await;
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match ecu.tick().await {
            Ok(Some(line)) => {
                if let Err(e) = transport.write_line(&line).await {
                    debug!(error = %e, "Failed to send telemetry");
                }
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }
    debug!("Telemetry loop stopped");
}
