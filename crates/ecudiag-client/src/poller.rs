//! Telemetry poller
//!
//! Sends `GET_DATA` on a fixed interval, appends each decoded sample to a
//! [`TelemetrySink`] and publishes it as a [`PollEvent`]. Stopping only
//! prevents the next poll; a round-trip already on the wire runs to
//! completion first.

use std::time::Duration;

use ecudiag_core::store::TelemetrySink;
use ecudiag_core::TelemetrySample;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::DiagClient;
use crate::error::ClientError;

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_BUFFER: usize = 64;

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Sample(TelemetrySample),
    Failed(ClientError),
}

/// Counters reported when the poller stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub polls: u64,
    pub samples: u64,
    pub failures: u64,
    /// Samples received but not written to the log
    pub log_errors: u64,
}

/// Periodic `GET_DATA` loop
pub struct TelemetryPoller {
    client: DiagClient,
    interval: Duration,
}

impl TelemetryPoller {
    pub fn new(client: DiagClient) -> Self {
        Self {
            client,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling in a background task
    pub fn spawn<S>(self, mut sink: S) -> PollerHandle
    where
        S: TelemetrySink + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let Self { client, interval } = self;

        let task = tokio::spawn(async move {
            let mut stats = PollStats::default();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Telemetry polling started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if *stop_rx.borrow() {
                    break;
                }

                stats.polls += 1;
                let event = match client.read_telemetry().await {
                    Ok(sample) => {
                        stats.samples += 1;
                        debug!(
                            speed = sample.speed,
                            rpm = sample.rpm,
                            temperature = sample.temperature,
                            fuel = sample.fuel,
                            "Telemetry sample"
                        );
                        if let Err(e) = sink.append(&sample) {
                            stats.log_errors += 1;
                            warn!(error = %e, "Failed to log telemetry sample");
                        }
                        PollEvent::Sample(sample)
                    }
                    Err(e) => {
                        stats.failures += 1;
                        warn!(error = %e, "Telemetry poll failed");
                        PollEvent::Failed(e)
                    }
                };

                // Nobody listening, or listener lagging: drop the event
                let _ = events_tx.try_send(event);
            }

            info!(
                polls = stats.polls,
                samples = stats.samples,
                failures = stats.failures,
                "Telemetry polling stopped"
            );
            stats
        });

        PollerHandle {
            stop_tx,
            events: events_rx,
            task: Some(task),
        }
    }
}

/// Handle to a running poller; dropping it stops polling
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    events: mpsc::Receiver<PollEvent>,
    task: Option<JoinHandle<PollStats>>,
}

impl PollerHandle {
    /// Wait for the next poll outcome; `None` once the poller has stopped
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Stop polling and wait for any in-flight round-trip to finish
    pub async fn stop(mut self) -> PollStats {
        let _ = self.stop_tx.send(true);
        match self.task.take() {
            Some(task) => match task.await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(error = %e, "Telemetry poller task failed");
                    PollStats::default()
                }
            },
            None => PollStats::default(),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
