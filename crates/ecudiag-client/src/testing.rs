//! Test utilities for ecudiag-client
//!
//! - [`mock_client`] wires a client to a scripted [`MockLineTransport`]
//! - [`TestBench`] (feature `testing`) runs a real simulator on an in-memory
//!   line and hands back a connected client

use std::sync::Arc;
use std::time::Duration;

use ecudiag_link::transport::mock::MockLineTransport;

use crate::client::{ClientTimings, DiagClient};

/// Client with no settle delays talking to a default mock device
pub fn mock_client() -> (DiagClient, Arc<MockLineTransport>) {
    let mock = Arc::new(MockLineTransport::default());
    let client = DiagClient::with_timings(mock.clone(), ClientTimings::immediate());
    (client, mock)
}

/// Wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}

#[cfg(feature = "testing")]
pub use bench::{BenchOptions, TestBench};

#[cfg(feature = "testing")]
mod bench {
    use std::sync::Arc;
    use std::time::Duration;

    use ecu_sim::config::DeviceSettings;
    use ecu_sim::{
        EcuHandle, EcuParts, FaultInjector, NoFaults, SimulatedEcu, Simulator, SimulatorHandle,
    };
    use ecudiag_core::store::{MemoryConfigStore, MemoryDtcStore, MemoryFirmwareSink};
    use ecudiag_core::wire::DEFAULT_FIRMWARE_VERSION;
    use ecudiag_core::{default_dtcs, DtcRecord, EcuConfig};
    use ecudiag_link::transport::memory::MemoryLineTransport;
    use ecudiag_link::LineTransport;

    use crate::client::{ClientTimings, DiagClient};
    use crate::firmware::{FirmwareUploader, UploadConfig};

    /// Device setup for a [`TestBench`]
    pub struct BenchOptions {
        pub config: EcuConfig,
        pub dtcs: Vec<DtcRecord>,
        pub faults: Box<dyn FaultInjector>,
        pub firmware_version: String,
        /// `None` keeps the line quiet between requests
        pub telemetry_interval: Option<Duration>,
        pub end_processing_delay: Duration,
        /// Client-side read timeout
        pub read_timeout: Duration,
    }

    impl Default for BenchOptions {
        fn default() -> Self {
            Self {
                config: EcuConfig::default(),
                dtcs: default_dtcs(),
                faults: Box::new(NoFaults),
                firmware_version: DEFAULT_FIRMWARE_VERSION.to_string(),
                telemetry_interval: None,
                end_processing_delay: Duration::ZERO,
                read_timeout: Duration::from_millis(250),
            }
        }
    }

    impl BenchOptions {
        pub fn with_faults(mut self, faults: impl FaultInjector + 'static) -> Self {
            self.faults = Box::new(faults);
            self
        }
    }

    /// A simulator on an in-memory line that shuts down when dropped
    pub struct TestBench {
        pub client: DiagClient,
        pub config_store: MemoryConfigStore,
        pub dtc_store: MemoryDtcStore,
        pub firmware: MemoryFirmwareSink,
        host: Arc<dyn LineTransport>,
        simulator: Option<SimulatorHandle>,
    }

    impl TestBench {
        /// Start a stock device
        pub async fn start() -> Self {
            Self::start_with(BenchOptions::default()).await
        }

        pub async fn start_with(options: BenchOptions) -> Self {
            let (host, device) = MemoryLineTransport::pair(options.read_timeout);
            let host: Arc<dyn LineTransport> = Arc::new(host);

            let config_store = MemoryConfigStore::new(options.config);
            let dtc_store = MemoryDtcStore::new(options.dtcs);
            let firmware = MemoryFirmwareSink::new();

            let ecu = SimulatedEcu::new(EcuParts {
                config_store: Box::new(config_store.clone()),
                dtc_store: Box::new(dtc_store.clone()),
                firmware_sink: Box::new(firmware.clone()),
                faults: options.faults,
                firmware_version: options.firmware_version,
                end_processing_delay: options.end_processing_delay,
                telemetry_seed: Some(7),
            });

            let simulator = Simulator::new(Arc::new(device), &DeviceSettings::default())
                .with_poll_interval(Duration::from_millis(2))
                .with_telemetry_interval(options.telemetry_interval)
                .spawn(ecu);

            // Give the loops a moment to start
            tokio::time::sleep(Duration::from_millis(10)).await;

            let client = DiagClient::with_timings(host.clone(), ClientTimings::immediate());

            Self {
                client,
                config_store,
                dtc_store,
                firmware,
                host,
                simulator: Some(simulator),
            }
        }

        /// Get a reference to the client
        pub fn client(&self) -> &DiagClient {
            &self.client
        }

        /// Host end of the line, for raw writes and reads
        pub fn host(&self) -> &Arc<dyn LineTransport> {
            &self.host
        }

        /// Direct access to the device actor
        pub fn ecu(&self) -> Option<&EcuHandle> {
            self.simulator.as_ref().map(|sim| sim.ecu())
        }

        /// Uploader using this bench's client, with no settle delays
        pub fn uploader(&self, config: UploadConfig) -> FirmwareUploader {
            let config = config.with_timings(ClientTimings::immediate());
            FirmwareUploader::new(self.client.protocol().clone(), config)
        }

        /// Shutdown the simulator gracefully
        pub async fn shutdown(mut self) {
            if let Some(simulator) = self.simulator.take() {
                simulator.shutdown().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_for() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let ready = wait_for(
            move || async move { calls.fetch_add(1, Ordering::SeqCst) >= 2 },
            Duration::from_secs(1),
        )
        .await;
        assert!(ready);

        let never = wait_for(|| async { false }, Duration::from_millis(30)).await;
        assert!(!never);
    }

    #[tokio::test]
    async fn test_mock_client_is_immediate() {
        let (client, mock) = mock_client();
        assert_eq!(client.firmware_version().await.unwrap(), "FW_1.0.3");
        assert_eq!(mock.sent_lines(), vec!["GET_VER".to_string()]);
    }
}
