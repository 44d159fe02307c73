//! In-memory line transport
//!
//! [`MemoryLineTransport::pair`] returns two connected ends, one for the
//! operator side and one for a simulated device. Each end sees the lines
//! written by the other.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::{LineTransport, TransportError};

struct Inbox {
    rx: mpsc::UnboundedReceiver<String>,
    stash: VecDeque<String>,
}

impl Inbox {
    /// Move everything already delivered into the stash
    fn drain_ready(&mut self) {
        while let Ok(line) = self.rx.try_recv() {
            self.stash.push_back(line);
        }
    }
}

/// One end of an in-process line link
pub struct MemoryLineTransport {
    name: String,
    tx: mpsc::UnboundedSender<String>,
    inbox: Mutex<Inbox>,
    read_timeout: Duration,
    connected: Arc<AtomicBool>,
}

impl MemoryLineTransport {
    /// Create a connected pair `(host, device)`
    pub fn pair(read_timeout: Duration) -> (Self, Self) {
        let (host_tx, device_rx) = mpsc::unbounded_channel();
        let (device_tx, host_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        let host = Self {
            name: "memory:host".to_string(),
            tx: host_tx,
            inbox: Mutex::new(Inbox {
                rx: host_rx,
                stash: VecDeque::new(),
            }),
            read_timeout,
            connected: connected.clone(),
        };
        let device = Self {
            name: "memory:device".to_string(),
            tx: device_tx,
            inbox: Mutex::new(Inbox {
                rx: device_rx,
                stash: VecDeque::new(),
            }),
            read_timeout,
            connected,
        };
        (host, device)
    }

    /// Change the read timeout of this end
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Simulate unplugging the cable; affects both ends
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

#[async_trait]
impl LineTransport for MemoryLineTransport {
    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        trace!(end = %self.name, line, "write");
        self.tx
            .send(line.to_string())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn read_line(&self) -> Result<String, TransportError> {
        self.ensure_connected()?;
        let mut inbox = self.inbox.lock().await;
        if let Some(line) = inbox.stash.pop_front() {
            return Ok(line);
        }

        match tokio::time::timeout(self.read_timeout, inbox.rx.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(TransportError::ConnectionClosed),
            Err(_) => Err(TransportError::ReadTimeout),
        }
    }

    async fn discard_input(&self) -> Result<(), TransportError> {
        let mut inbox = self.inbox.lock().await;
        inbox.drain_ready();
        let dropped = inbox.stash.len();
        inbox.stash.clear();
        if dropped > 0 {
            trace!(end = %self.name, dropped, "discarded stale input");
        }
        Ok(())
    }

    async fn input_pending(&self) -> Result<bool, TransportError> {
        self.ensure_connected()?;
        let mut inbox = self.inbox.lock().await;
        inbox.drain_ready();
        Ok(!inbox.stash.is_empty())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_delivers_in_order() {
        let (host, device) = MemoryLineTransport::pair(Duration::from_millis(50));

        host.write_line("GET_VER").await.unwrap();
        host.write_line("GET_DTC").await.unwrap();

        assert!(device.input_pending().await.unwrap());
        assert_eq!(device.read_line().await.unwrap(), "GET_VER");
        assert_eq!(device.read_line().await.unwrap(), "GET_DTC");
        assert!(!device.input_pending().await.unwrap());
    }

    #[tokio::test]
    async fn test_read_times_out_on_silence() {
        let (host, _device) = MemoryLineTransport::pair(Duration::from_millis(20));
        assert_eq!(host.read_line().await, Err(TransportError::ReadTimeout));
    }

    #[tokio::test]
    async fn test_discard_drops_stale_lines() {
        let (host, device) = MemoryLineTransport::pair(Duration::from_millis(20));

        device.write_line("SPEED:1,RPM:900,TEMP:80,FUEL:50").await.unwrap();
        assert!(host.input_pending().await.unwrap());

        host.discard_input().await.unwrap();
        assert!(!host.input_pending().await.unwrap());

        device.write_line("FW_1.0.3").await.unwrap();
        assert_eq!(host.read_line().await.unwrap(), "FW_1.0.3");
    }

    #[tokio::test]
    async fn test_disconnect_affects_both_ends() {
        let (host, device) = MemoryLineTransport::pair(Duration::from_millis(20));
        device.set_connected(false);

        assert_eq!(
            host.write_line("GET_VER").await,
            Err(TransportError::ConnectionClosed)
        );
    }

    #[tokio::test]
    async fn test_dropped_peer_closes_link() {
        let (host, device) = MemoryLineTransport::pair(Duration::from_millis(20));
        drop(device);

        assert_eq!(host.read_line().await, Err(TransportError::ConnectionClosed));
        assert_eq!(
            host.write_line("GET_VER").await,
            Err(TransportError::ConnectionClosed)
        );
    }
}
