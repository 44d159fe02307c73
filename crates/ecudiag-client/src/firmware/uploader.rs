//! Firmware uploader

use ecudiag_core::wire::{reply, DEFAULT_FIRMWARE_VERSION};
use ecudiag_core::Command;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{FirmwareError, FirmwareImage, TransferSession, TransferState};
use crate::client::ClientTimings;
use crate::error::ClientError;
use crate::protocol::{Expect, ProtocolClient, Reply};

/// Uploader settings
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Version the image was built for
    pub expected_version: String,
    pub timings: ClientTimings,
    /// Attempts per image line before it is counted as failed
    pub max_attempts_per_line: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            expected_version: DEFAULT_FIRMWARE_VERSION.to_string(),
            timings: ClientTimings::default(),
            max_attempts_per_line: 2,
        }
    }
}

impl UploadConfig {
    pub fn with_expected_version(mut self, version: impl Into<String>) -> Self {
        self.expected_version = version.into();
        self
    }

    pub fn with_timings(mut self, timings: ClientTimings) -> Self {
        self.timings = timings;
        self
    }
}

/// Progress snapshot passed to the caller after each step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    pub state: TransferState,
    /// 1-based number of the line just handled, 0 before the first line
    pub line_number: usize,
    pub lines_total: usize,
    pub lines_acked: usize,
    pub lines_failed: usize,
}

/// Final tally of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub state: TransferState,
    pub device_version: Option<String>,
    pub lines_total: usize,
    pub lines_acked: usize,
    pub lines_failed: usize,
    /// 1-based numbers of lines the device never acknowledged
    pub failed_lines: Vec<usize>,
    /// Reply to `END_FIRMWARE`, if one arrived
    pub device_reply: Option<String>,
    pub abort_reason: Option<String>,
    pub image_digest: String,
}

impl TransferReport {
    fn new(image: &FirmwareImage) -> Self {
        Self {
            state: TransferState::Idle,
            device_version: None,
            lines_total: image.len(),
            lines_acked: 0,
            lines_failed: 0,
            failed_lines: Vec::new(),
            device_reply: None,
            abort_reason: None,
            image_digest: image.digest(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}/{} lines successfully sent",
            self.lines_acked, self.lines_total
        )
    }
}

/// Runs one firmware transfer over a protocol client
pub struct FirmwareUploader {
    protocol: ProtocolClient,
    config: UploadConfig,
}

impl FirmwareUploader {
    pub fn new(protocol: ProtocolClient, config: UploadConfig) -> Self {
        Self { protocol, config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Transfer `image`
    ///
    /// `confirm_mismatch(expected, actual)` is asked whether to continue when
    /// the device reports a different version; returning `false` aborts before
    /// `START_FIRMWARE` is sent. Transfer failures are reported in the
    /// returned [`TransferReport`], not as errors.
    #[instrument(skip(self, image, confirm_mismatch, progress_callback), fields(lines = image.len()))]
    pub async fn run<C, F>(
        &self,
        image: &FirmwareImage,
        mut confirm_mismatch: C,
        mut progress_callback: Option<F>,
    ) -> Result<TransferReport, FirmwareError>
    where
        C: FnMut(&str, &str) -> bool,
        F: FnMut(&TransferProgress),
    {
        if image.is_empty() {
            return Err(FirmwareError::EmptyImage);
        }

        let mut session = TransferSession::new();
        let mut report = TransferReport::new(image);
        info!(digest = %report.image_digest, "Starting firmware transfer");

        macro_rules! abort {
            ($($reason:tt)+) => {{
                let reason = format!($($reason)+);
                warn!(state = %session.state(), %reason, "Firmware transfer aborted");
                session.advance(TransferState::Aborted)?;
                report.state = session.state();
                report.abort_reason = Some(reason);
                return Ok(report);
            }};
        }

        let mut notify = |report: &TransferReport, line_number: usize| {
            if let Some(ref mut callback) = progress_callback {
                callback(&TransferProgress {
                    state: report.state,
                    line_number,
                    lines_total: report.lines_total,
                    lines_acked: report.lines_acked,
                    lines_failed: report.lines_failed,
                });
            }
        };

        // Version check
        let handshake = self.config.timings.handshake_settle();
        let version = match self
            .protocol
            .send(&Command::GetVersion, &Expect::NotError, handshake)
            .await
        {
            Ok(Reply::Ack(version)) => version,
            Ok(other) => abort!("Device did not report its version: {}", other),
            Err(e) => abort!("Failed to request version: {}", e),
        };
        report.device_version = Some(version.clone());

        if version != self.config.expected_version {
            warn!(expected = %self.config.expected_version, actual = %version, "Firmware version mismatch");
            if !confirm_mismatch(&self.config.expected_version, &version) {
                abort!(
                    "Version mismatch declined (expected {}, device reports {})",
                    self.config.expected_version,
                    version
                );
            }
        }
        session.advance(TransferState::VersionChecked)?;
        report.state = session.state();
        notify(&report, 0);

        // Enter reception mode
        match self
            .protocol
            .send(&Command::StartFirmware, &Expect::exact(reply::READY), handshake)
            .await
        {
            Ok(Reply::Ack(_)) => {}
            Ok(other) => abort!("Device refused firmware mode: {}", other),
            Err(e) => abort!("Failed to start firmware mode: {}", e),
        }
        session.advance(TransferState::Transferring)?;
        report.state = session.state();
        notify(&report, 0);

        // Stream lines
        let line_settle = self.config.timings.line_settle();
        let attempts = self.config.max_attempts_per_line.max(1);
        for (index, line) in image.lines().iter().enumerate() {
            let line_number = index + 1;
            let command = Command::Firmware(line.clone());
            let mut accepted = false;

            for attempt in 1..=attempts {
                match self
                    .protocol
                    .send(&command, &Expect::exact(reply::OK), line_settle)
                    .await
                {
                    Ok(Reply::Ack(_)) => {
                        accepted = true;
                        break;
                    }
                    Ok(other) => {
                        warn!(line_number, attempt, reply = %other, "Firmware line not acknowledged")
                    }
                    Err(ClientError::Transport(e)) if e.is_recoverable() => {
                        warn!(line_number, attempt, error = %e, "Firmware line not delivered")
                    }
                    Err(e) => abort!("Link failed at line {}: {}", line_number, e),
                }
            }

            if accepted {
                report.lines_acked += 1;
            } else {
                report.lines_failed += 1;
                report.failed_lines.push(line_number);
            }
            notify(&report, line_number);
        }

        // Finish
        match self
            .protocol
            .send(&Command::EndFirmware, &Expect::exact(reply::UPDATE_SUCCESS), handshake)
            .await
        {
            Ok(Reply::Ack(ack)) => report.device_reply = Some(ack),
            Ok(Reply::Nack(other)) => {
                report.device_reply = Some(other.clone());
                abort!("Device did not confirm the update: {}", other)
            }
            Ok(other) => abort!("Device did not confirm the update: {}", other),
            Err(e) => abort!("Failed to end transfer: {}", e),
        }
        session.advance(TransferState::Completed)?;
        report.state = session.state();
        notify(&report, report.lines_total);

        info!(
            lines_total = report.lines_total,
            lines_acked = report.lines_acked,
            lines_failed = report.lines_failed,
            "Firmware transfer completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use ecudiag_link::transport::mock::MockLineTransport;
    use ecudiag_link::{LineTransport, TransportError};
    use pretty_assertions::assert_eq;

    const IMAGE: &str = ":020000040000FA\n:10000000214601360121470136007EFE09D21901\n:00000001FF\n";

    fn uploader() -> (FirmwareUploader, Arc<MockLineTransport>) {
        let mock = Arc::new(MockLineTransport::default());
        let config = UploadConfig::default().with_timings(ClientTimings::immediate());
        (FirmwareUploader::new(ProtocolClient::new(mock.clone()), config), mock)
    }

    /// Mock link whose first write of a line starting with `prefix` fails
    struct FlakyWrite {
        inner: Arc<MockLineTransport>,
        prefix: &'static str,
        error: TransportError,
        tripped: AtomicBool,
    }

    impl FlakyWrite {
        fn new(prefix: &'static str, error: TransportError) -> (Arc<Self>, Arc<MockLineTransport>) {
            let inner = Arc::new(MockLineTransport::default());
            let link = Arc::new(Self {
                inner: inner.clone(),
                prefix,
                error,
                tripped: AtomicBool::new(false),
            });
            (link, inner)
        }
    }

    #[async_trait]
    impl LineTransport for FlakyWrite {
        async fn write_line(&self, line: &str) -> std::result::Result<(), TransportError> {
            if line.starts_with(self.prefix) && !self.tripped.swap(true, Ordering::SeqCst) {
                return Err(self.error.clone());
            }
            self.inner.write_line(line).await
        }

        async fn read_line(&self) -> std::result::Result<String, TransportError> {
            self.inner.read_line().await
        }

        async fn discard_input(&self) -> std::result::Result<(), TransportError> {
            self.inner.discard_input().await
        }

        async fn input_pending(&self) -> std::result::Result<bool, TransportError> {
            self.inner.input_pending().await
        }

        fn read_timeout(&self) -> Duration {
            self.inner.read_timeout()
        }

        fn name(&self) -> String {
            format!("flaky {}", self.inner.name())
        }
    }

    fn flaky_uploader(link: Arc<FlakyWrite>) -> FirmwareUploader {
        let config = UploadConfig::default().with_timings(ClientTimings::immediate());
        FirmwareUploader::new(ProtocolClient::new(link), config)
    }

    fn accept_all(_: &str, _: &str) -> bool {
        true
    }

    fn decline_all(_: &str, _: &str) -> bool {
        false
    }

    #[tokio::test]
    async fn test_clean_transfer() {
        let (uploader, mock) = uploader();
        let image = FirmwareImage::from_text(IMAGE);
        let mut seen = Vec::new();

        let report = uploader
            .run(&image, decline_all, Some(|p: &TransferProgress| seen.push(p.clone())))
            .await
            .unwrap();

        assert_eq!(report.state, TransferState::Completed);
        assert_eq!(report.summary(), "3/3 lines successfully sent");
        assert_eq!(report.device_reply.as_deref(), Some("UPDATE_SUCCESS"));
        assert_eq!(mock.sent_matching("FIRMWARE:"), 3);
        assert_eq!(seen.last().unwrap().state, TransferState::Completed);
        assert_eq!(
            seen.iter()
                .filter(|p| p.state == TransferState::Transferring && p.line_number > 0)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_single_failure_is_retried() {
        let (uploader, mock) = uploader();
        mock.add_response_sequence(
            "FIRMWARE::00000001FF",
            vec![Some("ERROR"), Some("OK")],
        );
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.lines_acked, 3);
        assert_eq!(report.lines_failed, 0);
        assert_eq!(mock.sent_matching("FIRMWARE::00000001FF"), 2);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure_and_is_retried() {
        let (uploader, mock) = uploader();
        mock.add_response_sequence("FIRMWARE::020000040000FA", vec![None, Some("OK")]);
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.lines_acked, 3);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_write_timeout_counts_as_failure_and_is_retried() {
        let (link, mock) = FlakyWrite::new("FIRMWARE:B", TransportError::WriteTimeout);
        let image = FirmwareImage::from_lines(["A", "B", "C"]);

        let report = flaky_uploader(link)
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Completed);
        assert_eq!(report.lines_acked, 3);
        assert_eq!(report.lines_failed, 0);
        assert_eq!(
            mock.sent_lines(),
            vec![
                "GET_VER".to_string(),
                "START_FIRMWARE".to_string(),
                "FIRMWARE:A".to_string(),
                "FIRMWARE:B".to_string(),
                "FIRMWARE:C".to_string(),
                "END_FIRMWARE".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_link_aborts_transfer() {
        let (link, mock) = FlakyWrite::new("FIRMWARE:B", TransportError::ConnectionClosed);
        let image = FirmwareImage::from_lines(["A", "B", "C"]);

        let report = flaky_uploader(link)
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Aborted);
        assert_eq!(report.lines_acked, 1);
        assert!(report.abort_reason.unwrap().contains("line 2"));
        assert_eq!(mock.sent_matching("FIRMWARE:"), 1);
        assert_eq!(mock.sent_matching("END_FIRMWARE"), 0);
    }

    #[tokio::test]
    async fn test_double_failure_marks_line_and_continues() {
        let (uploader, mock) = uploader();
        mock.add_response("FIRMWARE::10000000214601360121470136007EFE09D21901", "ERROR");
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Completed);
        assert_eq!(report.lines_acked, 2);
        assert_eq!(report.lines_failed, 1);
        assert_eq!(report.failed_lines, vec![2]);
        assert_eq!(mock.sent_matching("FIRMWARE::1000"), 2);
    }

    #[tokio::test]
    async fn test_mismatch_declined_aborts_before_start() {
        let (uploader, mock) = uploader();
        mock.add_response("GET_VER", "FW_0.9.0");
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Aborted);
        assert_eq!(report.device_version.as_deref(), Some("FW_0.9.0"));
        assert_eq!(mock.sent_lines(), vec!["GET_VER".to_string()]);
    }

    #[tokio::test]
    async fn test_mismatch_accepted_continues() {
        let (uploader, mock) = uploader();
        mock.add_response("GET_VER", "FW_0.9.0");
        let image = FirmwareImage::from_text(IMAGE);

        let mut asked = None;
        let report = uploader
            .run(
                &image,
                |expected: &str, actual: &str| {
                    asked = Some((expected.to_string(), actual.to_string()));
                    true
                },
                None::<fn(&TransferProgress)>,
            )
            .await
            .unwrap();
        assert!(report.is_success());
        assert_eq!(asked, Some(("FW_1.0.3".to_string(), "FW_0.9.0".to_string())));
    }

    #[tokio::test]
    async fn test_not_ready_aborts() {
        let (uploader, mock) = uploader();
        mock.add_response("START_FIRMWARE", "ERROR");
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, accept_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Aborted);
        assert_eq!(mock.sent_matching("FIRMWARE:"), 0);
    }

    #[tokio::test]
    async fn test_end_timeout_aborts_with_tally() {
        let (uploader, mock) = uploader();
        mock.add_silent("END_FIRMWARE");
        let image = FirmwareImage::from_text(IMAGE);

        let report = uploader
            .run(&image, accept_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();
        assert_eq!(report.state, TransferState::Aborted);
        assert_eq!(report.lines_acked, 3);
        assert!(report.device_reply.is_none());
    }

    #[tokio::test]
    async fn test_end_waits_for_handshake_settle() {
        let mock = Arc::new(MockLineTransport::default());
        let timings = ClientTimings {
            command_settle_ms: 0,
            handshake_settle_ms: 60,
            line_settle_ms: 0,
        };
        let uploader = FirmwareUploader::new(
            ProtocolClient::new(mock.clone()),
            UploadConfig::default().with_timings(timings),
        );

        let started = tokio::time::Instant::now();
        let report = uploader
            .run(&FirmwareImage::from_text(IMAGE), decline_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap();

        // GET_VER, START_FIRMWARE and END_FIRMWARE each settle
        assert!(report.is_success());
        assert!(started.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let (uploader, mock) = uploader();
        let image = FirmwareImage::from_text("\n\n");

        let err = uploader
            .run(&image, accept_all, None::<fn(&TransferProgress)>)
            .await
            .unwrap_err();
        assert!(matches!(err, FirmwareError::EmptyImage));
        assert!(mock.sent_lines().is_empty());
    }
}
