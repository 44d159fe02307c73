//! Typed diagnostic client
//!
//! Wraps the protocol engine with one method per diagnostic operation. Every
//! method is a single round-trip; failures are reported to the caller and the
//! connection stays usable for the next command.

use std::sync::Arc;
use std::time::Duration;

use ecudiag_core::codec::{decode_dtc_listing, decode_telemetry};
use ecudiag_core::wire::reply;
use ecudiag_core::{Command, DtcEntry, EcuConfig, TelemetrySample};
use ecudiag_link::LineTransport;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::{ClientError, Result};
use crate::protocol::{Expect, ProtocolClient};

/// Settle delays between writing a request and reading its reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimings {
    /// Ordinary diagnostic commands
    #[serde(default = "default_command_settle_ms")]
    pub command_settle_ms: u64,
    /// `GET_VER`, `START_FIRMWARE` and `END_FIRMWARE` during a firmware session
    #[serde(default = "default_handshake_settle_ms")]
    pub handshake_settle_ms: u64,
    /// Each `FIRMWARE:` line
    #[serde(default = "default_line_settle_ms")]
    pub line_settle_ms: u64,
}

fn default_command_settle_ms() -> u64 {
    100
}

fn default_handshake_settle_ms() -> u64 {
    500
}

fn default_line_settle_ms() -> u64 {
    100
}

impl Default for ClientTimings {
    fn default() -> Self {
        Self {
            command_settle_ms: default_command_settle_ms(),
            handshake_settle_ms: default_handshake_settle_ms(),
            line_settle_ms: default_line_settle_ms(),
        }
    }
}

impl ClientTimings {
    /// No settle delays; replies are read as soon as the request is written
    pub fn immediate() -> Self {
        Self {
            command_settle_ms: 0,
            handshake_settle_ms: 0,
            line_settle_ms: 0,
        }
    }

    pub fn command_settle(&self) -> Duration {
        Duration::from_millis(self.command_settle_ms)
    }

    pub fn handshake_settle(&self) -> Duration {
        Duration::from_millis(self.handshake_settle_ms)
    }

    pub fn line_settle(&self) -> Duration {
        Duration::from_millis(self.line_settle_ms)
    }
}

/// Diagnostic client for one connected device
#[derive(Clone)]
pub struct DiagClient {
    protocol: ProtocolClient,
    timings: ClientTimings,
}

impl DiagClient {
    /// Create a client with default settle delays
    pub fn new(transport: Arc<dyn LineTransport>) -> Self {
        Self::with_timings(transport, ClientTimings::default())
    }

    pub fn with_timings(transport: Arc<dyn LineTransport>, timings: ClientTimings) -> Self {
        Self {
            protocol: ProtocolClient::new(transport),
            timings,
        }
    }

    pub fn protocol(&self) -> &ProtocolClient {
        &self.protocol
    }

    pub fn timings(&self) -> &ClientTimings {
        &self.timings
    }

    async fn request(&self, command: Command, expect: Expect) -> Result<String> {
        self.protocol
            .send(&command, &expect, self.timings.command_settle())
            .await?
            .into_result(&command)
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    /// Read one telemetry sample (`GET_DATA`)
    #[instrument(skip(self))]
    pub async fn read_telemetry(&self) -> Result<TelemetrySample> {
        let line = self.request(Command::GetData, Expect::NotError).await?;
        Ok(TelemetrySample::now(decode_telemetry(&line)))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Set the maximum RPM; returns the device's acknowledgement
    #[instrument(skip(self))]
    pub async fn set_max_rpm(&self, value: u32) -> Result<String> {
        let reply = self
            .request(
                Command::set_max_rpm(value),
                Expect::prefix(format!("{}:", reply::MAX_RPM_SET)),
            )
            .await?;
        info!(%reply, "Max RPM updated");
        Ok(reply)
    }

    /// Set the fan trigger temperature
    #[instrument(skip(self))]
    pub async fn set_fan_temp(&self, value: i32) -> Result<String> {
        let reply = self
            .request(
                Command::set_fan_temp(value),
                Expect::prefix(format!("{}:", reply::FAN_TEMP_SET)),
            )
            .await?;
        info!(%reply, "Fan trigger temperature updated");
        Ok(reply)
    }

    /// Set the fuel warning level
    #[instrument(skip(self))]
    pub async fn set_fuel_warning(&self, value: u32) -> Result<String> {
        let reply = self
            .request(
                Command::set_fuel_warning(value),
                Expect::prefix(format!("{}:", reply::FUEL_WARNING_SET)),
            )
            .await?;
        info!(%reply, "Fuel warning level updated");
        Ok(reply)
    }

    /// Read the full device configuration (`GET_CONFIG`)
    #[instrument(skip(self))]
    pub async fn read_config(&self) -> Result<EcuConfig> {
        let line = self.request(Command::GetConfig, Expect::NotError).await?;
        serde_json::from_str(&line).map_err(|_| ClientError::Malformed {
            command: Command::GetConfig.verb().to_string(),
            raw: line,
        })
    }

    /// Send a partial configuration (`APPLY_PATCH`)
    ///
    /// The payload must be a JSON object; anything else is refused locally
    /// and never reaches the device.
    #[instrument(skip(self, patch))]
    pub async fn apply_patch(&self, patch: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(patch)
            .map_err(|e| ClientError::InvalidInput(format!("patch is not valid JSON: {}", e)))?;
        if !value.is_object() {
            return Err(ClientError::InvalidInput(
                "patch must be a JSON object".to_string(),
            ));
        }

        // Re-serialise so the payload is a single line
        let payload = value.to_string();
        self.request(
            Command::ApplyPatch(payload),
            Expect::exact(reply::PATCH_APPLIED),
        )
        .await?;
        info!("Patch applied");
        Ok(())
    }

    // =========================================================================
    // Fault codes
    // =========================================================================

    /// Read active DTCs; an empty list means the device answered `NO_DTC`
    #[instrument(skip(self))]
    pub async fn read_dtcs(&self) -> Result<Vec<DtcEntry>> {
        let line = self.request(Command::GetDtc, Expect::NotError).await?;
        Ok(decode_dtc_listing(&line))
    }

    /// Deactivate every DTC on the device
    #[instrument(skip(self))]
    pub async fn clear_dtcs(&self) -> Result<()> {
        self.request(Command::ClearDtc, Expect::exact(reply::DTC_CLEARED))
            .await?;
        info!("DTCs cleared");
        Ok(())
    }

    // =========================================================================
    // Identification
    // =========================================================================

    /// Read the firmware version string (`GET_VER`)
    #[instrument(skip(self))]
    pub async fn firmware_version(&self) -> Result<String> {
        self.request(Command::GetVersion, Expect::NotError).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_client;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_timings() {
        let timings = ClientTimings::default();
        assert_eq!(timings.command_settle(), Duration::from_millis(100));
        assert_eq!(timings.handshake_settle(), Duration::from_millis(500));
        assert_eq!(timings.line_settle(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_read_telemetry() {
        let (client, _) = mock_client();
        let sample = client.read_telemetry().await.unwrap();
        assert_eq!(sample.speed, 72);
        assert_eq!(sample.rpm, 2200);
        assert_eq!(sample.temperature, 87);
        assert_eq!(sample.fuel, 65);
    }

    #[tokio::test]
    async fn test_set_max_rpm_sends_value() {
        let (client, mock) = mock_client();
        mock.add_response("SET_MAX_RPM:7000", "MAX_RPM_SET:7000");

        let reply = client.set_max_rpm(7000).await.unwrap();
        assert_eq!(reply, "MAX_RPM_SET:7000");
        assert_eq!(mock.sent_lines(), vec!["SET_MAX_RPM:7000".to_string()]);
    }

    #[tokio::test]
    async fn test_set_fan_temp_rejected() {
        let (client, mock) = mock_client();
        mock.add_response("SET_FAN_TEMP:", "ERROR:Invalid temperature value");

        let err = client.set_fan_temp(90).await.unwrap_err();
        assert!(err.is_device_error());
        assert_eq!(
            err,
            ClientError::Rejected {
                command: "SET_FAN_TEMP".into(),
                reply: "ERROR:Invalid temperature value".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_read_config() {
        let (client, _) = mock_client();
        let config = client.read_config().await.unwrap();
        assert_eq!(config, EcuConfig::default());
    }

    #[tokio::test]
    async fn test_read_config_rejects_garbage() {
        let (client, mock) = mock_client();
        mock.add_response("GET_CONFIG", "max_rpm=6000");

        let err = client.read_config().await.unwrap_err();
        assert!(matches!(err, ClientError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_apply_patch_validates_locally() {
        let (client, mock) = mock_client();

        let err = client.apply_patch("{max_rpm: 7000").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));

        let err = client.apply_patch("[1, 2]").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));

        assert!(mock.sent_lines().is_empty());
    }

    #[tokio::test]
    async fn test_apply_patch_sends_single_line() {
        let (client, mock) = mock_client();

        client
            .apply_patch("{\n  \"max_rpm\": 7000\n}")
            .await
            .unwrap();
        assert_eq!(
            mock.sent_lines(),
            vec![r#"APPLY_PATCH:{"max_rpm":7000}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn test_read_dtcs() {
        let (client, mock) = mock_client();
        assert!(client.read_dtcs().await.unwrap().is_empty());

        mock.add_response(
            "GET_DTC",
            "[P0300] Random Misfire;;[P0420] Catalyst System Efficiency Below Threshold;;",
        );
        let dtcs = client.read_dtcs().await.unwrap();
        assert_eq!(dtcs.len(), 2);
        assert_eq!(dtcs[0].code, "P0300");
        assert_eq!(dtcs[1].description, "Catalyst System Efficiency Below Threshold");
    }

    #[tokio::test]
    async fn test_clear_dtcs_timeout() {
        let (client, mock) = mock_client();
        mock.add_silent("CLEAR_DTC");

        let err = client.clear_dtcs().await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Timeout {
                command: "CLEAR_DTC".into()
            }
        );

        // Connection still usable
        assert_eq!(client.firmware_version().await.unwrap(), "FW_1.0.3");
    }
}
