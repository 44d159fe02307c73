//! End-to-end tests for diagnostic commands
//!
//! Run with: cargo test -p ecudiag-tests --test diagnostics_e2e

use std::time::Duration;

use ecudiag_client::testing::{wait_for, BenchOptions, TestBench};
use ecudiag_client::ClientError;
use ecudiag_core::wire::reply;
use ecudiag_core::{DtcRecord, EcuConfig};
use pretty_assertions::assert_eq;

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn test_set_then_read_config() {
    let bench = TestBench::start().await;
    let client = bench.client();

    assert_eq!(client.set_max_rpm(7000).await.unwrap(), "MAX_RPM_SET:7000");
    assert_eq!(client.set_fan_temp(-5).await.unwrap(), "FAN_TEMP_SET:-5");
    assert_eq!(
        client.set_fuel_warning(20).await.unwrap(),
        "FUEL_WARNING_SET:20"
    );

    let expected = EcuConfig {
        max_rpm: 7000,
        fan_trigger_temp: -5,
        fuel_warning_level: 20,
    };
    assert_eq!(client.read_config().await.unwrap(), expected);
    assert_eq!(bench.config_store.saved(), expected);

    bench.shutdown().await;
}

#[tokio::test]
async fn test_patch_overwrites_positive_fields_only() {
    let bench = TestBench::start().await;
    let client = bench.client();

    client
        .apply_patch(r#"{"max_rpm": 7200, "fan_trigger_temp": 0, "fuel_warning_level": -3}"#)
        .await
        .unwrap();

    let config = client.read_config().await.unwrap();
    assert_eq!(
        config,
        EcuConfig {
            max_rpm: 7200,
            ..EcuConfig::default()
        }
    );

    bench.shutdown().await;
}

#[tokio::test]
async fn test_invalid_patch_never_reaches_device() {
    let bench = TestBench::start().await;
    let client = bench.client();

    let err = client.apply_patch("{\"max_rpm\": ").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidInput(_)));

    assert_eq!(client.read_config().await.unwrap(), EcuConfig::default());
    assert_eq!(bench.config_store.saved(), EcuConfig::default());

    bench.shutdown().await;
}

#[tokio::test]
async fn test_failed_save_leaves_config_unchanged() {
    let bench = TestBench::start().await;
    let client = bench.client();

    bench.config_store.set_fail_saves(true);
    let err = client.set_max_rpm(9000).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Rejected {
            command: "SET_MAX_RPM".into(),
            reply: reply::INTERNAL_ERROR.into(),
        }
    );
    assert_eq!(client.read_config().await.unwrap().max_rpm, 6000);

    bench.config_store.set_fail_saves(false);
    client.set_max_rpm(9000).await.unwrap();
    assert_eq!(client.read_config().await.unwrap().max_rpm, 9000);

    bench.shutdown().await;
}

#[tokio::test]
async fn test_timed_out_set_does_not_poison_next_read() {
    let bench = TestBench::start_with(BenchOptions {
        read_timeout: Duration::from_millis(100),
        end_processing_delay: Duration::from_millis(400),
        ..Default::default()
    })
    .await;
    let client = bench.client();

    // Keep the device busy confirming a firmware session
    let host = bench.host();
    host.write_line("START_FIRMWARE").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::READY);
    host.write_line("END_FIRMWARE").await.unwrap();

    let err = client.set_max_rpm(7000).await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Timeout {
            command: "SET_MAX_RPM".into(),
        }
    );

    // The device still handles the request once it is free
    let config_store = bench.config_store.clone();
    let applied = wait_for(
        || {
            let config_store = config_store.clone();
            async move { config_store.saved().max_rpm == 7000 }
        },
        Duration::from_secs(2),
    )
    .await;
    assert!(applied);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Late UPDATE_SUCCESS and MAX_RPM_SET lines are discarded
    let config = client.read_config().await.unwrap();
    assert_eq!(config.max_rpm, 7000);
    assert_eq!(config, bench.config_store.saved());
    assert_eq!(config, bench.ecu().unwrap().snapshot().await.unwrap().config);

    bench.shutdown().await;
}

#[tokio::test]
async fn test_bad_values_rejected_by_device() {
    let bench = TestBench::start().await;
    let host = bench.host();

    host.write_line("SET_MAX_RPM:fast").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::INVALID_RPM);

    host.write_line("SET_FAN_TEMP:").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::INVALID_TEMPERATURE);

    host.write_line("SET_FUEL_WARNING:-1").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::INVALID_FUEL_LEVEL);

    host.write_line("REBOOT").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::UNKNOWN_VERB);

    assert_eq!(
        bench.client().read_config().await.unwrap(),
        EcuConfig::default()
    );

    bench.shutdown().await;
}

// =============================================================================
// Fault codes
// =============================================================================

#[tokio::test]
async fn test_read_and_clear_dtcs() {
    let bench = TestBench::start().await;
    let client = bench.client();

    let dtcs = client.read_dtcs().await.unwrap();
    let codes: Vec<&str> = dtcs.iter().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, vec!["P0300", "P0420"]);
    assert_eq!(dtcs[0].description, "Random Misfire");

    client.clear_dtcs().await.unwrap();
    assert!(client.read_dtcs().await.unwrap().is_empty());

    // Records are kept, only deactivated
    let saved = bench.dtc_store.saved();
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|r| !r.active));

    bench.shutdown().await;
}

#[tokio::test]
async fn test_inactive_records_not_listed() {
    let mut inactive = DtcRecord::new("P0171", "System Too Lean");
    inactive.active = false;

    let bench = TestBench::start_with(BenchOptions {
        dtcs: vec![inactive, DtcRecord::new("P0128", "Coolant Thermostat")],
        ..Default::default()
    })
    .await;

    let dtcs = bench.client().read_dtcs().await.unwrap();
    assert_eq!(dtcs.len(), 1);
    assert_eq!(dtcs[0].code, "P0128");

    bench.shutdown().await;
}

// =============================================================================
// Telemetry and identification
// =============================================================================

#[tokio::test]
async fn test_read_telemetry_within_ranges() {
    let bench = TestBench::start().await;
    let client = bench.client();

    client.set_max_rpm(3000).await.unwrap();
    for _ in 0..5 {
        let sample = client.read_telemetry().await.unwrap();
        assert!((0..=120).contains(&sample.speed));
        assert!((800..=3000).contains(&sample.rpm));
        assert!((70..=110).contains(&sample.temperature));
        assert!((0..=100).contains(&sample.fuel));
    }

    bench.shutdown().await;
}

#[tokio::test]
async fn test_firmware_version() {
    let bench = TestBench::start_with(BenchOptions {
        firmware_version: "FW_2.1.0".to_string(),
        ..Default::default()
    })
    .await;

    assert_eq!(bench.client().firmware_version().await.unwrap(), "FW_2.1.0");

    bench.shutdown().await;
}

#[tokio::test]
async fn test_commands_refused_during_firmware_reception() {
    let bench = TestBench::start().await;
    let client = bench.client();

    let host = bench.host();
    host.write_line("START_FIRMWARE").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::READY);

    let err = client.read_config().await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Rejected {
            command: "GET_CONFIG".into(),
            reply: reply::UNKNOWN_COMMAND.into(),
        }
    );

    let snapshot = bench.ecu().unwrap().snapshot().await.unwrap();
    assert!(snapshot.receiving_firmware);

    host.write_line("END_FIRMWARE").await.unwrap();
    assert_eq!(host.read_line().await.unwrap(), reply::UPDATE_SUCCESS);

    // Back to normal operation
    assert_eq!(client.read_config().await.unwrap(), EcuConfig::default());

    bench.shutdown().await;
}
