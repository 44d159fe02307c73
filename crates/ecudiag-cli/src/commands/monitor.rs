//! Monitor command - periodic telemetry polling

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ecudiag_client::{DiagClient, PollEvent, TelemetryPoller};
use ecudiag_core::store::{CsvTelemetryLog, TELEMETRY_CSV_HEADER};

use crate::output::{OutputContext, OutputFormat};

/// Poll telemetry until Ctrl+C (or `count` polls), logging every sample
pub async fn monitor(
    client: &DiagClient,
    log: &Path,
    interval: Duration,
    count: Option<u64>,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!(
        "Polling every {} ms, logging to {}",
        interval.as_millis(),
        log.display()
    ));
    ctx.info("Press Ctrl+C to stop");

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if ctx.format == OutputFormat::Csv {
        println!("{}", TELEMETRY_CSV_HEADER);
    }

    let mut poller = TelemetryPoller::new(client.clone())
        .with_interval(interval)
        .spawn(CsvTelemetryLog::new(log));

    let mut seen = 0u64;
    while running.load(Ordering::SeqCst) {
        tokio::select! {
            event = poller.next_event() => {
                match event {
                    Some(PollEvent::Sample(sample)) => ctx.print_sample(&sample),
                    Some(PollEvent::Failed(e)) => ctx.warn(&format!("Poll failed: {}", e)),
                    None => break,
                }
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                // Check running flag periodically
            }
        }
    }

    ctx.info("\nStopping monitor...");
    let stats = poller.stop().await;
    ctx.success(&format!(
        "{} polls, {} samples, {} failed",
        stats.polls, stats.samples, stats.failures
    ));
    if stats.log_errors > 0 {
        ctx.warn(&format!(
            "{} samples could not be written to {}",
            stats.log_errors,
            log.display()
        ));
    }

    Ok(())
}
