//! Flash command - firmware update

use std::path::Path;

use anyhow::{Context, Result};
use ecudiag_client::{
    DiagClient, FirmwareImage, FirmwareUploader, TransferProgress, TransferState, UploadConfig,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::{OutputContext, OutputFormat};

/// Flash a firmware image to the device
pub async fn flash(
    client: &DiagClient,
    file_path: &Path,
    expected_version: &str,
    force: bool,
    ctx: &OutputContext,
) -> Result<()> {
    ctx.info(&format!("Reading firmware from {}...", file_path.display()));
    let image = FirmwareImage::from_path(file_path)
        .with_context(|| format!("Failed to read firmware file: {}", file_path.display()))?;

    ctx.info(&format!(
        "Firmware: {} lines, sha256 {}",
        image.len(),
        image.digest()
    ));

    let uploader = FirmwareUploader::new(
        client.protocol().clone(),
        UploadConfig::default()
            .with_expected_version(expected_version)
            .with_timings(*client.timings()),
    );

    let pb = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(image.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    pb.set_message("Checking version...");

    let confirm_mismatch = |expected: &str, reported: &str| {
        if force {
            return true;
        }
        pb.suspend(|| {
            ctx.warn(&format!(
                "Device reports {}, expected {}",
                reported, expected
            ));
            super::confirm("Continue with the update anyway?").unwrap_or(false)
        })
    };

    let progress_callback = |progress: &TransferProgress| match progress.state {
        TransferState::VersionChecked => pb.set_message("Starting transfer..."),
        TransferState::Transferring => {
            pb.set_position(progress.line_number as u64);
            if progress.lines_failed > 0 {
                pb.set_message(format!("Sending... ({} failed)", progress.lines_failed));
            } else {
                pb.set_message("Sending...");
            }
        }
        TransferState::Completed => pb.set_message("Device processing..."),
        TransferState::Idle | TransferState::Aborted => {}
    };

    let report = uploader
        .run(&image, confirm_mismatch, Some(progress_callback))
        .await
        .context("Firmware transfer failed")?;

    if report.is_success() {
        pb.finish_with_message("Complete!");
    } else {
        pb.abandon_with_message("Aborted");
    }

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        ctx.info(&report.summary());
        if !report.failed_lines.is_empty() {
            let lines: Vec<String> = report.failed_lines.iter().map(|n| n.to_string()).collect();
            ctx.warn(&format!("Lines not acknowledged: {}", lines.join(", ")));
        }
    }

    if !report.is_success() {
        return Err(anyhow::anyhow!(
            "Firmware update failed: {}",
            report
                .abort_reason
                .unwrap_or_else(|| "Unknown error".to_string())
        ));
    }

    ctx.success(&format!(
        "Firmware update completed: {}",
        report.device_reply.as_deref().unwrap_or("UPDATE_SUCCESS")
    ));
    Ok(())
}
