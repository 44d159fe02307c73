//! Export command - timestamped copy of the telemetry log

use std::path::Path;

use anyhow::{Context, Result};
use ecudiag_core::store::CsvTelemetryLog;

use crate::output::OutputContext;

/// Copy the telemetry log into `dir` and summarise it
pub fn export_log(log: &Path, dir: &Path, ctx: &OutputContext) -> Result<()> {
    let export = CsvTelemetryLog::new(log)
        .export(dir)
        .with_context(|| format!("Failed to export {}", log.display()))?;

    ctx.print_kv(&[
        ("Exported to", export.path.display().to_string()),
        ("Entries", export.entries.to_string()),
        (
            "First entry",
            export.first_timestamp.unwrap_or_else(|| "-".to_string()),
        ),
        (
            "Last entry",
            export.last_timestamp.unwrap_or_else(|| "-".to_string()),
        ),
    ]);
    Ok(())
}
