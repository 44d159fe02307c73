//! DTC commands - list and clear fault codes

use anyhow::Result;
use ecudiag_client::DiagClient;

use crate::output::{DtcRow, OutputContext, OutputFormat};

/// List active DTCs
pub async fn dtc(client: &DiagClient, ctx: &OutputContext) -> Result<()> {
    let dtcs = client.read_dtcs().await?;

    if dtcs.is_empty() && ctx.format == OutputFormat::Table {
        ctx.success("No active DTCs");
        return Ok(());
    }

    let rows: Vec<DtcRow> = dtcs
        .into_iter()
        .map(|d| DtcRow {
            code: d.code,
            description: d.description,
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}

/// Clear all DTCs, asking first unless `yes` is set
pub async fn clear_dtc(client: &DiagClient, yes: bool, ctx: &OutputContext) -> Result<()> {
    if !yes && !super::confirm("Clear all diagnostic trouble codes?")? {
        ctx.info("Cancelled");
        return Ok(());
    }

    client.clear_dtcs().await?;
    ctx.success("All DTCs cleared");
    Ok(())
}
