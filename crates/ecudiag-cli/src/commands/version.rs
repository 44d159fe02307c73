//! Version command - device firmware identification

use anyhow::Result;
use ecudiag_client::DiagClient;

use crate::output::OutputContext;

pub async fn version(client: &DiagClient, ctx: &OutputContext) -> Result<()> {
    let version = client.firmware_version().await?;
    ctx.print_kv(&[("Firmware", version)]);
    Ok(())
}
