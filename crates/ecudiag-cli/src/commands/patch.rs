//! Patch command - partial configuration update

use anyhow::Result;
use ecudiag_client::DiagClient;

use crate::output::OutputContext;

/// Send a JSON patch to the device
pub async fn patch(client: &DiagClient, patch: &str, ctx: &OutputContext) -> Result<()> {
    client.apply_patch(patch).await?;
    ctx.success("Patch applied");
    Ok(())
}
