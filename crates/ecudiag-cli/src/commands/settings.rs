//! Threshold commands - set-max-rpm, set-fan-temp, set-fuel-warning

use anyhow::Result;
use ecudiag_client::DiagClient;

use crate::output::OutputContext;

/// Set the maximum engine RPM
pub async fn set_max_rpm(client: &DiagClient, value: u32, ctx: &OutputContext) -> Result<()> {
    let reply = client.set_max_rpm(value).await?;
    ctx.success(&format!("Max RPM set to {} ({})", value, reply));
    Ok(())
}

/// Set the fan trigger temperature
pub async fn set_fan_temp(client: &DiagClient, value: i32, ctx: &OutputContext) -> Result<()> {
    let reply = client.set_fan_temp(value).await?;
    ctx.success(&format!(
        "Fan trigger temperature set to {} °C ({})",
        value, reply
    ));
    Ok(())
}

/// Set the fuel warning level
pub async fn set_fuel_warning(
    client: &DiagClient,
    value: u32,
    ctx: &OutputContext,
) -> Result<()> {
    let reply = client.set_fuel_warning(value).await?;
    ctx.success(&format!("Fuel warning level set to {} % ({})", value, reply));
    Ok(())
}
