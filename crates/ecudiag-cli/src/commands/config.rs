//! Config command - read device thresholds

use anyhow::Result;
use ecudiag_client::DiagClient;

use crate::output::{ConfigRow, OutputContext, OutputFormat};

/// Show the device configuration
pub async fn config(client: &DiagClient, ctx: &OutputContext) -> Result<()> {
    let config = client.read_config().await?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let rows = vec![
        ConfigRow {
            setting: "max_rpm".to_string(),
            value: config.max_rpm.to_string(),
        },
        ConfigRow {
            setting: "fan_trigger_temp".to_string(),
            value: config.fan_trigger_temp.to_string(),
        },
        ConfigRow {
            setting: "fuel_warning_level".to_string(),
            value: config.fuel_warning_level.to_string(),
        },
    ];

    ctx.print(&rows);
    Ok(())
}
