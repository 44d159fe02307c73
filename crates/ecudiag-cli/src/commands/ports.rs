//! Ports command - serial port enumeration

use anyhow::{Context, Result};
use ecudiag_link::available_ports;

use crate::output::{OutputContext, PortRow};

/// List serial ports present on this machine
pub fn ports(ctx: &OutputContext) -> Result<()> {
    let ports = available_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        ctx.warn("No serial ports found");
        return Ok(());
    }

    let rows: Vec<PortRow> = ports
        .into_iter()
        .map(|p| PortRow {
            port: p.name,
            description: p.description,
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
