//! Info command - show device metadata

use espota_client::{DeviceTransport, UpdateSequencer};

use super::check::probe_reachability;
use super::EXIT_OK;
use crate::output::{OutputContext, OutputFormat};

/// Show the device's `/info` data
///
/// A missing info endpoint is not an error, and neither is an unreachable
/// device: both exit 0.
pub async fn info<T: DeviceTransport>(sequencer: &UpdateSequencer<T>, ctx: &OutputContext) -> u8 {
    if !probe_reachability(sequencer, ctx, announces_reachability(ctx.format)).await {
        return EXIT_OK;
    }

    match sequencer.fetch_info().await {
        Some(info) => {
            if ctx.format == OutputFormat::Text {
                ctx.info("Device Information:");
            }
            let pairs: Vec<(String, String)> = info
                .entries()
                .map(|(key, value)| (key.to_string(), value))
                .collect();
            ctx.print_kv(&pairs, &info);
        }
        None => ctx.warn("Device info endpoint not available"),
    }

    EXIT_OK
}

/// Table and JSON output must stay machine readable on stdout
fn announces_reachability(format: OutputFormat) -> bool {
    format == OutputFormat::Text
}
