//! Ping command - root path round-trip time

use espota_client::{DeviceTransport, ProbeOutcome, UpdateSequencer};

use super::{EXIT_FAILURE, EXIT_OK};
use crate::output::OutputContext;

/// Measure how fast the device answers; only HTTP 200 counts
pub async fn ping<T: DeviceTransport>(sequencer: &UpdateSequencer<T>, ctx: &OutputContext) -> u8 {
    match sequencer.ping().await {
        Ok(elapsed) => {
            ctx.success(&format!(
                "✓ Device responded in {:.2}ms",
                elapsed.as_secs_f64() * 1000.0
            ));
            EXIT_OK
        }
        Err(ProbeOutcome::Status(code)) => {
            ctx.error(&format!("✗ Device responded with error: {}", code));
            EXIT_FAILURE
        }
        Err(outcome) => {
            ctx.error(&format!("✗ Ping failed: {}", outcome));
            EXIT_FAILURE
        }
    }
}
