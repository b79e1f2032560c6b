//! Check command - device reachability

use espota_client::{DeviceTransport, ProbeOutcome, ReachabilityResult, UpdateSequencer};

use super::{EXIT_FAILURE, EXIT_OK};
use crate::output::OutputContext;

/// Check whether the device responds at all
pub async fn check<T: DeviceTransport>(sequencer: &UpdateSequencer<T>, ctx: &OutputContext) -> u8 {
    if report_reachability(sequencer, ctx).await {
        EXIT_OK
    } else {
        EXIT_FAILURE
    }
}

/// Probe the device and print the outcome; shared by `check` and `update`
pub async fn report_reachability<T: DeviceTransport>(
    sequencer: &UpdateSequencer<T>,
    ctx: &OutputContext,
) -> bool {
    probe_reachability(sequencer, ctx, true).await
}

/// Probe the device; failures always go to stderr, success only if `announce`
pub async fn probe_reachability<T: DeviceTransport>(
    sequencer: &UpdateSequencer<T>,
    ctx: &OutputContext,
    announce: bool,
) -> bool {
    let result = sequencer.check_reachable().await;
    if announce || !result.reachable {
        print_reachability(sequencer.endpoint().host(), &result, ctx);
    }
    result.reachable
}

fn print_reachability(host: &str, result: &ReachabilityResult, ctx: &OutputContext) {
    if result.without_root_handler() {
        ctx.success(&format!(
            "✓ Device at {} is reachable (no root endpoint)",
            host
        ));
        return;
    }
    if result.reachable {
        ctx.success(&format!("✓ Device at {} is reachable", host));
        return;
    }

    match &result.outcome {
        ProbeOutcome::Status(code) => {
            ctx.error(&format!("✗ Device responded with status code: {}", code))
        }
        ProbeOutcome::ConnectionFailed(_) => {
            ctx.error(&format!("✗ Cannot connect to device at {}", host))
        }
        ProbeOutcome::TimedOut => {
            ctx.error(&format!("✗ Connection timeout to device at {}", host))
        }
        ProbeOutcome::Failed(reason) => {
            ctx.error(&format!("✗ Error checking device status: {}", reason))
        }
    }
}
