//! Update command - upload firmware and wait for the device to reboot

use std::path::Path;
use std::time::Duration;

use espota_client::{DeviceTransport, UpdatePhase, UpdateResult, UpdateSequencer};
use indicatif::{ProgressBar, ProgressStyle};

use super::check::report_reachability;
use super::EXIT_FAILURE;
use crate::output::OutputContext;

/// Run the full OTA sequence against a reachable device
pub async fn update<T: DeviceTransport>(
    sequencer: &UpdateSequencer<T>,
    firmware: &Path,
    ctx: &OutputContext,
) -> u8 {
    if !report_reachability(sequencer, ctx).await {
        ctx.error("Cannot reach device. Aborting OTA update.");
        return EXIT_FAILURE;
    }

    let mut progress = UpdateProgress::new(ctx);
    let result = run_upload(sequencer, firmware, &mut progress).await;

    report_result(&result, firmware, ctx);
    result.exit_code()
}

async fn run_upload<T: DeviceTransport>(
    sequencer: &UpdateSequencer<T>,
    firmware: &Path,
    progress: &mut UpdateProgress<'_>,
) -> UpdateResult {
    let result = sequencer
        .upload_with_progress(firmware, Some(|phase: &UpdatePhase| progress.on_phase(phase)))
        .await;
    progress.clear();
    result
}

/// Console rendering of [`UpdatePhase`] events
struct UpdateProgress<'a> {
    ctx: &'a OutputContext,
    bar: Option<ProgressBar>,
    /// Set once the firmware file passed local checks and the upload began
    started: bool,
}

impl<'a> UpdateProgress<'a> {
    fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            bar: None,
            started: false,
        }
    }

    fn on_phase(&mut self, phase: &UpdatePhase) {
        match phase {
            UpdatePhase::Uploading { path, size } => {
                self.started = true;
                self.ctx.info("Starting OTA update...");
                self.ctx.info(&format!("Firmware file: {}", path.display()));
                self.ctx.info(&format!("File size: {} bytes", size));

                let spinner = Self::bar(self.ctx, None);
                spinner.set_message("Uploading firmware...");
                spinner.enable_steady_tick(Duration::from_millis(100));
                self.bar = Some(spinner);
            }
            UpdatePhase::WaitingForReboot { .. } => {
                self.clear();
                self.ctx.success("✓ OTA update completed successfully!");
                self.ctx.info("Device should restart automatically...");
                self.ctx.info("Waiting for device to restart...");
            }
            UpdatePhase::Polling {
                attempt,
                max_attempts,
            } => {
                let ctx = self.ctx;
                let bar = self
                    .bar
                    .get_or_insert_with(|| Self::bar(ctx, Some(u64::from(*max_attempts))));
                bar.set_position(u64::from(*attempt));
                bar.set_message(format!("Waiting for device... ({}/{})", attempt, max_attempts));
            }
            UpdatePhase::Complete => self.clear(),
        }
    }

    fn bar(ctx: &OutputContext, len: Option<u64>) -> ProgressBar {
        if ctx.quiet {
            return ProgressBar::hidden();
        }
        match len {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=>-"),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner
            }
        }
    }

    fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn report_result(result: &UpdateResult, firmware: &Path, ctx: &OutputContext) {
    match result {
        UpdateResult::Succeeded => ctx.success("✓ Device is back online!"),
        UpdateResult::SucceededButDeviceUnresponsive => {
            ctx.warn("⚠ Device may have restarted but is not responding")
        }
        UpdateResult::FailedHttpStatus { status, body } => {
            ctx.error(&format!("✗ OTA update failed with status code: {}", status));
            ctx.error(&format!("Response: {}", body));
        }
        UpdateResult::FailedConnectionLost => {
            ctx.warn("✗ Connection lost during OTA update");
            ctx.info("This may be normal if the device is restarting...");
        }
        UpdateResult::FailedTimeout => ctx.error("✗ OTA update timeout"),
        UpdateResult::FailedLocal(reason) => {
            ctx.error(&format!("✗ Firmware {}: {}", reason, firmware.display()))
        }
        UpdateResult::FailedTransport(reason) => {
            ctx.error(&format!("✗ Error during OTA update: {}", reason))
        }
    }
}
