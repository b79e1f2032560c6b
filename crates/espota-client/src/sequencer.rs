//! OTA update sequencing: reachability probes, firmware upload and reboot recovery

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::SequencerConfig;
use crate::error::Result;
use crate::retry;
use crate::transport::{DeviceTransport, FirmwareImage, HttpTransport, TransportError};
use crate::types::*;

impl From<TransportError> for ProbeOutcome {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connect(reason) | TransportError::ConnectionLost(reason) => {
                Self::ConnectionFailed(reason)
            }
            TransportError::Timeout => Self::TimedOut,
            TransportError::Io(reason) | TransportError::Other(reason) => Self::Failed(reason),
        }
    }
}

/// Orchestrates a firmware push and the device's return to service
///
/// Every network operation converts transport failures into a typed outcome;
/// nothing here returns an error once the sequencer is constructed.
///
/// Upload state machine:
/// ```text
/// START -> file missing        -> FailedLocal
/// START -> POST -> 200         -> grace sleep -> poll (<= max_attempts)
///                                  -> reachable -> Succeeded
///                                  -> exhausted -> SucceededButDeviceUnresponsive
///               -> other status -> FailedHttpStatus
///               -> conn lost    -> FailedConnectionLost (tentative success)
///               -> timeout      -> FailedTimeout
/// ```
#[derive(Debug, Clone)]
pub struct UpdateSequencer<T = HttpTransport> {
    endpoint: DeviceEndpoint,
    config: SequencerConfig,
    transport: T,
    root_url: Url,
    info_url: Url,
    upload_url: Url,
}

impl UpdateSequencer<HttpTransport> {
    /// Create a sequencer with the default policy
    pub fn new(endpoint: DeviceEndpoint) -> Result<Self> {
        Self::with_config(endpoint, SequencerConfig::default())
    }

    /// Create a sequencer with a custom configuration
    pub fn with_config(endpoint: DeviceEndpoint, config: SequencerConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeouts.connect())?;
        Self::with_transport(endpoint, config, transport)
    }
}

impl<T: DeviceTransport> UpdateSequencer<T> {
    /// Create a sequencer on top of an arbitrary transport
    pub fn with_transport(
        endpoint: DeviceEndpoint,
        config: SequencerConfig,
        transport: T,
    ) -> Result<Self> {
        let root_url = endpoint.resolve(&config.endpoints.root)?;
        let info_url = endpoint.resolve(&config.endpoints.info)?;
        let upload_url = endpoint.resolve(&config.endpoints.upload)?;

        info!("OTA sequencer created for {}", endpoint.base_url());

        Ok(Self {
            endpoint,
            config,
            transport,
            root_url,
            info_url,
            upload_url,
        })
    }

    pub fn endpoint(&self) -> &DeviceEndpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =========================================================================
    // Probes
    // =========================================================================

    /// Check whether the device answers on its root path
    ///
    /// HTTP 200 and 404 both count as reachable: a 404 means the server is up
    /// but has no root handler. Any other status or transport failure counts
    /// as unreachable.
    #[instrument(skip(self), fields(device = %self.endpoint))]
    pub async fn check_reachable(&self) -> ReachabilityResult {
        let start = Instant::now();
        match self
            .transport
            .get(&self.root_url, self.config.timeouts.probe())
            .await
        {
            Ok(reply) => {
                let latency = start.elapsed();
                let reachable = matches!(reply.status, 200 | 404);
                debug!("Root probe answered {} in {:?}", reply.status, latency);
                ReachabilityResult {
                    reachable,
                    outcome: ProbeOutcome::Status(reply.status),
                    latency: Some(latency),
                }
            }
            Err(err) => {
                debug!("Root probe failed: {}", err);
                ReachabilityResult {
                    reachable: false,
                    outcome: err.into(),
                    latency: None,
                }
            }
        }
    }

    /// Measure round-trip time of a GET on the root path
    ///
    /// Unlike [`check_reachable`](Self::check_reachable), only HTTP 200
    /// counts as success here.
    #[instrument(skip(self), fields(device = %self.endpoint))]
    pub async fn ping(&self) -> std::result::Result<Duration, ProbeOutcome> {
        let start = Instant::now();
        let reply = self
            .transport
            .get(&self.root_url, self.config.timeouts.probe())
            .await?;
        let elapsed = start.elapsed();

        if reply.status == 200 {
            debug!("Ping answered in {:?}", elapsed);
            Ok(elapsed)
        } else {
            Err(ProbeOutcome::Status(reply.status))
        }
    }

    /// Fetch device metadata from the info endpoint
    ///
    /// Returns `None` for any non-200 status, unparseable body or transport
    /// failure.
    #[instrument(skip(self), fields(device = %self.endpoint))]
    pub async fn fetch_info(&self) -> Option<DeviceInfo> {
        match self
            .transport
            .get(&self.info_url, self.config.timeouts.probe())
            .await
        {
            Ok(reply) if reply.status == 200 => {
                let info = DeviceInfo::from_json(&reply.body);
                if info.is_none() {
                    debug!("Info endpoint returned a non-object body");
                }
                info
            }
            Ok(reply) => {
                debug!("Info endpoint answered {}", reply.status);
                None
            }
            Err(err) => {
                debug!("Info request failed: {}", err);
                None
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Upload a firmware image and wait for the device to come back
    ///
    /// Callers are expected to have checked reachability first; this does not
    /// probe before uploading.
    pub async fn upload(&self, firmware_path: impl AsRef<Path>) -> UpdateResult {
        self.upload_with_progress::<fn(&UpdatePhase)>(firmware_path.as_ref(), None)
            .await
    }

    /// Upload a firmware image, reporting each phase to `progress_callback`
    #[instrument(skip(self, progress_callback), fields(device = %self.endpoint))]
    pub async fn upload_with_progress<F>(
        &self,
        firmware_path: &Path,
        mut progress_callback: Option<F>,
    ) -> UpdateResult
    where
        F: FnMut(&UpdatePhase),
    {
        let size = match tokio::fs::metadata(firmware_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return UpdateResult::FailedLocal("not a regular file".into()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return UpdateResult::FailedLocal("file not found".into());
            }
            Err(err) => return UpdateResult::FailedLocal(err.to_string()),
        };

        info!(
            "Uploading {} ({} bytes) to {}",
            firmware_path.display(),
            size,
            self.upload_url
        );
        emit(
            &mut progress_callback,
            UpdatePhase::Uploading {
                path: firmware_path.to_path_buf(),
                size,
            },
        );

        let image = FirmwareImage {
            path: firmware_path.to_path_buf(),
            size,
        };
        let reply = self
            .transport
            .post_firmware(&self.upload_url, &image, self.config.timeouts.upload())
            .await;

        match reply {
            Ok(reply) if reply.status == 200 => {
                info!("Upload accepted, device should restart");
                self.await_recovery(&mut progress_callback).await
            }
            Ok(reply) => {
                warn!("Upload rejected with HTTP {}", reply.status);
                UpdateResult::FailedHttpStatus {
                    status: reply.status,
                    body: reply.body,
                }
            }
            Err(TransportError::Connect(reason) | TransportError::ConnectionLost(reason)) => {
                warn!("Connection lost during upload: {}", reason);
                UpdateResult::FailedConnectionLost
            }
            Err(TransportError::Timeout) => {
                warn!("Upload timed out after {:?}", self.config.timeouts.upload());
                UpdateResult::FailedTimeout
            }
            Err(TransportError::Io(reason) | TransportError::Other(reason)) => {
                warn!("Upload failed: {}", reason);
                UpdateResult::FailedTransport(reason)
            }
        }
    }

    /// Wait out the reboot grace period, then poll until the device answers
    async fn await_recovery<F>(&self, progress_callback: &mut Option<F>) -> UpdateResult
    where
        F: FnMut(&UpdatePhase),
    {
        let grace = self.config.recovery.grace();
        emit(progress_callback, UpdatePhase::WaitingForReboot { grace });
        tokio::time::sleep(grace).await;

        let policy = self.config.recovery.retry_policy();
        let max_attempts = policy.max_attempts;
        let sequencer = self;
        let callback = &mut *progress_callback;

        let outcome = retry::poll_until(policy, move |attempt| {
            emit(
                callback,
                UpdatePhase::Polling {
                    attempt,
                    max_attempts,
                },
            );
            async move { sequencer.check_reachable().await.reachable }
        })
        .await;

        emit(progress_callback, UpdatePhase::Complete);

        if outcome.succeeded {
            info!("Device back online after {} probe(s)", outcome.attempts);
            UpdateResult::Succeeded
        } else {
            warn!(
                "Device did not respond after {} probes",
                outcome.attempts
            );
            UpdateResult::SucceededButDeviceUnresponsive
        }
    }
}

fn emit<F>(progress_callback: &mut Option<F>, phase: UpdatePhase)
where
    F: FnMut(&UpdatePhase),
{
    if let Some(callback) = progress_callback {
        callback(&phase);
    }
}
