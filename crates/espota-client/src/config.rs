//! Sequencer configuration with YAML support

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OtaError, Result};
use crate::retry::RetryPolicy;

/// Update sequencer configuration
///
/// Can be loaded from YAML or JSON, or constructed programmatically. The
/// defaults encode the device's reboot window and must not be tuned casually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Resource paths on the device web server
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Per-request timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Post-upload recovery policy
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

/// Endpoint paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Reachability and ping probe: GET
    #[serde(default = "default_root_path")]
    pub root: String,

    /// Device metadata: GET
    #[serde(default = "default_info_path")]
    pub info: String,

    /// Firmware upload: POST
    #[serde(default = "default_upload_path")]
    pub upload: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            root: default_root_path(),
            info: default_info_path(),
            upload: default_upload_path(),
        }
    }
}

fn default_root_path() -> String {
    "/".to_string()
}

fn default_info_path() -> String {
    "/info".to_string()
}

fn default_upload_path() -> String {
    "/ota".to_string()
}

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Status, ping and info request timeout in milliseconds (default: 5s)
    #[serde(default = "default_probe_timeout")]
    pub probe_ms: u64,

    /// Upload timeout in milliseconds (default: 5 minutes)
    #[serde(default = "default_upload_timeout")]
    pub upload_ms: u64,

    /// Connect timeout in milliseconds (default: 5s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            probe_ms: default_probe_timeout(),
            upload_ms: default_upload_timeout(),
            connect_ms: default_connect_timeout(),
        }
    }
}

impl TimeoutsConfig {
    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

fn default_probe_timeout() -> u64 {
    5_000 // 5 seconds
}

fn default_upload_timeout() -> u64 {
    300_000 // 5 minutes
}

fn default_connect_timeout() -> u64 {
    5_000 // 5 seconds
}

/// Recovery phase configuration
///
/// After an accepted upload the sequencer waits `grace_ms`, then probes up to
/// `max_attempts` times, sleeping `poll_interval_ms` before each probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Unconditional wait before the first probe (default: 5s)
    #[serde(default = "default_grace")]
    pub grace_ms: u64,

    /// Interval between probes (default: 1s)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Number of probes before giving up (default: 30)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            grace_ms: default_grace(),
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RecoveryConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Retry policy for the reachability poll
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.poll_interval_ms), self.max_attempts)
    }
}

fn default_grace() -> u64 {
    5_000 // 5 seconds
}

fn default_poll_interval() -> u64 {
    1_000 // 1 second
}

fn default_max_attempts() -> u32 {
    30
}

impl SequencerConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(OtaError::config_error)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(OtaError::config_error)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(OtaError::config_error)
    }

    /// Create a builder for programmatic configuration
    pub fn builder() -> SequencerConfigBuilder {
        SequencerConfigBuilder::new()
    }
}

/// Builder for SequencerConfig
#[derive(Debug, Default)]
pub struct SequencerConfigBuilder {
    config: SequencerConfig,
}

impl SequencerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upload endpoint path
    pub fn upload_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.upload = path.into();
        self
    }

    /// Set the info endpoint path
    pub fn info_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoints.info = path.into();
        self
    }

    /// Set probe timeout in milliseconds
    pub fn probe_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.probe_ms = ms;
        self
    }

    /// Set upload timeout in milliseconds
    pub fn upload_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.upload_ms = ms;
        self
    }

    /// Set reboot grace period in milliseconds
    pub fn grace_ms(mut self, ms: u64) -> Self {
        self.config.recovery.grace_ms = ms;
        self
    }

    /// Set recovery poll interval in milliseconds
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.recovery.poll_interval_ms = ms;
        self
    }

    /// Set number of recovery probes
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.recovery.max_attempts = attempts;
        self
    }

    /// Build the configuration
    pub fn build(self) -> SequencerConfig {
        self.config
    }
}
