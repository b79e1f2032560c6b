//! Endpoint, probe and update result types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OtaError, Result};

/// Default HTTP port of the device web server
pub const DEFAULT_PORT: u16 = 80;

// =============================================================================
// Device Endpoint
// =============================================================================

/// Network address of the target device
///
/// Immutable once constructed. The base URL is validated up front so that
/// resource paths can always be joined onto it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    host: String,
    port: u16,
    base_url: Url,
}

impl DeviceEndpoint {
    /// Create an endpoint for `host` on `port`
    ///
    /// IPv6 literals are bracketed automatically (`fe80::1` -> `http://[fe80::1]:80/`).
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into().trim().to_string();
        if host.is_empty() || host.contains('/') {
            return Err(OtaError::InvalidHost(host));
        }

        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let base_url = Url::parse(&format!("http://{}/", authority))?;

        Ok(Self {
            host,
            port,
            base_url,
        })
    }

    /// Create an endpoint on the default port (80)
    pub fn with_default_port(host: impl Into<String>) -> Result<Self> {
        Self::new(host, DEFAULT_PORT)
    }

    /// Device host name or IP address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Device HTTP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL (`http://host:port/`)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a resource path against the base URL
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Into::into)
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)
    }
}

// =============================================================================
// Probe Types
// =============================================================================

/// What happened to a single GET probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The device answered with this HTTP status
    Status(u16),
    /// The connection could not be established or was dropped
    ConnectionFailed(String),
    /// No answer within the probe timeout
    TimedOut,
    /// Any other transport failure
    Failed(String),
}

impl ProbeOutcome {
    /// HTTP status, if the device answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::ConnectionFailed(reason) => write!(f, "connection failed: {}", reason),
            Self::TimedOut => write!(f, "timed out"),
            Self::Failed(reason) => write!(f, "{}", reason),
        }
    }
}

/// Result of a reachability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityResult {
    /// Whether the device counts as alive (HTTP 200 or 404 on the root path)
    pub reachable: bool,
    /// Raw probe outcome
    pub outcome: ProbeOutcome,
    /// Round-trip time, present when the device answered
    pub latency: Option<Duration>,
}

impl ReachabilityResult {
    /// True when the device answered 404, i.e. it is up but serves no root page
    pub fn without_root_handler(&self) -> bool {
        self.reachable && self.outcome.status() == Some(404)
    }
}

/// Device metadata reported by the `/info` endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceInfo(serde_json::Map<String, serde_json::Value>);

impl DeviceInfo {
    /// Parse an `/info` body; only a JSON object is accepted
    pub fn from_json(body: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(body).ok()? {
            serde_json::Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Look up a raw value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// Key/value pairs with values rendered for display
    ///
    /// Strings are shown without quotes; other values use their JSON form.
    pub fn entries(&self) -> impl Iterator<Item = (&str, String)> + '_ {
        self.0.iter().map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), rendered)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Update Types
// =============================================================================

/// Outcome of one firmware upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Upload accepted and the device came back online
    Succeeded,
    /// Upload accepted but the device did not return within the poll window
    SucceededButDeviceUnresponsive,
    /// Device rejected the upload
    FailedHttpStatus { status: u16, body: String },
    /// Connection dropped while sending; the device is probably rebooting
    FailedConnectionLost,
    /// Upload did not complete within the upload timeout
    FailedTimeout,
    /// Local precondition failed before any network call
    FailedLocal(String),
    /// Any other transport failure during the upload
    FailedTransport(String),
}

impl UpdateResult {
    /// Whether the update counts as successful for the operator
    ///
    /// A lost connection is a tentative success: the device severs it when
    /// it reboots into the new image.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::SucceededButDeviceUnresponsive | Self::FailedConnectionLost
        )
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "update succeeded"),
            Self::SucceededButDeviceUnresponsive => {
                write!(f, "update succeeded, device not responding")
            }
            Self::FailedHttpStatus { status, body } => {
                write!(f, "update rejected with HTTP {}: {}", status, body)
            }
            Self::FailedConnectionLost => write!(f, "connection lost during update"),
            Self::FailedTimeout => write!(f, "update timed out"),
            Self::FailedLocal(reason) => write!(f, "{}", reason),
            Self::FailedTransport(reason) => write!(f, "transport error: {}", reason),
        }
    }
}

/// Update phases for progress reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Firmware is being sent to the device
    Uploading { path: PathBuf, size: u64 },
    /// Upload accepted, waiting for the device to start rebooting
    WaitingForReboot { grace: Duration },
    /// Probing for the device to come back
    Polling { attempt: u32, max_attempts: u32 },
    /// Update sequence finished
    Complete,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploading { .. } => write!(f, "Uploading"),
            Self::WaitingForReboot { .. } => write!(f, "Waiting for reboot"),
            Self::Polling { .. } => write!(f, "Polling"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}
