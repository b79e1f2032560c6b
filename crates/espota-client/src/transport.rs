//! HTTP transport seam between the sequencer and the network

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::error::Result;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Transport-level failures, classified for the sequencer's policies
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connection dropped while the request was in flight
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Request did not complete within its timeout
    #[error("request timed out")]
    Timeout,

    /// Local IO failure (e.g. firmware file unreadable)
    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Classify a reqwest error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(error_chain(err))
        } else if err.is_request() || err.is_body() {
            Self::ConnectionLost(error_chain(err))
        } else {
            Self::Other(error_chain(err))
        }
    }
}

/// Render an error with its source chain (`outer: inner: root`)
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Firmware file to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    pub path: PathBuf,
    pub size: u64,
}

/// Minimal HTTP surface the sequencer needs from the network
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// GET `url`, failing if no complete reply arrives within `timeout`
    async fn get(&self, url: &Url, timeout: Duration) -> std::result::Result<HttpReply, TransportError>;

    /// POST the raw bytes of `image` to `url` as `application/octet-stream`
    async fn post_firmware(
        &self,
        url: &Url,
        image: &FirmwareImage,
        timeout: Duration,
    ) -> std::result::Result<HttpReply, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given connect timeout
    ///
    /// Request timeouts are set per call.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { client })
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    async fn read_reply(
        response: reqwest::Response,
    ) -> std::result::Result<HttpReply, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl DeviceTransport for HttpTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> std::result::Result<HttpReply, TransportError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Self::read_reply(response).await
    }

    async fn post_firmware(
        &self,
        url: &Url,
        image: &FirmwareImage,
        timeout: Duration,
    ) -> std::result::Result<HttpReply, TransportError> {
        let file = tokio::fs::File::open(&image.path)
            .await
            .map_err(|e| TransportError::Io(format!("{}: {}", image.path.display(), e)))?;

        debug!("POST {} ({} bytes)", url, image.size);
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, image.size)
            .timeout(timeout)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        // A device may reboot right after acknowledging; the 200 stands even
        // if the rest of the body never arrives.
        if response.status() == StatusCode::OK {
            let body = response.text().await.unwrap_or_else(|e| {
                debug!("Upload acknowledged, reply body lost: {}", e);
                String::new()
            });
            return Ok(HttpReply::new(StatusCode::OK.as_u16(), body));
        }
        Self::read_reply(response).await
    }
}
