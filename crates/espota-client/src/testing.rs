//! Test utilities for espota-client
//!
//! Provides a stub device HTTP server and a scripted in-memory transport.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use url::Url;

use crate::transport::{DeviceTransport, FirmwareImage, HttpReply, TransportError};
use crate::types::DeviceEndpoint;
use crate::Result;

// =============================================================================
// Scripted Transport
// =============================================================================

/// A request observed by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Get { url: String, timeout: Duration },
    Upload { url: String, size: u64, timeout: Duration },
}

type Reply = std::result::Result<HttpReply, TransportError>;

#[derive(Debug, Default)]
struct Script {
    uploads: VecDeque<Reply>,
    probes: VecDeque<Reply>,
    default_probe: Option<Reply>,
    calls: Vec<TransportCall>,
}

/// In-memory transport replaying canned replies
///
/// GET requests consume the probe queue, then fall back to the default probe
/// reply. Clones share the same script and call log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next upload
    pub fn with_upload(self, reply: Reply) -> Self {
        self.script.lock().uploads.push_back(reply);
        self
    }

    /// Queue a reply for the next GET
    pub fn with_probe(self, reply: Reply) -> Self {
        self.script.lock().probes.push_back(reply);
        self
    }

    /// Reply used for every GET once the queue is empty
    pub fn with_default_probe(self, reply: Reply) -> Self {
        self.script.lock().default_probe = Some(reply);
        self
    }

    /// All requests seen so far
    pub fn calls(&self) -> Vec<TransportCall> {
        self.script.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().calls.len()
    }

    /// Number of GET requests seen so far
    pub fn probe_count(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, TransportCall::Get { .. }))
            .count()
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> Reply {
        let mut script = self.script.lock();
        script.calls.push(TransportCall::Get {
            url: url.to_string(),
            timeout,
        });
        match script.probes.pop_front() {
            Some(reply) => reply,
            None => script
                .default_probe
                .clone()
                .unwrap_or_else(|| Err(TransportError::Connect("no scripted reply".into()))),
        }
    }

    async fn post_firmware(&self, url: &Url, image: &FirmwareImage, timeout: Duration) -> Reply {
        let mut script = self.script.lock();
        script.calls.push(TransportCall::Upload {
            url: url.to_string(),
            size: image.size,
            timeout,
        });
        script
            .uploads
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted upload reply".into())))
    }
}

// =============================================================================
// Stub Device Server
// =============================================================================

/// How the stub device answers
#[derive(Debug, Clone)]
pub struct DeviceBehavior {
    /// Status for `GET /`
    pub root_status: u16,
    /// Delay before answering `GET /`
    pub root_delay: Duration,
    /// Body for `GET /info`; `None` answers 404
    pub info_body: Option<String>,
    /// Status for `POST /ota`
    pub ota_status: u16,
    /// Body for `POST /ota`
    pub ota_body: String,
    /// Answer `GET /` with 503 once an upload was accepted
    pub offline_after_upload: bool,
}

impl Default for DeviceBehavior {
    fn default() -> Self {
        Self {
            root_status: 200,
            root_delay: Duration::ZERO,
            info_body: None,
            ota_status: 200,
            ota_body: "OK".to_string(),
            offline_after_upload: false,
        }
    }
}

/// Last upload received by the stub device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedUpload {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body_len: usize,
}

#[derive(Debug, Default)]
struct DeviceState {
    behavior: Mutex<DeviceBehavior>,
    root_hits: AtomicUsize,
    info_hits: AtomicUsize,
    upload_hits: AtomicUsize,
    uploaded: AtomicBool,
    last_upload: Mutex<Option<ReceivedUpload>>,
}

/// A stub device that automatically shuts down when dropped
pub struct TestDevice {
    pub addr: SocketAddr,
    state: Arc<DeviceState>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestDevice {
    /// Start a stub device with default behavior
    pub async fn start() -> Result<Self> {
        Self::start_with(DeviceBehavior::default()).await
    }

    /// Start a stub device on an ephemeral local port
    pub async fn start_with(behavior: DeviceBehavior) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(DeviceState {
            behavior: Mutex::new(behavior),
            ..Default::default()
        });

        let router = Router::new()
            .route("/", get(root_handler))
            .route("/info", get(info_handler))
            .route("/ota", post(ota_handler))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Endpoint pointing at this device
    pub fn endpoint(&self) -> Result<DeviceEndpoint> {
        DeviceEndpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Change behavior while running
    pub fn set_behavior(&self, behavior: DeviceBehavior) {
        *self.state.behavior.lock() = behavior;
    }

    pub fn root_hits(&self) -> usize {
        self.state.root_hits.load(Ordering::SeqCst)
    }

    pub fn info_hits(&self) -> usize {
        self.state.info_hits.load(Ordering::SeqCst)
    }

    pub fn upload_hits(&self) -> usize {
        self.state.upload_hits.load(Ordering::SeqCst)
    }

    pub fn last_upload(&self) -> Option<ReceivedUpload> {
        self.state.last_upload.lock().clone()
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestDevice {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn root_handler(State(state): State<Arc<DeviceState>>) -> StatusCode {
    state.root_hits.fetch_add(1, Ordering::SeqCst);
    let behavior = state.behavior.lock().clone();

    if !behavior.root_delay.is_zero() {
        tokio::time::sleep(behavior.root_delay).await;
    }

    if behavior.offline_after_upload && state.uploaded.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    status_code(behavior.root_status)
}

async fn info_handler(State(state): State<Arc<DeviceState>>) -> Response {
    state.info_hits.fetch_add(1, Ordering::SeqCst);
    let info_body = state.behavior.lock().info_body.clone();

    match info_body {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ota_handler(
    State(state): State<Arc<DeviceState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.upload_hits.fetch_add(1, Ordering::SeqCst);

    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    *state.last_upload.lock() = Some(ReceivedUpload {
        content_type: header_str(header::CONTENT_TYPE),
        content_length: header_str(header::CONTENT_LENGTH).and_then(|v| v.parse().ok()),
        body_len: body.len(),
    });

    let behavior = state.behavior.lock().clone();
    if behavior.ota_status == 200 {
        state.uploaded.store(true, Ordering::SeqCst);
    }
    (status_code(behavior.ota_status), behavior.ota_body)
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Find a local port with nothing listening on it
pub async fn closed_local_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
