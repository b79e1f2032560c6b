//! Integration tests for espota-client
//!
//! These tests spin up a stub device HTTP server and drive the sequencer
//! against it over real sockets.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use espota_client::testing::{closed_local_port, DeviceBehavior, ReceivedUpload, TestDevice};
use espota_client::{DeviceEndpoint, ProbeOutcome, SequencerConfig, UpdateResult, UpdateSequencer};
use rstest::rstest;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =============================================================================
// Helpers
// =============================================================================

/// Short recovery window so tests do not sit through the real 35 seconds
fn fast_config() -> SequencerConfig {
    SequencerConfig::builder()
        .probe_timeout_ms(300)
        .grace_ms(20)
        .poll_interval_ms(20)
        .max_attempts(3)
        .build()
}

async fn start_device(behavior: DeviceBehavior) -> (TestDevice, UpdateSequencer) {
    let device = TestDevice::start_with(behavior).await.unwrap();
    let sequencer = UpdateSequencer::with_config(device.endpoint().unwrap(), fast_config()).unwrap();
    (device, sequencer)
}

fn firmware_file(len: usize) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&vec![0xE9; len]).unwrap();
    file.flush().unwrap();
    file
}

async fn unreachable_sequencer() -> UpdateSequencer {
    let port = closed_local_port().await.unwrap();
    let endpoint = DeviceEndpoint::new("127.0.0.1", port).unwrap();
    UpdateSequencer::with_config(endpoint, fast_config()).unwrap()
}

// =============================================================================
// Reachability Tests
// =============================================================================

#[rstest]
#[case(200, true)]
#[case(404, true)]
#[case(500, false)]
#[case(503, false)]
#[tokio::test]
async fn test_reachability_by_status(#[case] status: u16, #[case] expected: bool) {
    let (device, sequencer) = start_device(DeviceBehavior {
        root_status: status,
        ..Default::default()
    })
    .await;

    let result = sequencer.check_reachable().await;
    assert_eq!(result.reachable, expected);
    assert_eq!(result.outcome, ProbeOutcome::Status(status));
    assert_eq!(device.root_hits(), 1);
}

#[tokio::test]
async fn test_reachability_connection_refused() {
    let sequencer = unreachable_sequencer().await;

    let result = sequencer.check_reachable().await;
    assert!(!result.reachable);
    assert!(matches!(result.outcome, ProbeOutcome::ConnectionFailed(_)));
}

#[tokio::test]
async fn test_reachability_timeout() {
    let (_device, sequencer) = start_device(DeviceBehavior {
        root_delay: Duration::from_secs(2),
        ..Default::default()
    })
    .await;

    let result = sequencer.check_reachable().await;
    assert!(!result.reachable);
    assert_eq!(result.outcome, ProbeOutcome::TimedOut);
}

// =============================================================================
// Ping Tests
// =============================================================================

#[tokio::test]
async fn test_ping_ok() {
    let (_device, sequencer) = start_device(DeviceBehavior::default()).await;

    let latency = sequencer.ping().await.unwrap();
    assert!(latency < Duration::from_secs(1));
}

#[tokio::test]
async fn test_ping_rejects_404() {
    let (_device, sequencer) = start_device(DeviceBehavior {
        root_status: 404,
        ..Default::default()
    })
    .await;

    // Reachable, but not a successful ping
    assert!(sequencer.check_reachable().await.reachable);
    assert_eq!(sequencer.ping().await, Err(ProbeOutcome::Status(404)));
}

#[tokio::test]
async fn test_ping_unreachable() {
    let sequencer = unreachable_sequencer().await;
    assert!(sequencer.ping().await.is_err());
}

// =============================================================================
// Info Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_info() {
    let (device, sequencer) = start_device(DeviceBehavior {
        info_body: Some(r#"{"chip": "ESP32-S3", "version": "1.4.2", "psram": true}"#.into()),
        ..Default::default()
    })
    .await;

    let info = sequencer.fetch_info().await.unwrap();
    assert_eq!(info.len(), 3);
    let entries: Vec<_> = info.entries().collect();
    assert!(entries.contains(&("chip", "ESP32-S3".to_string())));
    assert!(entries.contains(&("psram", "true".to_string())));
    assert_eq!(device.info_hits(), 1);
}

#[tokio::test]
async fn test_fetch_info_missing_endpoint() {
    let (_device, sequencer) = start_device(DeviceBehavior::default()).await;
    assert!(sequencer.fetch_info().await.is_none());
}

#[tokio::test]
async fn test_fetch_info_unreachable() {
    let sequencer = unreachable_sequencer().await;
    assert!(sequencer.fetch_info().await.is_none());
}

// =============================================================================
// Upload Tests
// =============================================================================

#[tokio::test]
async fn test_upload_success() {
    let (device, sequencer) = start_device(DeviceBehavior::default()).await;
    let firmware = firmware_file(64 * 1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::Succeeded);
    assert_eq!(device.upload_hits(), 1);
    // Device answered the first recovery probe
    assert_eq!(device.root_hits(), 1);
    assert_eq!(
        device.last_upload(),
        Some(ReceivedUpload {
            content_type: Some("application/octet-stream".into()),
            content_length: Some(64 * 1024),
            body_len: 64 * 1024,
        })
    );
}

#[tokio::test]
async fn test_upload_device_stays_offline() {
    let (device, sequencer) = start_device(DeviceBehavior {
        offline_after_upload: true,
        ..Default::default()
    })
    .await;
    let firmware = firmware_file(1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::SucceededButDeviceUnresponsive);
    assert!(result.is_success());
    assert_eq!(device.root_hits(), 3);
}

#[tokio::test]
async fn test_upload_rejected() {
    let (device, sequencer) = start_device(DeviceBehavior {
        ota_status: 500,
        ota_body: "bad firmware".into(),
        ..Default::default()
    })
    .await;
    let firmware = firmware_file(1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(
        result,
        UpdateResult::FailedHttpStatus {
            status: 500,
            body: "bad firmware".into()
        }
    );
    assert_eq!(result.exit_code(), 1);
    assert_eq!(device.root_hits(), 0);
}

#[tokio::test]
async fn test_upload_missing_file() {
    let (device, sequencer) = start_device(DeviceBehavior::default()).await;

    let result = sequencer.upload("/no/such/firmware.bin").await;

    assert_eq!(result, UpdateResult::FailedLocal("file not found".into()));
    assert_eq!(device.upload_hits(), 0);
    assert_eq!(device.root_hits(), 0);
}

#[tokio::test]
async fn test_upload_connection_refused_is_tentative_success() {
    let sequencer = unreachable_sequencer().await;
    let firmware = firmware_file(1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::FailedConnectionLost);
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn test_upload_custom_path() {
    let device = TestDevice::start().await.unwrap();
    let config = SequencerConfig::builder()
        .upload_path("/update")
        .grace_ms(10)
        .poll_interval_ms(10)
        .build();
    let sequencer = UpdateSequencer::with_config(device.endpoint().unwrap(), config).unwrap();
    let firmware = firmware_file(128);

    let result = sequencer.upload(firmware.path()).await;

    // The stub only serves /ota
    assert_eq!(
        result,
        UpdateResult::FailedHttpStatus {
            status: 404,
            body: String::new()
        }
    );
    assert_eq!(device.upload_hits(), 0);
}

// =============================================================================
// Raw Socket Devices
// =============================================================================

/// Serve every accepted connection with `handler`, bypassing any HTTP stack
async fn spawn_raw_device<F, Fut>(handler: F) -> DeviceEndpoint
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handler(stream));
        }
    });

    DeviceEndpoint::new(addr.ip().to_string(), addr.port()).unwrap()
}

/// Read a request head; returns the request line, declared body length and
/// any body bytes already received
async fn read_head(stream: &mut TcpStream) -> std::io::Result<(String, usize, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse().ok())
                .unwrap_or(0);
            let request_line = head.lines().next().unwrap_or_default().to_string();
            return Ok((request_line, content_length, buf[end + 4..].to_vec()));
        }
    }
}

/// Read a full request including its body; returns the request line
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let (request_line, content_length, mut body) = read_head(stream).await?;
    let mut chunk = [0u8; 16 * 1024];
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Ok(request_line)
}

#[tokio::test]
async fn test_upload_acknowledged_then_body_cut_short() {
    let endpoint = spawn_raw_device(|mut stream| async move {
        let Ok(request_line) = read_request(&mut stream).await else {
            return;
        };
        let reply: &[u8] = if request_line.starts_with("POST") {
            // Promises 100 bytes, sends 2, then the device reboots
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nOK"
        } else {
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        };
        let _ = stream.write_all(reply).await;
        let _ = stream.shutdown().await;
    })
    .await;
    let sequencer = UpdateSequencer::with_config(endpoint, fast_config()).unwrap();
    let firmware = firmware_file(1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::Succeeded);
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn test_upload_reset_mid_transfer_is_tentative_success() {
    let endpoint = spawn_raw_device(|mut stream| async move {
        if read_head(&mut stream).await.is_ok() {
            // Zero linger turns the close into a RST
            let _ = stream.set_linger(Some(Duration::ZERO));
        }
        drop(stream);
    })
    .await;
    let sequencer = UpdateSequencer::with_config(endpoint, fast_config()).unwrap();
    let firmware = firmware_file(4 * 1024 * 1024);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::FailedConnectionLost);
    assert_eq!(result.exit_code(), 0);
}

#[tokio::test]
async fn test_upload_device_never_answers_times_out() {
    let endpoint = spawn_raw_device(|stream| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    })
    .await;
    let config = SequencerConfig::builder()
        .upload_timeout_ms(500)
        .grace_ms(20)
        .poll_interval_ms(20)
        .max_attempts(3)
        .build();
    let sequencer = UpdateSequencer::with_config(endpoint, config).unwrap();
    let firmware = firmware_file(4096);

    let result = sequencer.upload(firmware.path()).await;

    assert_eq!(result, UpdateResult::FailedTimeout);
    assert_eq!(result.exit_code(), 1);
}
