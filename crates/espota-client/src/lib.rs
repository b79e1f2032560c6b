//! ESP OTA Client Library
//!
//! Checks connectivity to a networked embedded device and pushes a firmware
//! binary to it over HTTP, then waits for the device to reboot.
//!
//! # Example
//!
//! ```rust,no_run
//! use espota_client::{DeviceEndpoint, UpdateSequencer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoint = DeviceEndpoint::new("192.168.1.100", 80)?;
//!     let sequencer = UpdateSequencer::new(endpoint)?;
//!
//!     if sequencer.check_reachable().await.reachable {
//!         let result = sequencer.upload("build/firmware.bin").await;
//!         println!("{}", result);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Device HTTP surface
//!
//! | Method | Path    | Purpose                   |
//! |--------|---------|---------------------------|
//! | GET    | `/`     | reachability and ping     |
//! | GET    | `/info` | optional device metadata  |
//! | POST   | `/ota`  | raw firmware upload       |
//!
//! # Testing
//!
//! The `testing` module provides a stub device server and a scripted
//! transport:
//!
//! ```rust,ignore
//! use espota_client::testing::{DeviceBehavior, TestDevice};
//!
//! let device = TestDevice::start_with(DeviceBehavior::default()).await?;
//! let sequencer = UpdateSequencer::new(device.endpoint()?)?;
//! assert!(sequencer.check_reachable().await.reachable);
//! ```

mod config;
mod error;
pub mod firmware;
pub mod retry;
mod sequencer;
pub mod testing;
pub mod transport;
mod types;

pub use config::*;
pub use error::{OtaError, Result};
pub use sequencer::UpdateSequencer;
pub use types::*;

// Re-export for convenience
pub use firmware::{find_firmware_files, FirmwareCandidate, DEFAULT_FIRMWARE_PATHS};
pub use retry::{poll_until, PollOutcome, RetryPolicy};
pub use transport::{DeviceTransport, HttpTransport, TransportError};
