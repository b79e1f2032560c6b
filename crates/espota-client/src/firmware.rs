//! Local firmware discovery

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Build outputs checked by default, relative to the working directory
pub const DEFAULT_FIRMWARE_PATHS: &[&str] = &[
    "./build/ESP32S3Cam.bin",
    "../myota/build/myota.bin",
    "../myota/ota/firmware.bin",
];

/// A firmware image found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareCandidate {
    pub path: PathBuf,
    pub size: u64,
}

/// Default search list as owned paths
pub fn default_firmware_paths() -> Vec<PathBuf> {
    DEFAULT_FIRMWARE_PATHS.iter().map(PathBuf::from).collect()
}

/// Return the candidates that exist, in search order, with their sizes
///
/// Paths that do not exist or cannot be inspected are skipped.
pub fn find_firmware_files<P: AsRef<Path>>(search_paths: &[P]) -> Vec<FirmwareCandidate> {
    search_paths
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let metadata = std::fs::metadata(path).ok()?;
            Some(FirmwareCandidate {
                path: path.to_path_buf(),
                size: metadata.len(),
            })
        })
        .collect()
}
