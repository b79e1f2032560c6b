//! Error types for OTA client construction and configuration

use thiserror::Error;

/// Result type alias for OTA client setup operations
pub type Result<T> = std::result::Result<T, OtaError>;

/// Errors that can occur while setting up an OTA client
///
/// Network operations never return these; they report typed outcomes
/// such as [`crate::ReachabilityResult`] and [`crate::UpdateResult`].
#[derive(Error, Debug)]
pub enum OtaError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Host is empty or malformed
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration could not be parsed or serialized
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl OtaError {
    /// Create a config error from any displayable error
    pub fn config_error(err: impl std::fmt::Display) -> Self {
        Self::ConfigError(err.to_string())
    }
}
