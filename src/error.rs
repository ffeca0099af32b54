//! Error types for structured image generation.

use crate::resolution::ResolutionError;
use std::time::Duration;

/// Errors that can occur while preparing or running a generation.
#[derive(Debug, thiserror::Error)]
pub enum FluxError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Polling gave up before the task finished.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Download URL expired before download.
    #[error("download URL expired")]
    UrlExpired,

    /// Content was blocked by moderation.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Configuration could not be used as given.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Requested width/height were rejected before submission.
    #[error("invalid resolution: {0}")]
    Resolution(#[from] ResolutionError),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FluxError {
    /// Returns true if the error was detected locally, before any request was sent.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Resolution(_) | Self::Config(_))
    }
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, FluxError>;
