//! Error types
//!
//! Errors that can cross a component boundary. The analysis facade converts
//! every one of these into a degraded result; only construction-time
//! misconfiguration reaches the caller as a hard failure.

use std::time::Duration;
use thiserror::Error;

/// OCR pool and engine errors
#[derive(Debug, Error)]
pub enum OcrError {
    /// Pool configured with no workers
    #[error("OCR pool must have at least one worker")]
    EmptyPool,

    /// An engine instance could not be built
    #[error("Failed to construct OCR engine {worker}: {message}")]
    Construction { worker: usize, message: String },

    /// The engine ran but failed to produce text
    #[error("OCR engine failure: {0}")]
    Engine(String),

    /// Image could not be handed to the engine
    #[error("Failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External advisor errors
///
/// All of these are treated exactly like "no advisor configured".
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("Advisor unavailable at {0}")]
    Unavailable(String),

    #[error("Advisor timed out after {0:?}")]
    Timeout(Duration),

    #[error("Advisor transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Advisor returned status {0}")]
    Status(u16),

    #[error("Malformed advisor response: {0}")]
    Malformed(String),
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}
