//! One Word client — process-level error types.

use oneword_core::error::DomainError;
use thiserror::Error;

/// Startup, configuration and local I/O errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading or writing a local file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A local file held malformed JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<AppError> for DomainError {
    fn from(err: AppError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}
