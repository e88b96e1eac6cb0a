//! Error types for acoustic models.

use thiserror::Error;

/// Main error type for acoustic model operations.
#[derive(Error, Debug)]
pub enum AmError {
    /// Invalid argument (unsupported border mode, zero stride, etc.).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// Model loading/saving errors.
    #[error("Model error: {0}")]
    Model(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for acoustic model operations.
pub type AmResult<T> = Result<T, AmError>;
