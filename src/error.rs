//! Error types for the Turnstile library.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// A denied request is never an error; denial is a regular decision value.
/// Errors only arise from invalid configuration or I/O while loading it.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An individual rate limit rule failed validation
    #[error("Invalid rate limit rule: {0}")]
    InvalidRule(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
