//! Error types for the throttle service.

use thiserror::Error;

/// Main error type for throttle service operations.
///
/// Throttling decisions themselves never fail; these cover setup and serving.
#[derive(Error, Debug)]
pub enum ThrottleError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for ThrottleError {
    fn from(err: ::config::ConfigError) -> Self {
        ThrottleError::Config(err.to_string())
    }
}

/// Result type alias for throttle service operations.
pub type Result<T> = std::result::Result<T, ThrottleError>;
