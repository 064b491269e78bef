//! Error types for weather-extract
//!
//! One error enum covers the whole crate. The extraction loop never lets most of
//! these escape a cycle: authentication failures collapse into a missing
//! connection and storage failures into [`WriteStatus::Failed`](crate::store::WriteStatus).
//! Only configuration errors are meant to reach `main` and abort the process.

use thiserror::Error;

/// Result type alias for weather-extract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for weather-extract
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ADLS_NAME")
        key: Option<String>,
    },

    /// The token endpoint rejected the credentials or returned an unusable token
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network error talking to the weather API, the token endpoint or the store
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The object store refused or failed an operation
    #[error("storage error at {path}: {reason}")]
    Storage {
        /// Store path the operation targeted
        path: String,
        /// HTTP status returned by the store, if the request got that far
        status: Option<u16>,
        /// Reason reported by the store or the client
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A base URL or endpoint template did not produce a valid URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used as a structured log field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Auth(_) => "auth_error",
            Error::Network(e) if e.is_timeout() => "timeout",
            Error::Network(_) => "network_error",
            Error::Storage { .. } => "storage_error",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Other(_) => "internal_error",
        }
    }
}
