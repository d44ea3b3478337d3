//! Error types for svckit
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for svckit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for svckit
#[derive(Error, Debug)]
pub enum Error {
    /// Service registry errors
    #[error("Service registry error: {0}")]
    Registry(String),

    /// Config source errors
    #[error("Config source error: {0}")]
    ConfigSource(String),

    /// Object storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// SMS delivery errors
    #[error("SMS error: {0}")]
    Sms(String),

    /// Snapshot store errors
    #[error("Snapshot store error: {0}")]
    Snapshot(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vendor-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a service registry error
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Create a config source error
    pub fn config_source(msg: impl Into<String>) -> Self {
        Self::ConfigSource(msg.into())
    }

    /// Create an object storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an SMS error
    pub fn sms(msg: impl Into<String>) -> Self {
        Self::Sms(msg.into())
    }

    /// Create a snapshot store error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is worth retrying later (transport or 5xx/429)
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited(_) | Error::Io(_) => true,
            Error::Provider { message, .. } => message.contains("(transient)"),
            _ => false,
        }
    }

    /// Map a non-success HTTP status from a vendor API to an error
    ///
    /// The mapping is shared by every vendor crate so that callers see the
    /// same variant for the same class of failure.
    pub fn from_status(provider: &str, status: u16, context: &str, body: &str) -> Self {
        match status {
            401 | 403 => Error::auth(format!(
                "{}: invalid credentials or insufficient permissions. Status: {}",
                provider, status
            )),
            404 => Error::not_found(format!("{}: {}", provider, context)),
            429 => Error::rate_limited(format!(
                "{}: rate limit exceeded. Status: {}",
                provider, status
            )),
            500..=599 => Error::provider(
                provider,
                format!("server error (transient): {} - {}", status, body),
            ),
            _ => Error::provider(provider, format!("{} failed: {} - {}", context, status, body)),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
