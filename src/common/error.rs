//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed:\n{message}")]
    ValidationError { message: String },
}

/// Errors talking to the Signal REST API or the game server's HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network, connect, or timeout failure.
    #[error("Request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The payload did not have the expected shape.
    #[error("Malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    /// The destination accepted the request but did not deliver the message.
    #[error("{endpoint} rejected the message: {reason}")]
    Rejected { endpoint: String, reason: String },

    /// The operation needs configuration that is absent.
    #[error("Not configured: {what}")]
    NotConfigured { what: String },
}

/// Result type alias for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
