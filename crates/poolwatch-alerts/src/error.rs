//! Error types for the poolwatch-alerts crate.

use thiserror::Error;

/// Errors that can occur while delivering an alert.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The HTTP request could not be completed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("endpoint rejected alert with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the endpoint.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The sink is missing required configuration.
    #[error("sink not configured: {0}")]
    NotConfigured(String),

    /// The payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;
