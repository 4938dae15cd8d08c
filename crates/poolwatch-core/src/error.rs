//! Error types for the poolwatch-core crate.

use thiserror::Error;

/// Errors raised while constructing the engine.
///
/// Per-record problems never surface here; they are [`ParseFailure`]s and are
/// contained to the line that caused them.
#[derive(Debug, Error)]
pub enum WatchError {
    /// A configuration value is out of its allowed range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl WatchError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Why a raw line was rejected by the record parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    /// The line was empty or whitespace only.
    #[error("empty line")]
    Empty,

    /// No `pool` field was found, or it was empty.
    #[error("missing pool field")]
    MissingPool,

    /// No client-facing status code was found.
    #[error("missing status field")]
    MissingStatus,

    /// A status code was found but is not a valid HTTP status.
    #[error("status {0} out of range 100..=599")]
    StatusOutOfRange(u16),
}

/// Result type for engine construction.
pub type Result<T> = std::result::Result<T, WatchError>;
