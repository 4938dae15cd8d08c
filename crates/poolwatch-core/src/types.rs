//! Core types shared by the engine and its collaborators.
//!
//! - [`LogRecord`]: one parsed request observation
//! - [`AlertKind`]: the conditions the engine can alert on
//! - [`AlertSeverity`]: how urgent an alert kind is
//! - [`AlertIntent`]: a structured alert, prior to formatting and delivery

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseFailure;

/// Lowest valid HTTP status code.
pub const MIN_STATUS: u16 = 100;

/// Highest valid HTTP status code.
pub const MAX_STATUS: u16 = 599;

/// One parsed request observation from the access log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pool: String,
    status: u16,
    upstream_status: u16,
    observed_at: DateTime<Utc>,
}

impl LogRecord {
    /// Creates a new record.
    ///
    /// When `upstream_status` is `None` it takes the value of `status`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::MissingPool`] if `pool` is blank and
    /// [`ParseFailure::StatusOutOfRange`] if either status is not in `100..=599`.
    pub fn new(
        pool: impl Into<String>,
        status: u16,
        upstream_status: Option<u16>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, ParseFailure> {
        let pool = pool.into();
        if pool.trim().is_empty() {
            return Err(ParseFailure::MissingPool);
        }
        let status = check_status(status)?;
        let upstream_status = match upstream_status {
            Some(code) => check_status(code)?,
            None => status,
        };

        Ok(Self {
            pool,
            status,
            upstream_status,
            observed_at,
        })
    }

    /// The pool that served the request.
    #[must_use]
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// The status returned to the client.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// The status returned by the backend.
    #[must_use]
    pub const fn upstream_status(&self) -> u16 {
        self.upstream_status
    }

    /// When the record was ingested.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Returns true if the backend answered with a 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.upstream_status >= 500 && self.upstream_status < 600
    }
}

const fn check_status(code: u16) -> Result<u16, ParseFailure> {
    if code >= MIN_STATUS && code <= MAX_STATUS {
        Ok(code)
    } else {
        Err(ParseFailure::StatusOutOfRange(code))
    }
}

/// The severity level of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Should be investigated.
    Warning,
    /// Requires immediate attention.
    Critical,
}

impl AlertSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The conditions the engine raises alerts for.
///
/// Each kind has its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The serving pool changed.
    Failover,
    /// The upstream 5xx rate crossed the threshold.
    ErrorRate,
}

impl AlertKind {
    /// All alert kinds.
    pub const ALL: [Self; 2] = [Self::Failover, Self::ErrorRate];

    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Failover => "failover",
            Self::ErrorRate => "error_rate",
        }
    }

    /// Returns the severity attached to alerts of this kind.
    #[must_use]
    pub const fn severity(&self) -> AlertSeverity {
        match self {
            Self::Failover => AlertSeverity::Warning,
            Self::ErrorRate => AlertSeverity::Critical,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured description of a condition worth notifying about.
///
/// Sinks decide how to render and deliver it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertIntent {
    /// Unique identifier, useful to correlate deliveries across sinks.
    pub id: Uuid,
    /// What triggered the alert.
    pub kind: AlertKind,
    /// One-line human readable summary.
    pub summary: String,
    /// Structured details (pools, rate, threshold, ...).
    pub fields: BTreeMap<String, serde_json::Value>,
    /// When the engine raised the alert.
    pub raised_at: DateTime<Utc>,
}

impl AlertIntent {
    /// Creates an intent with no structured fields.
    #[must_use]
    pub fn new(kind: AlertKind, summary: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            summary: summary.into(),
            fields: BTreeMap::new(),
            raised_at,
        }
    }

    /// Adds a structured field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns the severity of this alert.
    #[must_use]
    pub const fn severity(&self) -> AlertSeverity {
        self.kind.severity()
    }
}
