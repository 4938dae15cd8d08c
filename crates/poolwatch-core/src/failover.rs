//! Active-pool tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pool value nginx writes when the variable was never set.
const UNKNOWN_POOL: &str = "-";

/// A detected change of serving pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverEvent {
    /// The pool that was active before.
    pub from: String,
    /// The pool now serving traffic.
    pub to: String,
    /// When the change was observed.
    pub at: DateTime<Utc>,
}

/// Tracks the last observed active pool and reports transitions.
///
/// The tracked pool always follows the most recent observation, independent
/// of whether the resulting alert is delivered or suppressed.
#[derive(Debug, Clone)]
pub struct FailoverDetector {
    current_pool: String,
}

impl FailoverDetector {
    /// Creates a detector assuming `initial_pool` is active.
    #[must_use]
    pub fn new(initial_pool: impl Into<String>) -> Self {
        Self {
            current_pool: initial_pool.into(),
        }
    }

    /// The pool currently considered active.
    #[must_use]
    pub fn current_pool(&self) -> &str {
        &self.current_pool
    }

    /// Records an observation, returning an event if the pool changed.
    ///
    /// Blank or unknown pools are ignored.
    pub fn check(&mut self, observed_pool: &str, at: DateTime<Utc>) -> Option<FailoverEvent> {
        if observed_pool.trim().is_empty() || observed_pool == UNKNOWN_POOL {
            return None;
        }
        if observed_pool == self.current_pool {
            return None;
        }

        let from = std::mem::replace(&mut self.current_pool, observed_pool.to_string());
        debug!(from = %from, to = %observed_pool, "active pool changed");

        Some(FailoverEvent {
            from,
            to: observed_pool.to_string(),
            at,
        })
    }
}
