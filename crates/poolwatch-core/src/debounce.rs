//! Per-kind alert cooldown gate.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::types::AlertKind;

/// Rate-limits alerts so each [`AlertKind`] fires at most once per cooldown.
///
/// Gating and committing are separate steps: call [`should_fire`] and, if the
/// alert is actually raised, [`record_fired`] with the same instant. A kind
/// that never fired is treated as having fired infinitely long ago.
///
/// [`should_fire`]: AlertDebouncer::should_fire
/// [`record_fired`]: AlertDebouncer::record_fired
#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    cooldown: Duration,
    last_fired: HashMap<AlertKind, DateTime<Utc>>,
}

impl AlertDebouncer {
    /// Creates a debouncer with the given cooldown.
    #[must_use]
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: HashMap::new(),
        }
    }

    /// Creates a debouncer with a cooldown in whole seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX);
        Self::new(Duration::try_seconds(secs).unwrap_or(Duration::MAX))
    }

    /// The configured cooldown.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Returns true if more than the cooldown has elapsed since `kind` last fired.
    #[must_use]
    pub fn should_fire(&self, kind: AlertKind, now: DateTime<Utc>) -> bool {
        self.last_fired
            .get(&kind)
            .is_none_or(|last| now.signed_duration_since(*last) > self.cooldown)
    }

    /// Records that `kind` fired at `now`.
    pub fn record_fired(&mut self, kind: AlertKind, now: DateTime<Utc>) {
        self.last_fired.insert(kind, now);
    }

    /// When `kind` last fired, if ever.
    #[must_use]
    pub fn last_fired(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_fired.get(&kind).copied()
    }
}
