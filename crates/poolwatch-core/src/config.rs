//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Tunables for the stream processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Error rate, in percent, above which an error-rate alert is raised.
    pub error_rate_threshold_percent: f64,
    /// Number of recent requests kept for the error-rate computation.
    pub window_capacity: usize,
    /// Minimum seconds between two alerts of the same kind.
    pub alert_cooldown_secs: u64,
    /// Pool assumed active before the first record arrives.
    pub default_active_pool: String,
    /// The error rate is checked every this many accepted records.
    pub error_rate_check_interval: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            error_rate_threshold_percent: 2.0,
            window_capacity: 200,
            alert_cooldown_secs: 300,
            default_active_pool: "blue".to_string(),
            error_rate_check_interval: 10,
        }
    }
}

impl WatcherConfig {
    /// Sets the error-rate threshold.
    #[must_use]
    pub const fn with_threshold(mut self, percent: f64) -> Self {
        self.error_rate_threshold_percent = percent;
        self
    }

    /// Sets the window capacity.
    #[must_use]
    pub const fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    /// Sets the alert cooldown.
    #[must_use]
    pub const fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.alert_cooldown_secs = secs;
        self
    }

    /// Sets the initially active pool.
    #[must_use]
    pub fn with_default_pool(mut self, pool: impl Into<String>) -> Self {
        self.default_active_pool = pool.into();
        self
    }

    /// Sets the periodic error-rate check interval.
    #[must_use]
    pub const fn with_check_interval(mut self, every: u64) -> Self {
        self.error_rate_check_interval = every;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::InvalidConfig` if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(WatchError::invalid_config(
                "window_capacity must be greater than zero",
            ));
        }

        if self.error_rate_check_interval == 0 {
            return Err(WatchError::invalid_config(
                "error_rate_check_interval must be greater than zero",
            ));
        }

        if !self.error_rate_threshold_percent.is_finite()
            || !(0.0..=100.0).contains(&self.error_rate_threshold_percent)
        {
            return Err(WatchError::invalid_config(format!(
                "error_rate_threshold_percent must be within 0..=100, got {}",
                self.error_rate_threshold_percent
            )));
        }

        if self.default_active_pool.trim().is_empty() {
            return Err(WatchError::invalid_config(
                "default_active_pool cannot be empty",
            ));
        }

        Ok(())
    }
}
