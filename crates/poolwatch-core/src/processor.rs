//! Per-record orchestration of the detectors.
//!
//! The [`StreamProcessor`] owns all mutable engine state. Each call to
//! [`StreamProcessor::ingest_record`] applies one record completely before
//! returning, so stopping between calls never leaves a partial update behind.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::WatcherConfig;
use crate::debounce::AlertDebouncer;
use crate::error::{ParseFailure, Result};
use crate::failover::{FailoverDetector, FailoverEvent};
use crate::parser::RecordParser;
use crate::types::{AlertIntent, AlertKind, LogRecord};
use crate::window::SlidingWindow;

/// Diagnostic counters kept by the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    /// Lines parsed into records.
    pub lines_accepted: u64,
    /// Lines rejected by the parser.
    pub lines_rejected: u64,
    /// Pool transitions observed, alerted or not.
    pub failover_events: u64,
    /// Error-rate evaluations performed.
    pub error_rate_checks: u64,
    /// Alert intents emitted.
    pub alerts_emitted: u64,
    /// Alerts held back by the cooldown.
    pub alerts_suppressed: u64,
}

/// Drives parsing, windowing, failover detection and debouncing.
#[derive(Debug)]
pub struct StreamProcessor {
    config: WatcherConfig,
    parser: RecordParser,
    window: SlidingWindow,
    failover: FailoverDetector,
    debouncer: AlertDebouncer,
    stats: ProcessorStats,
    /// Set once the error rate has been checked on a full window.
    fill_checked: bool,
}

impl StreamProcessor {
    /// Creates a processor from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: WatcherConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            parser: RecordParser::new(),
            window: SlidingWindow::new(config.window_capacity)?,
            failover: FailoverDetector::new(config.default_active_pool.clone()),
            debouncer: AlertDebouncer::from_secs(config.alert_cooldown_secs),
            stats: ProcessorStats::default(),
            fill_checked: false,
            config,
        })
    }

    /// Replaces the line parser.
    #[must_use]
    pub fn with_parser(mut self, parser: RecordParser) -> Self {
        self.parser = parser;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Returns the request window.
    #[must_use]
    pub const fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Returns the pool currently considered active.
    #[must_use]
    pub fn active_pool(&self) -> &str {
        self.failover.current_pool()
    }

    /// Returns the alert debouncer.
    #[must_use]
    pub const fn debouncer(&self) -> &AlertDebouncer {
        &self.debouncer
    }

    /// Returns the diagnostic counters.
    #[must_use]
    pub const fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Parses and ingests a raw line, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseFailure`] if the line was rejected. No engine state
    /// other than the rejection counter changes in that case.
    pub fn ingest_line(&mut self, line: &str) -> std::result::Result<Vec<AlertIntent>, ParseFailure> {
        self.ingest_line_at(line, Utc::now())
    }

    /// Parses and ingests a raw line observed at `now`.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseFailure`] if the line was rejected.
    pub fn ingest_line_at(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<AlertIntent>, ParseFailure> {
        match self.parser.parse_at(line, now) {
            Ok(record) => Ok(self.ingest_record(record, now)),
            Err(failure) => {
                self.stats.lines_rejected += 1;
                debug!(reason = %failure, "rejected log line");
                Err(failure)
            }
        }
    }

    /// Applies one record and returns the alerts it raised.
    pub fn ingest_record(&mut self, record: LogRecord, now: DateTime<Utc>) -> Vec<AlertIntent> {
        self.stats.lines_accepted += 1;
        let pool = record.pool().to_string();
        self.window.push(record);

        let mut alerts = Vec::new();

        if let Some(event) = self.failover.check(&pool, now) {
            self.stats.failover_events += 1;
            if let Some(intent) = self.gate(AlertKind::Failover, now, || failover_intent(&event)) {
                alerts.push(intent);
            }
        }

        if self.error_rate_check_due() {
            self.stats.error_rate_checks += 1;
            let rate = self.window.error_rate();
            let threshold = self.config.error_rate_threshold_percent;
            debug!(
                rate,
                threshold,
                window = self.window.size(),
                capacity = self.window.capacity(),
                "checked error rate"
            );

            if rate > threshold {
                let window_size = self.window.size();
                let active_pool = self.failover.current_pool().to_string();
                let intent = self.gate(AlertKind::ErrorRate, now, || {
                    error_rate_intent(rate, threshold, window_size, &active_pool, now)
                });
                if let Some(intent) = intent {
                    alerts.push(intent);
                }
            }
        }

        alerts
    }

    /// Periodically, and once when the window first fills up.
    fn error_rate_check_due(&mut self) -> bool {
        let periodic = self.stats.lines_accepted % self.config.error_rate_check_interval == 0;
        let just_filled = !self.fill_checked && self.window.is_full();
        if just_filled {
            self.fill_checked = true;
        }
        periodic || just_filled
    }

    fn gate(
        &mut self,
        kind: AlertKind,
        now: DateTime<Utc>,
        build: impl FnOnce() -> AlertIntent,
    ) -> Option<AlertIntent> {
        if !self.debouncer.should_fire(kind, now) {
            self.stats.alerts_suppressed += 1;
            debug!(
                kind = %kind,
                cooldown_secs = self.debouncer.cooldown().num_seconds(),
                "alert suppressed by cooldown"
            );
            return None;
        }

        let intent = build();
        self.debouncer.record_fired(kind, now);
        self.stats.alerts_emitted += 1;
        info!(kind = %kind, summary = %intent.summary, "raising alert");
        Some(intent)
    }
}

fn failover_intent(event: &FailoverEvent) -> AlertIntent {
    AlertIntent::new(
        AlertKind::Failover,
        format!("Failover detected: {} → {}", event.from, event.to),
        event.at,
    )
    .with_field("from", event.from.clone())
    .with_field("to", event.to.clone())
}

fn error_rate_intent(
    rate: f64,
    threshold: f64,
    window_size: usize,
    active_pool: &str,
    now: DateTime<Utc>,
) -> AlertIntent {
    AlertIntent::new(
        AlertKind::ErrorRate,
        format!("High error rate: {rate:.1}% (threshold: {threshold:.1}%)"),
        now,
    )
    .with_field("rate", rate)
    .with_field("threshold", threshold)
    .with_field("window_size", window_size)
    .with_field("active_pool", active_pool)
}
