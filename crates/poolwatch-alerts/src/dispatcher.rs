//! Fan-out of alert intents to every configured sink.

use std::sync::Arc;

use poolwatch_core::AlertIntent;
use tracing::{debug, error, info};

use crate::sink::AlertSink;

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Sinks that accepted the alert.
    pub delivered: usize,
    /// Sinks that failed to deliver it.
    pub failed: usize,
    /// Sinks skipped because they are disabled.
    pub skipped: usize,
}

impl DispatchReport {
    /// Returns true if at least one sink delivered the alert.
    #[must_use]
    pub const fn any_delivered(&self) -> bool {
        self.delivered > 0
    }
}

/// Sends alert intents to a set of sinks.
///
/// Delivery is best-effort: failures are logged and counted, never returned.
#[derive(Debug, Default, Clone)]
pub struct AlertDispatcher {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl AlertSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Adds a shared sink.
    pub fn add_sink(&mut self, sink: Arc<dyn AlertSink>) {
        self.sinks.push(sink);
    }

    /// Returns the number of sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Returns the names of all sinks.
    #[must_use]
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Delivers an alert to every enabled sink, in order.
    pub async fn dispatch(&self, intent: &AlertIntent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for sink in &self.sinks {
            if !sink.is_enabled() {
                debug!(sink = %sink.name(), "sink disabled, skipping");
                report.skipped += 1;
                continue;
            }

            match sink.send(intent).await {
                Ok(receipt) => {
                    debug!(
                        sink = %receipt.sink,
                        alert_id = %intent.id,
                        status = ?receipt.status_code,
                        "alert delivered"
                    );
                    report.delivered += 1;
                }
                Err(e) => {
                    error!(
                        sink = %sink.name(),
                        alert_id = %intent.id,
                        kind = %intent.kind,
                        error = %e,
                        "failed to deliver alert"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.delivered == 0 && report.failed == 0 {
            info!(kind = %intent.kind, summary = %intent.summary, "no enabled sinks for alert");
        }

        report
    }
}
