//! Alert sinks.
//!
//! This module provides the [`AlertSink`] trait and the [`LogSink`]
//! implementation, which reports alerts through `tracing`.

use std::fmt;

use async_trait::async_trait;
use poolwatch_core::{AlertIntent, AlertSeverity};
use tracing::{error, warn};

use crate::error::Result;

/// Outcome of a delivery attempt that reached its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// The sink that handled the alert.
    pub sink: String,
    /// Response status code, if the transport has one.
    pub status_code: Option<u16>,
    /// Optional detail about the delivery.
    pub message: Option<String>,
}

impl DeliveryReceipt {
    /// Creates a receipt for the named sink.
    #[must_use]
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            status_code: None,
            message: None,
        }
    }

    /// Sets the status code.
    #[must_use]
    pub const fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// Destination for alert intents.
///
/// Implement this trait to deliver alerts to another service.
#[async_trait]
pub trait AlertSink: Send + Sync + fmt::Debug {
    /// Returns the name of this sink.
    fn name(&self) -> &str;

    /// Delivers an alert.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the alert could not be delivered.
    async fn send(&self, intent: &AlertIntent) -> Result<DeliveryReceipt>;

    /// Returns true if this sink is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A sink that writes alerts to the log.
///
/// Used when no remote endpoint is configured.
#[derive(Debug, Clone)]
pub struct LogSink {
    name: String,
    enabled: bool,
}

impl LogSink {
    /// Creates a new log sink.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }

    /// Sets whether the sink is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, intent: &AlertIntent) -> Result<DeliveryReceipt> {
        let fields = serde_json::to_string(&intent.fields)?;
        match intent.severity() {
            AlertSeverity::Critical => error!(
                alert_id = %intent.id,
                kind = %intent.kind,
                fields = %fields,
                "ALERT: {}",
                intent.summary
            ),
            AlertSeverity::Warning => warn!(
                alert_id = %intent.id,
                kind = %intent.kind,
                fields = %fields,
                "ALERT: {}",
                intent.summary
            ),
        }

        Ok(DeliveryReceipt::new(self.name()).with_message("logged to tracing"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
