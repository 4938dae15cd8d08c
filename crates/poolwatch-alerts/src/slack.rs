//! Slack incoming-webhook sink.

use std::time::Duration;

use async_trait::async_trait;
use poolwatch_core::{AlertIntent, AlertKind, AlertSeverity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SinkError};
use crate::sink::{AlertSink, DeliveryReceipt};

/// Longest response body kept in a [`SinkError::Rejected`].
const MAX_ERROR_BODY: usize = 256;

/// Configuration for a Slack webhook sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// The sink name used in logs.
    pub name: String,
    /// Incoming webhook URL.
    pub webhook_url: String,
    /// Optional username override.
    pub username: Option<String>,
    /// Optional channel override.
    pub channel: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether the sink is enabled.
    pub enabled: bool,
}

impl SlackConfig {
    /// Creates a configuration for the given webhook URL.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::NotConfigured` if the URL is empty.
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let webhook_url = webhook_url.into();
        if webhook_url.trim().is_empty() {
            return Err(SinkError::NotConfigured(
                "slack webhook url cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            name: "slack".to_string(),
            webhook_url,
            username: None,
            channel: None,
            timeout_secs: 10,
            enabled: true,
        })
    }

    /// Sets the username override.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the channel override.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets whether the sink is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Posts alerts to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackWebhookSink {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackWebhookSink {
    /// Creates a sink from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Http` if the HTTP client cannot be built.
    pub fn new(config: SlackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Returns the webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.webhook_url
    }

    /// Builds the webhook payload for an alert.
    #[must_use]
    pub fn format_payload(&self, intent: &AlertIntent) -> SlackPayload {
        let text = format!("{} {}", kind_emoji(intent.kind), intent.summary);

        let fields = intent
            .fields
            .iter()
            .map(|(key, value)| SlackField {
                title: key.clone(),
                value: render_value(value),
                short: true,
            })
            .collect();

        let attachment = SlackAttachment {
            fallback: text.clone(),
            color: severity_color(intent.severity()).to_string(),
            fields,
            footer: format!(
                "{} | {}",
                intent.kind,
                intent.raised_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            ts: intent.raised_at.timestamp(),
        };

        SlackPayload {
            text,
            username: self.config.username.clone(),
            channel: self.config.channel.clone(),
            attachments: vec![attachment],
        }
    }
}

#[async_trait]
impl AlertSink for SlackWebhookSink {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn send(&self, intent: &AlertIntent) -> Result<DeliveryReceipt> {
        let payload = self.format_payload(intent);
        debug!(sink = %self.name(), alert_id = %intent.id, "posting slack webhook");

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(DeliveryReceipt::new(self.name()).with_status_code(status.as_u16()))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Slack incoming-webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackPayload {
    /// Main message text.
    pub text: String,
    /// Username override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Channel override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Rich attachments.
    pub attachments: Vec<SlackAttachment>,
}

/// A Slack message attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackAttachment {
    /// Plain-text summary for clients that cannot render attachments.
    pub fallback: String,
    /// Sidebar colour.
    pub color: String,
    /// Structured fields.
    pub fields: Vec<SlackField>,
    /// Footer text.
    pub footer: String,
    /// Unix timestamp shown next to the footer.
    pub ts: i64,
}

/// A field inside a Slack attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackField {
    /// Field title.
    pub title: String,
    /// Field value.
    pub value: String,
    /// Whether the field is short enough to sit side by side.
    pub short: bool,
}

const fn kind_emoji(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::Failover => "🔄",
        AlertKind::ErrorRate => "❌",
    }
}

const fn severity_color(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Warning => "#f39c12",
        AlertSeverity::Critical => "#e74c3c",
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.2}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
