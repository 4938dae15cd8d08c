//! Command-line argument parsing with clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use poolwatch_alerts::{AlertDispatcher, LogSink, SlackConfig, SlackWebhookSink};
use poolwatch_core::{RecordParser, WatcherConfig};

use crate::source::{FileTailer, LineSource};

/// poolwatch - watch blue/green access logs for failovers and error spikes.
#[derive(Parser, Debug, Clone)]
#[command(name = "poolwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Access log to follow.
    #[arg(long, env = "NGINX_LOG_FILE", default_value = "/var/log/nginx/access.log")]
    pub log_file: PathBuf,

    /// Read lines from standard input instead of following a file.
    #[arg(long)]
    pub stdin: bool,

    /// Skip lines already in the log file when it is first opened.
    #[arg(long)]
    pub from_end: bool,

    /// Parse every line as the nginx text format, never as JSON.
    #[arg(long)]
    pub text_only: bool,

    /// Error-rate alert threshold, in percent.
    #[arg(long, env = "ERROR_RATE_THRESHOLD", default_value_t = 2.0)]
    pub error_rate_threshold: f64,

    /// Number of recent requests kept for the error rate.
    #[arg(long, env = "WINDOW_SIZE", default_value_t = 200)]
    pub window_size: usize,

    /// Minimum seconds between two alerts of the same kind.
    #[arg(long, env = "ALERT_COOLDOWN_SEC", default_value_t = 300)]
    pub alert_cooldown_sec: u64,

    /// Pool assumed active before the first request is seen.
    #[arg(long, env = "ACTIVE_POOL", default_value = "blue")]
    pub active_pool: String,

    /// Evaluate the error rate every this many accepted requests.
    #[arg(long, env = "ERROR_RATE_CHECK_INTERVAL", default_value_t = 10)]
    pub check_interval: u64,

    /// Slack incoming webhook; alerts are only logged when unset.
    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    /// Sleep at end of file, in milliseconds.
    #[arg(long, env = "POOLWATCH_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Sleep while waiting for the log file to exist, in seconds.
    #[arg(long, env = "POOLWATCH_WAIT_INTERVAL_SECS", default_value_t = 2)]
    pub wait_interval_secs: u64,

    /// Capacity of the line queue between reader and processor.
    #[arg(long, default_value_t = 1024)]
    pub channel_capacity: usize,

    /// Diagnostic log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Diagnostic log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl Cli {
    /// Builds the core configuration from the parsed arguments.
    #[must_use]
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig::default()
            .with_threshold(self.error_rate_threshold)
            .with_window_capacity(self.window_size)
            .with_cooldown_secs(self.alert_cooldown_sec)
            .with_default_pool(self.active_pool.clone())
            .with_check_interval(self.check_interval)
    }

    /// Builds the line parser.
    #[must_use]
    pub const fn record_parser(&self) -> RecordParser {
        if self.text_only {
            RecordParser::text_only()
        } else {
            RecordParser::new()
        }
    }

    /// Returns the webhook URL, treating an empty value as unset.
    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        self.slack_webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Builds the alert dispatcher.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` if the Slack client cannot be created.
    pub fn build_dispatcher(&self) -> poolwatch_alerts::Result<AlertDispatcher> {
        let dispatcher = match self.webhook_url() {
            Some(url) => {
                let sink = SlackWebhookSink::new(SlackConfig::new(url)?)?;
                AlertDispatcher::new().with_sink(sink)
            }
            None => AlertDispatcher::new().with_sink(LogSink::default()),
        };
        Ok(dispatcher)
    }

    /// Builds the line source.
    #[must_use]
    pub fn line_source(&self) -> LineSource {
        if self.stdin {
            return LineSource::Stdin;
        }

        LineSource::File(
            FileTailer::new(self.log_file.clone())
                .with_poll_interval(Duration::from_millis(self.poll_interval_ms.max(1)))
                .with_wait_interval(Duration::from_secs(self.wait_interval_secs.max(1)))
                .from_end(self.from_end),
        )
    }
}
