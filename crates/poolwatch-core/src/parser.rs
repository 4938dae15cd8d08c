//! Access-log line parsing.
//!
//! Two dialects are understood:
//! - nginx text lines carrying `pool="..."` and an optional
//!   `upstream_status="..."` field next to the combined log format
//! - nginx `escape=json` lines with `pool`, `status` and `upstream_status` keys
//!
//! Everything else in a line is ignored.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ParseFailure;
use crate::types::LogRecord;

/// `pool="blue"`
static POOL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"pool="([^"]*)""#).unwrap_or_else(|_| unreachable!()));

/// Client status: the 3-digit token right after the closing quote of the request.
static STATUS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""\s(\d{3})(?:\s|$)"#).unwrap_or_else(|_| unreachable!()));

/// `upstream_status="502, 200"`
static UPSTREAM_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"upstream_status="([^"]*)""#).unwrap_or_else(|_| unreachable!())
});

/// Any separately quoted 3-digit token.
static QUOTED_STATUS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(\d{3})""#).unwrap_or_else(|_| unreachable!()));

/// Parser turning raw access-log lines into [`LogRecord`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordParser {
    json_lines: bool,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser {
    /// Creates a parser accepting both text and JSON lines.
    #[must_use]
    pub const fn new() -> Self {
        Self { json_lines: true }
    }

    /// Creates a parser that only understands the text dialect.
    #[must_use]
    pub const fn text_only() -> Self {
        Self { json_lines: false }
    }

    /// Parses a line, stamping it with the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseFailure`] describing why the line was rejected.
    pub fn parse(&self, line: &str) -> Result<LogRecord, ParseFailure> {
        self.parse_at(line, Utc::now())
    }

    /// Parses a line, stamping it with `observed_at`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseFailure`] describing why the line was rejected.
    pub fn parse_at(&self, line: &str, observed_at: DateTime<Utc>) -> Result<LogRecord, ParseFailure> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(ParseFailure::Empty);
        }

        if self.json_lines && trimmed.starts_with('{') {
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
                return Self::parse_json(&obj, observed_at);
            }
            // Truncated JSON falls through to the text rules.
        }

        Self::parse_text(trimmed, observed_at)
    }

    fn parse_text(line: &str, observed_at: DateTime<Utc>) -> Result<LogRecord, ParseFailure> {
        let pool = POOL_REGEX
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|p| !p.trim().is_empty())
            .ok_or(ParseFailure::MissingPool)?;

        let status = STATUS_REGEX
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u16>().ok())
            .ok_or(ParseFailure::MissingStatus)?;

        let upstream = match UPSTREAM_FIELD_REGEX.captures(line).and_then(|c| c.get(1)) {
            Some(field) => parse_upstream_list(field.as_str()),
            None => QUOTED_STATUS_REGEX
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u16>().ok()),
        };

        build_record(pool, status, upstream, observed_at)
    }

    fn parse_json(obj: &Map<String, Value>, observed_at: DateTime<Utc>) -> Result<LogRecord, ParseFailure> {
        let pool = obj
            .get("pool")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or(ParseFailure::MissingPool)?;

        let status = obj
            .get("status")
            .and_then(json_status)
            .ok_or(ParseFailure::MissingStatus)?;

        let upstream = obj.get("upstream_status").and_then(json_status);

        build_record(pool, status, upstream, observed_at)
    }
}

/// An upstream status that is unusable is treated as absent rather than as
/// grounds for rejecting the line.
fn build_record(
    pool: &str,
    status: u16,
    upstream: Option<u16>,
    observed_at: DateTime<Utc>,
) -> Result<LogRecord, ParseFailure> {
    match LogRecord::new(pool, status, upstream, observed_at) {
        Err(ParseFailure::StatusOutOfRange(code)) if upstream == Some(code) && code != status => {
            LogRecord::new(pool, status, None, observed_at)
        }
        other => other,
    }
}

fn json_status(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => parse_upstream_list(s),
        _ => None,
    }
}

/// Parses nginx's `$upstream_status`, which lists one status per attempt
/// (`"502, 200"`, or `"502 : 200"` across upstream groups). The last attempt
/// produced the response. `"-"` means no upstream was contacted.
fn parse_upstream_list(raw: &str) -> Option<u16> {
    raw.rsplit([',', ':'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .filter(|s| *s != "-")
        .and_then(|s| s.parse::<u16>().ok())
}
