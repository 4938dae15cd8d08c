//! # poolwatch-core
//!
//! Stream-analysis engine for blue/green access logs.
//!
//! This crate provides:
//!
//! - [`RecordParser`]: turns raw access-log lines into [`LogRecord`]s
//! - [`SlidingWindow`]: bounded FIFO history with an upstream 5xx rate
//! - [`FailoverDetector`]: tracks the active pool and reports transitions
//! - [`AlertDebouncer`]: per-kind cooldown gate
//! - [`StreamProcessor`]: drives the above, one record at a time, and emits
//!   [`AlertIntent`]s
//!
//! Acquiring lines and delivering alerts are left to the caller.
//!
//! ## Example
//!
//! ```rust
//! use poolwatch_core::{AlertKind, StreamProcessor, WatcherConfig};
//!
//! let config = WatcherConfig::default().with_window_capacity(10);
//! let mut processor = StreamProcessor::new(config).unwrap();
//!
//! let line = r#"10.0.0.7 - - [10/Oct/2025:13:55:36 +0000] "GET / HTTP/1.1" 200 5 "-" "curl" pool="green""#;
//! let alerts = processor.ingest_line(line).unwrap();
//!
//! assert_eq!(alerts.len(), 1);
//! assert_eq!(alerts[0].kind, AlertKind::Failover);
//! assert_eq!(processor.active_pool(), "green");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod failover;
pub mod parser;
pub mod processor;
pub mod types;
pub mod window;

// Re-export main types
pub use config::WatcherConfig;
pub use debounce::AlertDebouncer;
pub use error::{ParseFailure, Result, WatchError};
pub use failover::{FailoverDetector, FailoverEvent};
pub use parser::RecordParser;
pub use processor::{ProcessorStats, StreamProcessor};
pub use types::{AlertIntent, AlertKind, AlertSeverity, LogRecord, MAX_STATUS, MIN_STATUS};
pub use window::SlidingWindow;
