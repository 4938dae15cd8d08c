//! Alert delivery for poolwatch.
//!
//! `poolwatch-alerts` takes the [`AlertIntent`]s raised by the engine and
//! delivers them through one or more sinks.
//!
//! # Features
//!
//! - **Sinks**: the [`AlertSink`] trait, with [`LogSink`] and [`SlackWebhookSink`]
//! - **Dispatch**: [`AlertDispatcher`] fans an alert out to every enabled sink;
//!   delivery failures are logged and counted, never propagated
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use poolwatch_alerts::{AlertDispatcher, LogSink};
//! use poolwatch_core::{AlertIntent, AlertKind};
//!
//! # tokio_test_runtime();
//! # fn tokio_test_runtime() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let dispatcher = AlertDispatcher::new().with_sink(LogSink::default());
//! let alert = AlertIntent::new(AlertKind::Failover, "Failover detected: blue → green", Utc::now());
//!
//! let report = dispatcher.dispatch(&alert).await;
//! assert_eq!(report.delivered, 1);
//! # });
//! # }
//! ```
//!
//! [`AlertIntent`]: poolwatch_core::AlertIntent

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod dispatcher;
pub mod error;
pub mod sink;
pub mod slack;

// Re-export main types at crate root
pub use dispatcher::{AlertDispatcher, DispatchReport};
pub use error::{Result, SinkError};
pub use sink::{AlertSink, DeliveryReceipt, LogSink};
pub use slack::{SlackAttachment, SlackConfig, SlackField, SlackPayload, SlackWebhookSink};
