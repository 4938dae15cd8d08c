//! # poolwatch-cli
//!
//! Command-line front end for the poolwatch log watcher.
//!
//! ```text
//! ┌─────────────┐   lines    ┌──────────┐  intents  ┌─────────────────┐
//! │ LineSource  │──(mpsc)───►│  Runner  │──────────►│ AlertDispatcher │
//! │ file/stdin  │            │processor │           │  log / slack    │
//! └─────────────┘            └──────────┘           └─────────────────┘
//! ```
//!
//! The source runs in its own task; the runner is the only consumer, so
//! records are processed strictly in arrival order.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod runner;
pub mod source;

pub use cli::{Cli, LogFormat};
pub use error::SourceError;
pub use runner::{Runner, watch};
pub use source::{FileTailer, LineSource, TailState, read_lines};
