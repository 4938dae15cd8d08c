//! Bounded FIFO history of recent requests.

#![allow(clippy::cast_precision_loss)]

use crate::error::{Result, WatchError};
use crate::types::LogRecord;

/// A capacity-bounded ring buffer of [`LogRecord`]s.
///
/// Pushing into a full window evicts the oldest record first. The number of
/// upstream 5xx records is maintained on every push so [`error_rate`] is O(1).
///
/// [`error_rate`]: SlidingWindow::error_rate
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    slots: Vec<LogRecord>,
    /// Index of the oldest record once the buffer has wrapped.
    head: usize,
    capacity: usize,
    error_count: usize,
}

impl SlidingWindow {
    /// Creates an empty window holding at most `capacity` records.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::InvalidConfig` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(WatchError::invalid_config(
                "window capacity must be greater than zero",
            ));
        }

        Ok(Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
            error_count: 0,
        })
    }

    /// Appends a record, evicting the oldest one when full.
    ///
    /// Returns the evicted record, if any.
    pub fn push(&mut self, record: LogRecord) -> Option<LogRecord> {
        if record.is_server_error() {
            self.error_count += 1;
        }

        if self.slots.len() < self.capacity {
            self.slots.push(record);
            return None;
        }

        let evicted = std::mem::replace(&mut self.slots[self.head], record);
        self.head = (self.head + 1) % self.capacity;
        if evicted.is_server_error() {
            self.error_count -= 1;
        }
        Some(evicted)
    }

    /// Percentage of records whose upstream answered with a 5xx.
    ///
    /// An empty window has an error rate of `0.0`.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.slots.is_empty() {
            return 0.0;
        }
        100.0 * self.error_count as f64 / self.slots.len() as f64
    }

    /// Number of records currently held.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns true once the window holds `capacity` records.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Maximum number of records held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of upstream 5xx records currently held.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    /// Iterates from the oldest to the newest record.
    pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }
}
