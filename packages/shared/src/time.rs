//! Time-related utilities with clock abstraction for testability.
//!
//! All timestamps are Unix milliseconds in UTC. Server-assigned message
//! timestamps come from a [`Clock`] so that tests can pin them.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp in UTC (milliseconds)
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        get_utc_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Manually driven clock for tests that need time to move.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// Move the clock by `delta_millis` (may be negative to simulate skew).
    pub fn advance(&self, delta_millis: i64) {
        self.now.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Get current Unix timestamp in UTC (milliseconds)
pub fn get_utc_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to RFC 3339 format in UTC.
///
/// Out-of-range values fall back to the Unix epoch.
pub fn timestamp_to_rfc3339(timestamp_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
