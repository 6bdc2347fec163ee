//! Clock abstraction so the Scorer and Ticket Manager can be tested
//! deterministically instead of racing the wall clock.

use chrono::{DateTime, Utc};

/// Abstracts "now" so tests can control time.
pub trait Clock: Send + Sync {
    /// Current time as an RFC3339 string, used for `evaluatedAt`,
    /// `createdAt`, `resolvedAt`.
    fn now_rfc3339(&self) -> String;

    /// Current time as epoch milliseconds, used where readings carry
    /// millisecond timestamps.
    fn now_epoch_millis(&self) -> i64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        Utc::now().to_rfc3339()
    }

    fn now_epoch_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Fixed/advanceable clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    pub fn from_epoch_millis(millis: i64) -> Self {
        let timestamp = DateTime::from_timestamp_millis(millis).expect("valid timestamp");
        Self { timestamp }
    }

    pub fn set_time(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    pub fn advance_seconds(&mut self, seconds: i64) {
        self.timestamp += chrono::Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339()
    }

    fn now_epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
