//! Wall-clock source used to timestamp notifications.

use chrono::{DateTime, Utc};

/// Supplies the time stamped onto client-facing notifications.
///
/// Turn countdowns do not read this clock; they run on the tokio timer so
/// that tests can pause and advance time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
