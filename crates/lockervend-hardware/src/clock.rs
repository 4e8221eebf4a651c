//! Bus activity clock.
//!
//! Every successful exchange touches the clock; the watchdog reads it to
//! decide whether the peripheral has gone silent. Timestamps are kept as
//! milliseconds since the clock was created on tokio's clock, so paused-time
//! tests drive the watchdog deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Monotonic last-activity timestamp shared between tasks.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityClock {
    /// Create a clock whose last activity is "now".
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    /// Record activity at the current instant.
    ///
    /// The stored value never moves backwards, even when two tasks race.
    pub fn touch(&self) {
        let now = self.millis_since_origin(Instant::now());
        self.last_ms.fetch_max(now, Ordering::AcqRel);
    }

    /// Instant of the most recent activity.
    pub fn last(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_ms.load(Ordering::Acquire))
    }

    /// Time elapsed since the most recent activity, as of `now`.
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last())
    }

    fn millis_since_origin(&self, instant: Instant) -> u64 {
        u64::try_from(instant.duration_since(self.origin).as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
