//! Clock abstraction so time-dependent retry logic can be driven
//! deterministically in tests.
//!
//! ```
//! use std::time::Duration;
//!
//! use ebbflow_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic timestamp, used for measuring intervals.
    fn now(&self) -> Instant;

    /// Wall-clock time, used to compare against absolute hints such as
    /// `Retry-After` dates.
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch.
    fn millis_since_epoch(&self) -> u64 {
        let elapsed = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default();
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock.
///
/// Clones share the same elapsed time, so a test can hand one clone to a
/// rate limiter and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_system_time: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a clock frozen at the current real time.
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Create a clock whose wall-clock reading starts at `system_time`.
    pub fn starting_at(system_time: SystemTime) -> Self {
        Self {
            start: Instant::now(),
            base_system_time: system_time,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Move time forward by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the total elapsed time since creation.
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Total simulated time since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}
