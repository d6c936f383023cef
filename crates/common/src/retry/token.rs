// Retry token value object
use std::time::Duration;

use super::constants::{DEFAULT_RETRY_DELAY_BASE, MAXIMUM_RETRY_DELAY};

/// Outcome of one retry decision.
///
/// Tokens are immutable: a refresh always produces a new token, and the
/// in-flight call holds only the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryToken {
    retry_count: u32,
    retry_delay: Duration,
    retry_cost: Option<u32>,
}

impl RetryToken {
    /// Token for the first attempt of a call. Carries no cost.
    pub const fn initial() -> Self {
        Self { retry_count: 0, retry_delay: DEFAULT_RETRY_DELAY_BASE, retry_cost: None }
    }

    pub(crate) const fn new(retry_count: u32, retry_delay: Duration, retry_cost: Option<u32>) -> Self {
        Self { retry_count, retry_delay, retry_cost }
    }

    /// Retries granted so far for this call
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay to wait before the next attempt, never above
    /// [`MAXIMUM_RETRY_DELAY`]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay.min(MAXIMUM_RETRY_DELAY)
    }

    /// Capacity charged to this call so far, `None` if it never retried
    pub const fn retry_cost(&self) -> Option<u32> {
        self.retry_cost
    }
}

impl Default for RetryToken {
    fn default() -> Self {
        Self::initial()
    }
}
