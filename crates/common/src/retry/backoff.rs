//! Delay computation between retry attempts
//!
//! [`ExponentialBackoff`] implements full-jitter exponential backoff:
//! `floor(min(MAXIMUM_RETRY_DELAY, random * 2^retry_count * delay_base))`.
//! The random factor comes from an injected [`JitterSource`] so tests can
//! pin it to an exact value or a seeded sequence.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::constants::{DEFAULT_RETRY_DELAY_BASE, MAXIMUM_RETRY_DELAY};

/// Computes the wait before the next attempt.
pub trait BackoffStrategy: Send + Sync {
    /// `retry_count` is the count carried by the token being refreshed
    /// (0 before the first retry). `delay_base` is chosen by the strategy
    /// from the error type.
    fn compute_next_backoff_delay(&self, retry_count: u32, delay_base: Duration) -> Duration;
}

/// Source of uniformly distributed factors in `[0, 1)`.
pub trait JitterSource: Send + Sync {
    fn next_factor(&self) -> f64;
}

/// Thread-local RNG; the production jitter source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn next_factor(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Reproducible jitter from a seed.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl JitterSource for SeededJitter {
    fn next_factor(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Constant jitter factor, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(f64);

impl FixedJitter {
    pub fn new(factor: f64) -> Self {
        Self(if factor.is_finite() { factor.clamp(0.0, 1.0) } else { 0.0 })
    }
}

impl JitterSource for FixedJitter {
    fn next_factor(&self) -> f64 {
        self.0
    }
}

/// Full-jitter exponential backoff capped at [`MAXIMUM_RETRY_DELAY`].
#[derive(Clone)]
pub struct ExponentialBackoff {
    jitter: Arc<dyn JitterSource>,
    max_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::with_jitter(ThreadRngJitter)
    }

    pub fn with_jitter<J: JitterSource + 'static>(jitter: J) -> Self {
        Self { jitter: Arc::new(jitter), max_delay: MAXIMUM_RETRY_DELAY }
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoff").field("max_delay", &self.max_delay).finish_non_exhaustive()
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn compute_next_backoff_delay(&self, retry_count: u32, delay_base: Duration) -> Duration {
        let ceiling_ms = self.max_delay.as_millis() as f64;
        // Anything past 2^64 is already far beyond the ceiling; capping keeps
        // the product finite so a zero factor still yields zero.
        let exponent = i32::try_from(retry_count.min(64)).unwrap_or(64);
        let scaled = self.jitter.next_factor() * 2f64.powi(exponent) * delay_base.as_millis() as f64;
        let millis = scaled.min(ceiling_ms).floor();
        if millis.is_nan() || millis <= 0.0 {
            return Duration::ZERO;
        }
        // Bounded by the ceiling above, so the cast cannot truncate
        Duration::from_millis(millis as u64)
    }
}

/// Caller-supplied delay used by
/// [`ConfiguredRetryStrategy`](super::configured::ConfiguredRetryStrategy).
#[derive(Clone)]
pub enum ConfiguredBackoff {
    /// Same delay before every retry
    Constant(Duration),
    /// Delay as a function of the retry being scheduled (1 for the first)
    Function(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl ConfiguredBackoff {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Delay for the retry numbered `retry_count` (1-based).
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        match self {
            Self::Constant(delay) => *delay,
            Self::Function(f) => f(retry_count),
        }
    }
}

impl Default for ConfiguredBackoff {
    fn default() -> Self {
        Self::Constant(DEFAULT_RETRY_DELAY_BASE)
    }
}

impl fmt::Debug for ConfiguredBackoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(delay) => f.debug_tuple("Constant").field(delay).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl BackoffStrategy for ConfiguredBackoff {
    fn compute_next_backoff_delay(&self, retry_count: u32, _delay_base: Duration) -> Duration {
        self.delay_for(retry_count.saturating_add(1))
    }
}
