//! Retry strategies for calls to remote services
//!
//! A [`RetryStrategy`] is shared by every call a client makes. Each logical
//! call takes an initial [`RetryToken`], and every failure trades the current
//! token for the next one (or for a [`RetryError`] explaining why no retry is
//! allowed). Retries draw on a shared [`RetryCapacity`] ledger, so a failing
//! dependency cannot turn into a retry storm.
//!
//! Strategies:
//! - [`StandardRetryStrategy`]: full-jitter exponential backoff
//! - [`ConfiguredRetryStrategy`]: same accounting, caller-chosen delay
//! - [`AdaptiveRetryStrategy`]: standard retries paced by a [`RateLimiter`]
//!
//! [`RetryExecutor`] runs an async operation under a strategy.

pub mod adaptive;
pub mod backoff;
pub mod capacity;
pub mod configured;
pub mod constants;
pub mod error;
pub mod executor;
pub mod provider;
pub mod rate_limiter;
pub mod standard;
pub mod strategy;
pub mod token;
pub mod tracing;
pub mod types;

pub use adaptive::AdaptiveRetryStrategy;
pub use backoff::{
    BackoffStrategy, ConfiguredBackoff, ExponentialBackoff, FixedJitter, JitterSource,
    SeededJitter, ThreadRngJitter,
};
pub use capacity::{RetryCapacity, RetryQuotaConfig};
pub use configured::ConfiguredRetryStrategy;
pub use error::{RetryError, RetryFailure, RetryMetadata, RetryResult};
pub use executor::{AttemptContext, FnClassifier, Retried, RetryClassifier, RetryExecutor};
pub use provider::{resolve_max_attempts, FnMaxAttempts, MaxAttemptsProvider, ResolvedMaxAttempts};
pub use rate_limiter::{
    DefaultRateLimiter, RateLimiter, RateLimiterConfig, RateLimiterConfigBuilder,
    RateLimiterSnapshot,
};
pub use standard::{StandardRetryStrategy, StandardRetryStrategyBuilder};
pub use strategy::RetryStrategy;
pub use token::RetryToken;
pub use tracing::{RetrySpan, RetryTracer};
pub use types::{RetryErrorInfo, RetryErrorType, RetryMode};
