//! Shared building blocks for ebbflow crates.
//!
//! # Feature Tiers
//!
//! - `foundation`: errors, classification macros, serde helpers
//! - `runtime` (default): clocks and the async retry core

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
#[macro_use]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod retry;
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use retry::{
    AdaptiveRetryStrategy, ConfiguredRetryStrategy, DefaultRateLimiter, RateLimiter,
    RetryErrorInfo, RetryErrorType, RetryExecutor, RetryFailure, RetryMode, RetryStrategy,
    RetryToken, StandardRetryStrategy,
};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
#[cfg(feature = "foundation")]
pub use utils::serde::{duration_millis, option_duration_millis};
