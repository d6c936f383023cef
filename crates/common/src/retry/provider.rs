//! Max-attempts providers and the explicit resolve-with-fallback step
//!
//! A provider may be asynchronous and fallible (an environment variable, a
//! remote config). Strategies never propagate provider failures: they call
//! [`resolve_max_attempts`], which returns either the provided value or a
//! [`ResolvedMaxAttempts::Fallback`] recording why the default was used.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::constants::DEFAULT_MAX_ATTEMPTS;
use super::error::{RetryError, RetryResult};

/// Supplies the attempt ceiling (initial attempt included).
#[async_trait]
pub trait MaxAttemptsProvider: Send + Sync {
    async fn max_attempts(&self) -> RetryResult<u32>;
}

#[async_trait]
impl MaxAttemptsProvider for u32 {
    async fn max_attempts(&self) -> RetryResult<u32> {
        Ok(*self)
    }
}

#[async_trait]
impl<P: MaxAttemptsProvider + ?Sized> MaxAttemptsProvider for Arc<P> {
    async fn max_attempts(&self) -> RetryResult<u32> {
        (**self).max_attempts().await
    }
}

/// Adapts a synchronous closure into a provider.
pub struct FnMaxAttempts<F>(F);

impl<F> FnMaxAttempts<F>
where
    F: Fn() -> RetryResult<u32> + Send + Sync,
{
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for FnMaxAttempts<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMaxAttempts(..)")
    }
}

#[async_trait]
impl<F> MaxAttemptsProvider for FnMaxAttempts<F>
where
    F: Fn() -> RetryResult<u32> + Send + Sync,
{
    async fn max_attempts(&self) -> RetryResult<u32> {
        (self.0)()
    }
}

/// Result of resolving a provider, keeping the fallback visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMaxAttempts {
    Provided(u32),
    Fallback { attempts: u32, reason: String },
}

impl ResolvedMaxAttempts {
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Provided(attempts) | Self::Fallback { attempts, .. } => *attempts,
        }
    }

    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Resolve the attempt ceiling, substituting [`DEFAULT_MAX_ATTEMPTS`] when
/// the provider fails or returns zero. Fallbacks are logged at `warn`.
pub async fn resolve_max_attempts<P>(provider: &P) -> ResolvedMaxAttempts
where
    P: MaxAttemptsProvider + ?Sized,
{
    let failure = match provider.max_attempts().await {
        Ok(0) => RetryError::provider_unavailable("max attempts must be at least 1, got 0"),
        Ok(attempts) => return ResolvedMaxAttempts::Provided(attempts),
        Err(err) => err,
    };

    warn!(
        default = DEFAULT_MAX_ATTEMPTS,
        error = %failure,
        "Max attempts provider could not resolve, using default"
    );
    ResolvedMaxAttempts::Fallback { attempts: DEFAULT_MAX_ATTEMPTS, reason: failure.to_string() }
}
