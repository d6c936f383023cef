// Standard retries with a caller-chosen delay
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backoff::ConfiguredBackoff;
use super::capacity::RetryCapacity;
use super::error::RetryResult;
use super::provider::MaxAttemptsProvider;
use super::standard::StandardRetryStrategy;
use super::strategy::RetryStrategy;
use super::token::RetryToken;
use super::types::{RetryErrorInfo, RetryMode};
use crate::time::{Clock, SystemClock};

/// [`StandardRetryStrategy`] with the backoff replaced by a constant or a
/// function of the retry number.
///
/// Eligibility, capacity accounting and retry-after hints behave exactly as
/// in the standard strategy.
///
/// ```
/// use std::time::Duration;
///
/// use ebbflow_common::retry::{ConfiguredRetryStrategy, RetryErrorInfo, RetryStrategy};
///
/// # tokio_test::block_on(async {
/// let strategy =
///     ConfiguredRetryStrategy::with_delay_fn(4, |retry| Duration::from_millis(100 * u64::from(retry)));
/// let token = strategy.acquire_initial_retry_token().await;
/// let token = strategy.refresh_retry_token_for_retry(&token, &RetryErrorInfo::transient()).await.unwrap();
/// assert_eq!(token.retry_delay(), Duration::from_millis(100));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ConfiguredRetryStrategy {
    inner: StandardRetryStrategy,
    backoff: ConfiguredBackoff,
}

impl ConfiguredRetryStrategy {
    /// Constant 100ms delay between retries.
    pub fn new<P>(max_attempts: P) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        Self::with_backoff(max_attempts, ConfiguredBackoff::default())
    }

    pub fn with_constant_delay<P>(max_attempts: P, delay: Duration) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        Self::with_backoff(max_attempts, ConfiguredBackoff::Constant(delay))
    }

    /// `delay_fn` receives the number of the retry being scheduled, starting
    /// at 1.
    pub fn with_delay_fn<P, F>(max_attempts: P, delay_fn: F) -> Self
    where
        P: MaxAttemptsProvider + 'static,
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::with_backoff(max_attempts, ConfiguredBackoff::function(delay_fn))
    }

    pub fn with_backoff<P>(max_attempts: P, backoff: ConfiguredBackoff) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        Self::from_parts(Arc::new(max_attempts), RetryCapacity::new(), backoff, SystemClock)
    }

    /// Assemble from a shared provider, ledger and clock.
    pub fn from_parts<C>(
        max_attempts: Arc<dyn MaxAttemptsProvider>,
        capacity: RetryCapacity,
        backoff: ConfiguredBackoff,
        clock: C,
    ) -> Self
    where
        C: Clock + 'static,
    {
        let inner = StandardRetryStrategy::builder()
            .shared_max_attempts_provider(max_attempts)
            .capacity(capacity)
            .backoff(backoff.clone())
            .clock(clock)
            .build();
        Self { inner, backoff }
    }

    pub fn capacity(&self) -> u32 {
        self.inner.capacity()
    }

    pub const fn backoff(&self) -> &ConfiguredBackoff {
        &self.backoff
    }
}

#[async_trait]
impl RetryStrategy for ConfiguredRetryStrategy {
    fn mode(&self) -> RetryMode {
        RetryMode::Standard
    }

    async fn max_attempts(&self) -> u32 {
        self.inner.max_attempts().await
    }

    async fn acquire_initial_retry_token(&self) -> RetryToken {
        self.inner.acquire_initial_retry_token().await
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: &RetryToken,
        error_info: &RetryErrorInfo,
    ) -> RetryResult<RetryToken> {
        self.inner.refresh_retry_token_for_retry(token, error_info).await
    }

    fn record_success(&self, token: &RetryToken) {
        self.inner.record_success(token);
    }
}
