//! Standard retries gated by a client-side rate limiter

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::RetryResult;
use super::provider::MaxAttemptsProvider;
use super::rate_limiter::{DefaultRateLimiter, RateLimiter};
use super::standard::StandardRetryStrategy;
use super::strategy::RetryStrategy;
use super::token::RetryToken;
use super::types::{RetryErrorInfo, RetryMode};

/// Wraps a [`StandardRetryStrategy`] and paces every attempt through a
/// [`RateLimiter`].
///
/// Each attempt waits for a send token, each failure tells the limiter
/// whether it was throttled, and each success reports an unthrottled send.
/// The initial token waits inside [`acquire_initial_retry_token`]; retries
/// wait in [`acquire_send_token`], which the caller awaits after the retry
/// delay so a deadline can cut the wait short.
///
/// [`acquire_initial_retry_token`]: RetryStrategy::acquire_initial_retry_token
/// [`acquire_send_token`]: RetryStrategy::acquire_send_token
///
/// ```
/// use ebbflow_common::retry::{AdaptiveRetryStrategy, RetryErrorInfo, RetryStrategy};
///
/// # tokio_test::block_on(async {
/// let strategy = AdaptiveRetryStrategy::new(3);
/// let token = strategy.acquire_initial_retry_token().await;
/// strategy.record_success(&token);
/// # });
/// ```
#[derive(Clone)]
pub struct AdaptiveRetryStrategy {
    standard: StandardRetryStrategy,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AdaptiveRetryStrategy {
    /// Adaptive strategy with a default rate limiter.
    pub fn new<P>(max_attempts: P) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        Self::with_rate_limiter(StandardRetryStrategy::new(max_attempts), DefaultRateLimiter::new())
    }

    /// Wrap `standard` with a limiter of the caller's choosing.
    pub fn with_rate_limiter<R>(standard: StandardRetryStrategy, rate_limiter: R) -> Self
    where
        R: RateLimiter + 'static,
    {
        Self::with_shared_rate_limiter(standard, Arc::new(rate_limiter))
    }

    /// Share one limiter between several strategies.
    pub fn with_shared_rate_limiter(
        standard: StandardRetryStrategy,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self { standard, rate_limiter }
    }

    /// Strategy making the retry decisions.
    pub const fn standard(&self) -> &StandardRetryStrategy {
        &self.standard
    }

    pub fn rate_limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.rate_limiter
    }

    /// Current balance of the wrapped strategy's ledger.
    pub fn capacity(&self) -> u32 {
        self.standard.capacity()
    }
}

impl fmt::Debug for AdaptiveRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveRetryStrategy")
            .field("standard", &self.standard)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RetryStrategy for AdaptiveRetryStrategy {
    fn mode(&self) -> RetryMode {
        RetryMode::Adaptive
    }

    async fn max_attempts(&self) -> u32 {
        self.standard.max_attempts().await
    }

    async fn acquire_initial_retry_token(&self) -> RetryToken {
        self.rate_limiter.get_send_token().await;
        self.standard.acquire_initial_retry_token().await
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: &RetryToken,
        error_info: &RetryErrorInfo,
    ) -> RetryResult<RetryToken> {
        self.rate_limiter.update_client_sending_rate(error_info.is_throttling());
        self.standard.refresh_retry_token_for_retry(token, error_info).await
    }

    async fn acquire_send_token(&self) {
        self.rate_limiter.get_send_token().await;
    }

    fn record_success(&self, token: &RetryToken) {
        self.rate_limiter.update_client_sending_rate(false);
        self.standard.record_success(token);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::retry::error::RetryError;

    /// Records every call made against it.
    #[derive(Debug, Default)]
    struct RecordingLimiter {
        send_tokens: AtomicU32,
        updates: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl RateLimiter for RecordingLimiter {
        async fn get_send_token(&self) {
            self.send_tokens.fetch_add(1, Ordering::SeqCst);
        }

        fn update_client_sending_rate(&self, throttled: bool) {
            self.updates.lock().push(throttled);
        }
    }

    fn strategy(max_attempts: u32) -> (AdaptiveRetryStrategy, Arc<RecordingLimiter>) {
        let limiter = Arc::new(RecordingLimiter::default());
        let strategy = AdaptiveRetryStrategy::with_shared_rate_limiter(
            StandardRetryStrategy::new(max_attempts),
            limiter.clone(),
        );
        (strategy, limiter)
    }

    /// Validates the initial token waits on the limiter.
    ///
    /// Assertions:
    /// - One send token taken, no rate updates.
    #[tokio::test]
    async fn test_initial_token_takes_send_token() {
        let (strategy, limiter) = strategy(3);
        let token = strategy.acquire_initial_retry_token().await;

        assert_eq!(token, RetryToken::initial());
        assert_eq!(limiter.send_tokens.load(Ordering::SeqCst), 1);
        assert!(limiter.updates.lock().is_empty());
        assert_eq!(strategy.mode(), RetryMode::Adaptive);
    }

    /// Tests a throttled failure updates the limiter before delegating.
    ///
    /// Verifies:
    /// - The update carries `throttled = true`
    /// - The standard strategy still debits capacity
    /// - The send token for the retry is left to `acquire_send_token`
    #[tokio::test]
    async fn test_refresh_reports_throttling() {
        let (strategy, limiter) = strategy(3);
        let token = strategy.acquire_initial_retry_token().await;
        let next = strategy
            .refresh_retry_token_for_retry(&token, &RetryErrorInfo::throttling())
            .await
            .unwrap();

        assert_eq!(next.retry_count(), 1);
        assert_eq!(*limiter.updates.lock(), vec![true]);
        assert_eq!(limiter.send_tokens.load(Ordering::SeqCst), 1);
        assert_eq!(strategy.capacity(), 495);

        strategy.acquire_send_token().await;
        assert_eq!(limiter.send_tokens.load(Ordering::SeqCst), 2);
    }

    /// Tests a refused retry still feeds the limiter.
    ///
    /// Verifies:
    /// - A client error reports `throttled = false` and is refused
    /// - No send token is taken for the refused retry
    #[tokio::test]
    async fn test_refused_retry_updates_without_sending() {
        let (strategy, limiter) = strategy(3);
        let token = strategy.acquire_initial_retry_token().await;
        let err = strategy
            .refresh_retry_token_for_retry(&token, &RetryErrorInfo::client_error())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::NotRetryable { .. }));
        assert_eq!(*limiter.updates.lock(), vec![false]);
        assert_eq!(limiter.send_tokens.load(Ordering::SeqCst), 1);
    }

    /// Validates success reports an unthrottled send and refunds capacity.
    ///
    /// Assertions:
    /// - Limiter sees `false`.
    /// - Capacity returns to its starting value.
    #[tokio::test]
    async fn test_success_updates_and_refunds() {
        let (strategy, limiter) = strategy(3);
        let token = strategy.acquire_initial_retry_token().await;
        let next = strategy
            .refresh_retry_token_for_retry(&token, &RetryErrorInfo::transient())
            .await
            .unwrap();
        assert_eq!(strategy.capacity(), 490);

        strategy.record_success(&next);
        assert_eq!(strategy.capacity(), 500);
        assert_eq!(*limiter.updates.lock(), vec![false, false]);
    }

    /// Tests the default limiter switches on after a throttle.
    ///
    /// Verifies:
    /// - A real limiter is enabled by the throttled refresh
    #[tokio::test(start_paused = true)]
    async fn test_default_limiter_enables_on_throttle() {
        let limiter = DefaultRateLimiter::new();
        let strategy =
            AdaptiveRetryStrategy::with_rate_limiter(StandardRetryStrategy::new(3), limiter.clone());
        let token = strategy.acquire_initial_retry_token().await;
        assert!(!limiter.snapshot().enabled);

        strategy
            .refresh_retry_token_for_retry(&token, &RetryErrorInfo::throttling())
            .await
            .unwrap();
        assert!(limiter.snapshot().enabled);
    }
}
