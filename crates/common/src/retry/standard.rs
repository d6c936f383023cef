//! Capacity-limited retries with full-jitter exponential backoff

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::debug;

use super::backoff::{BackoffStrategy, ExponentialBackoff};
use super::capacity::{RetryCapacity, RetryQuotaConfig};
use super::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_BASE, MAXIMUM_RETRY_DELAY,
    THROTTLING_RETRY_DELAY_BASE,
};
use super::error::{RetryError, RetryResult};
use super::provider::{resolve_max_attempts, MaxAttemptsProvider, ResolvedMaxAttempts};
use super::strategy::RetryStrategy;
use super::token::RetryToken;
use super::types::{RetryErrorInfo, RetryErrorType, RetryMode};
use crate::time::{Clock, SystemClock};

/// Backoff base for `error_type`.
pub const fn delay_base(error_type: RetryErrorType) -> Duration {
    match error_type {
        RetryErrorType::Throttling => THROTTLING_RETRY_DELAY_BASE,
        _ => DEFAULT_RETRY_DELAY_BASE,
    }
}

/// The default retry strategy.
///
/// A retry is granted when all of these hold:
/// - the next attempt stays below the attempt ceiling,
/// - the error is throttling or transient,
/// - the shared capacity covers the retry's cost.
///
/// The cost is debited when the retry is granted and refunded by
/// [`record_success`](RetryStrategy::record_success).
///
/// ```
/// use ebbflow_common::retry::{RetryErrorInfo, RetryStrategy, StandardRetryStrategy};
///
/// # tokio_test::block_on(async {
/// let strategy = StandardRetryStrategy::new(3);
/// let token = strategy.acquire_initial_retry_token().await;
/// let retry = strategy
///     .refresh_retry_token_for_retry(&token, &RetryErrorInfo::throttling())
///     .await
///     .unwrap();
/// assert_eq!(retry.retry_count(), 1);
/// assert_eq!(strategy.capacity(), 495);
/// # });
/// ```
#[derive(Clone)]
pub struct StandardRetryStrategy {
    max_attempts: Arc<dyn MaxAttemptsProvider>,
    capacity: RetryCapacity,
    quota: RetryQuotaConfig,
    backoff: Arc<dyn BackoffStrategy>,
    clock: Arc<dyn Clock>,
}

impl StandardRetryStrategy {
    /// Strategy with the default quota and jittered backoff.
    pub fn new<P>(max_attempts: P) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        Self::builder().max_attempts_provider(max_attempts).build()
    }

    /// Create a new strategy builder
    pub fn builder() -> StandardRetryStrategyBuilder {
        StandardRetryStrategyBuilder::new()
    }

    /// Costs charged against the ledger.
    pub const fn quota(&self) -> &RetryQuotaConfig {
        &self.quota
    }

    /// Current ledger balance.
    pub fn capacity(&self) -> u32 {
        self.capacity.available()
    }

    /// Shared handle to the ledger.
    pub fn capacity_ledger(&self) -> &RetryCapacity {
        &self.capacity
    }

    /// Resolve the attempt ceiling, keeping the fallback visible.
    pub async fn resolve_max_attempts(&self) -> ResolvedMaxAttempts {
        resolve_max_attempts(self.max_attempts.as_ref()).await
    }

    /// The backoff delay, raised to the retry-after hint when the hint is
    /// further away.
    fn delay_with_hint(&self, backoff: Duration, hint: Option<SystemTime>) -> Duration {
        let Some(hint) = hint else {
            return backoff;
        };
        hint.duration_since(self.clock.system_time())
            .map_or(backoff, |until_hint| until_hint.max(backoff))
    }
}

impl fmt::Debug for StandardRetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardRetryStrategy")
            .field("capacity", &self.capacity.available())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RetryStrategy for StandardRetryStrategy {
    fn mode(&self) -> RetryMode {
        RetryMode::Standard
    }

    async fn max_attempts(&self) -> u32 {
        self.resolve_max_attempts().await.attempts()
    }

    async fn acquire_initial_retry_token(&self) -> RetryToken {
        RetryToken::initial()
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: &RetryToken,
        error_info: &RetryErrorInfo,
    ) -> RetryResult<RetryToken> {
        let max_attempts = self.max_attempts().await;
        let error_type = error_info.error_type;
        let attempts = token.retry_count().saturating_add(1);

        if attempts >= max_attempts {
            return Err(RetryError::AttemptsExhausted { attempts, max_attempts });
        }
        if !error_type.is_retryable() {
            return Err(RetryError::NotRetryable { error_type });
        }

        let cost = self.quota.cost_for(error_type);
        let backoff =
            self.backoff.compute_next_backoff_delay(token.retry_count(), delay_base(error_type));
        let delay = self.delay_with_hint(backoff, error_info.retry_after_hint).min(MAXIMUM_RETRY_DELAY);

        let remaining = self
            .capacity
            .try_debit(cost)
            .map_err(|available| RetryError::CapacityExhausted { available, required: cost })?;

        debug!(
            retry_count = attempts,
            max_attempts,
            error_type = %error_type,
            cost,
            remaining_capacity = remaining,
            delay_ms = delay.as_millis(),
            "Retry granted"
        );

        let charged = token.retry_cost().unwrap_or(0).saturating_add(cost);
        Ok(RetryToken::new(attempts, delay, Some(charged)))
    }

    fn record_success(&self, token: &RetryToken) {
        let credited = token.retry_cost().unwrap_or(self.quota.no_retry_increment);
        let balance = self.capacity.credit(credited);
        debug!(credited, capacity = balance, "Recorded successful attempt");
    }
}

/// Builder for [`StandardRetryStrategy`]
pub struct StandardRetryStrategyBuilder {
    max_attempts: Arc<dyn MaxAttemptsProvider>,
    capacity: Option<RetryCapacity>,
    quota: RetryQuotaConfig,
    backoff: Arc<dyn BackoffStrategy>,
    clock: Arc<dyn Clock>,
}

impl Default for StandardRetryStrategyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardRetryStrategyBuilder {
    /// Builder with three attempts, the default quota and jittered backoff.
    pub fn new() -> Self {
        Self {
            max_attempts: Arc::new(DEFAULT_MAX_ATTEMPTS),
            capacity: None,
            quota: RetryQuotaConfig::default(),
            backoff: Arc::new(ExponentialBackoff::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Fixed attempt ceiling, initial attempt included.
    pub fn max_attempts(self, attempts: u32) -> Self {
        self.max_attempts_provider(attempts)
    }

    /// Resolve the attempt ceiling from `provider` on every decision.
    pub fn max_attempts_provider<P>(mut self, provider: P) -> Self
    where
        P: MaxAttemptsProvider + 'static,
    {
        self.max_attempts = Arc::new(provider);
        self
    }

    /// Like [`max_attempts_provider`](Self::max_attempts_provider), for a
    /// provider already behind an `Arc`.
    pub fn shared_max_attempts_provider(mut self, provider: Arc<dyn MaxAttemptsProvider>) -> Self {
        self.max_attempts = provider;
        self
    }

    /// Share an existing ledger, e.g. between strategies of one client.
    /// Takes precedence over the quota's `initial_retry_tokens`.
    pub fn capacity(mut self, capacity: RetryCapacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Ledger size and retry costs.
    pub fn quota(mut self, quota: RetryQuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    /// Replace the full-jitter exponential backoff.
    pub fn backoff<B>(mut self, backoff: B) -> Self
    where
        B: BackoffStrategy + 'static,
    {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Wall clock used to turn retry-after hints into delays.
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Build the strategy.
    pub fn build(self) -> StandardRetryStrategy {
        let quota = self.quota;
        StandardRetryStrategy {
            max_attempts: self.max_attempts,
            capacity: self.capacity.unwrap_or_else(|| quota.ledger()),
            quota,
            backoff: self.backoff,
            clock: self.clock,
        }
    }
}
