// Common contract of every retry strategy
use std::sync::Arc;

use async_trait::async_trait;

use super::error::RetryResult;
use super::token::RetryToken;
use super::types::{RetryErrorInfo, RetryMode};

/// Decides whether a failed call may be retried and how long to wait.
///
/// One instance is shared by every call a client issues, so implementations
/// keep all mutable state behind atomics or short critical sections.
#[async_trait]
pub trait RetryStrategy: Send + Sync {
    /// Strategy family, for diagnostics and user-agent style reporting.
    fn mode(&self) -> RetryMode;

    /// Attempt ceiling currently in force (initial attempt included).
    async fn max_attempts(&self) -> u32;

    /// Token for the first attempt. May wait on a rate limiter but never
    /// refuses.
    async fn acquire_initial_retry_token(&self) -> RetryToken;

    /// Token for the next attempt after `token` failed with `error_info`,
    /// or the reason no retry is allowed.
    async fn refresh_retry_token_for_retry(
        &self,
        token: &RetryToken,
        error_info: &RetryErrorInfo,
    ) -> RetryResult<RetryToken>;

    /// Wait for permission to send the attempt a refreshed token was granted
    /// for. Callers await this after the token's retry delay and may abandon
    /// it at their deadline. Strategies without send pacing return at once.
    async fn acquire_send_token(&self) {}

    /// Report that the attempt holding `token` succeeded.
    fn record_success(&self, token: &RetryToken);
}

#[async_trait]
impl<S: RetryStrategy + ?Sized> RetryStrategy for Arc<S> {
    fn mode(&self) -> RetryMode {
        (**self).mode()
    }

    async fn max_attempts(&self) -> u32 {
        (**self).max_attempts().await
    }

    async fn acquire_initial_retry_token(&self) -> RetryToken {
        (**self).acquire_initial_retry_token().await
    }

    async fn refresh_retry_token_for_retry(
        &self,
        token: &RetryToken,
        error_info: &RetryErrorInfo,
    ) -> RetryResult<RetryToken> {
        (**self).refresh_retry_token_for_retry(token, error_info).await
    }

    async fn acquire_send_token(&self) {
        (**self).acquire_send_token().await;
    }

    fn record_success(&self, token: &RetryToken) {
        (**self).record_success(token);
    }
}
