//! Builds the retry strategy a [`RetryClientConfig`] describes

use std::sync::Arc;

use ebbflow_common::retry::{
    AdaptiveRetryStrategy, DefaultRateLimiter, MaxAttemptsProvider, RetryMode, RetryStrategy,
    StandardRetryStrategy,
};
use tracing::debug;

use crate::config::RetryClientConfig;
use crate::errors::{InfraError, InfraResult};

/// Strategy for `config`, with a fixed attempt ceiling.
///
/// # Errors
/// Returns `InfraError::Config` if the configuration is invalid.
pub fn build_retry_strategy(config: &RetryClientConfig) -> InfraResult<Arc<dyn RetryStrategy>> {
    build_retry_strategy_with_provider(config, config.max_attempts)
}

/// Strategy for `config`, taking the attempt ceiling from `provider`.
///
/// # Errors
/// Returns `InfraError::Config` if the configuration is invalid.
pub fn build_retry_strategy_with_provider<P>(
    config: &RetryClientConfig,
    provider: P,
) -> InfraResult<Arc<dyn RetryStrategy>>
where
    P: MaxAttemptsProvider + 'static,
{
    config.validate().map_err(InfraError::Config)?;
    let standard = StandardRetryStrategy::builder()
        .max_attempts_provider(provider)
        .quota(config.quota)
        .build();

    debug!(
        retry_mode = %config.retry_mode,
        initial_retry_tokens = config.quota.initial_retry_tokens,
        "Building retry strategy"
    );
    match config.retry_mode {
        RetryMode::Standard => Ok(Arc::new(standard)),
        RetryMode::Adaptive => {
            let limiter =
                DefaultRateLimiter::with_config(config.rate_limiter).map_err(InfraError::Config)?;
            Ok(Arc::new(AdaptiveRetryStrategy::with_rate_limiter(standard, limiter)))
        }
    }
}
