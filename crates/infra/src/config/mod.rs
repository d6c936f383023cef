//! Retry client configuration
//!
//! [`RetryClientConfig`] is the serde shape of the settings a client needs to
//! build its retry strategy. [`loader`] reads it from files and the
//! environment.

use std::time::Duration;

use ebbflow_common::option_duration_millis;
use ebbflow_common::retry::constants::DEFAULT_MAX_ATTEMPTS;
use ebbflow_common::retry::{RateLimiterConfig, RetryMode, RetryQuotaConfig};
use serde::{Deserialize, Serialize};

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, discover_config_path, find_config_in, load, load_from_file,
    ENV_MAX_ATTEMPTS, ENV_RETRY_DEADLINE_MS, ENV_RETRY_MODE,
};

/// Settings for the retry strategy of one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryClientConfig {
    /// Attempt ceiling, initial attempt included
    pub max_attempts: u32,
    pub retry_mode: RetryMode,
    /// Ledger size and per-retry costs
    pub quota: RetryQuotaConfig,
    /// Tuning for the adaptive mode's rate limiter
    pub rate_limiter: RateLimiterConfig,
    /// Bound on a whole call including waits, in milliseconds on the wire
    #[serde(
        rename = "deadline_ms",
        with = "option_duration_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<Duration>,
}

impl Default for RetryClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_mode: RetryMode::default(),
            quota: RetryQuotaConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            deadline: None,
        }
    }
}

impl RetryClientConfig {
    pub fn builder() -> RetryClientConfigBuilder {
        RetryClientConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.deadline.is_some_and(|deadline| deadline.is_zero()) {
            return Err("deadline must be greater than 0".to_string());
        }
        self.quota.validate().map_err(|e| format!("quota: {e}"))?;
        self.rate_limiter.validate().map_err(|e| format!("rate_limiter: {e}"))
    }
}

/// Builder for RetryClientConfig
#[derive(Debug, Default)]
pub struct RetryClientConfigBuilder {
    config: RetryClientConfig,
}

impl RetryClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt ceiling, initial attempt included
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Select standard or adaptive retries
    pub fn retry_mode(mut self, mode: RetryMode) -> Self {
        self.config.retry_mode = mode;
        self
    }

    /// Size the retry ledger and its per-retry costs
    pub fn quota(mut self, quota: RetryQuotaConfig) -> Self {
        self.config.quota = quota;
        self
    }

    /// Tune the adaptive mode's rate limiter
    pub fn rate_limiter(mut self, rate_limiter: RateLimiterConfig) -> Self {
        self.config.rate_limiter = rate_limiter;
        self
    }

    /// Bound each call, waits included
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RetryClientConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
