//! Max-attempts provider backed by an environment variable

use std::env::VarError;

use async_trait::async_trait;
use ebbflow_common::retry::{MaxAttemptsProvider, RetryError, RetryResult};

use crate::config::loader::parse_max_attempts;
use crate::config::ENV_MAX_ATTEMPTS;

/// Reads the attempt ceiling from the environment on every resolution, so a
/// running process picks up changes.
///
/// An unset variable yields the configured fallback. A malformed value is an
/// error, which the strategy turns into its own default.
#[derive(Debug, Clone)]
pub struct EnvMaxAttemptsProvider {
    var: String,
    fallback: u32,
}

impl EnvMaxAttemptsProvider {
    /// Provider for `EBBFLOW_MAX_ATTEMPTS`.
    pub fn new(fallback: u32) -> Self {
        Self::with_var(ENV_MAX_ATTEMPTS, fallback)
    }

    pub fn with_var(var: impl Into<String>, fallback: u32) -> Self {
        Self { var: var.into(), fallback }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl MaxAttemptsProvider for EnvMaxAttemptsProvider {
    async fn max_attempts(&self) -> RetryResult<u32> {
        match std::env::var(&self.var) {
            Ok(raw) => parse_max_attempts(&raw)
                .map_err(|e| RetryError::provider_unavailable(format!("{}: {e}", self.var))),
            Err(VarError::NotPresent) => Ok(self.fallback),
            Err(VarError::NotUnicode(_)) => Err(RetryError::provider_unavailable(format!(
                "{} is not valid unicode",
                self.var
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use ebbflow_common::retry::resolve_max_attempts;

    use super::*;

    // Each test owns its variable so they can run in parallel.

    #[tokio::test]
    async fn test_unset_uses_fallback() {
        let provider = EnvMaxAttemptsProvider::with_var("EBBFLOW_TEST_ATTEMPTS_UNSET", 4);
        std::env::remove_var(provider.var());
        assert_eq!(provider.max_attempts().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_reads_current_value() {
        let provider = EnvMaxAttemptsProvider::with_var("EBBFLOW_TEST_ATTEMPTS_SET", 4);
        std::env::set_var(provider.var(), "7");
        assert_eq!(provider.max_attempts().await.unwrap(), 7);

        std::env::set_var(provider.var(), "2");
        assert_eq!(provider.max_attempts().await.unwrap(), 2);
        std::env::remove_var(provider.var());
    }

    #[tokio::test]
    async fn test_malformed_value_falls_back_to_default() {
        let provider = EnvMaxAttemptsProvider::with_var("EBBFLOW_TEST_ATTEMPTS_BAD", 8);
        std::env::set_var(provider.var(), "many");

        let err = provider.max_attempts().await.unwrap_err();
        assert!(matches!(err, RetryError::ProviderUnavailable { .. }));

        let resolved = resolve_max_attempts(&provider).await;
        std::env::remove_var(provider.var());
        assert!(resolved.is_fallback());
        assert_eq!(resolved.attempts(), 3);
    }
}
