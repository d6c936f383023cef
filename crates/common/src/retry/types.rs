//! Error classification and mode types consumed by the retry strategies

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::impl_status_conversions;

/// Classification of a failed attempt, produced by a
/// [`RetryClassifier`](super::executor::RetryClassifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryErrorType {
    /// The server signalled overload (e.g. HTTP 429)
    Throttling,
    /// Network or timeout-class failure
    Transient,
    /// Server fault that is not worth retrying
    ServerError,
    /// Caller fault, never retried
    ClientError,
}

impl_status_conversions!(RetryErrorType {
    Throttling => "throttling",
    Transient => "transient",
    ServerError => "server_error",
    ClientError => "client_error",
});

impl RetryErrorType {
    /// Only throttling and transient failures are eligible for retry.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Throttling | Self::Transient)
    }
}

/// What the strategy needs to know about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryErrorInfo {
    pub error_type: RetryErrorType,
    /// Absolute time before which the server asked not to retry
    pub retry_after_hint: Option<SystemTime>,
}

impl RetryErrorInfo {
    pub const fn new(error_type: RetryErrorType) -> Self {
        Self { error_type, retry_after_hint: None }
    }

    pub const fn throttling() -> Self {
        Self::new(RetryErrorType::Throttling)
    }

    pub const fn transient() -> Self {
        Self::new(RetryErrorType::Transient)
    }

    pub const fn server_error() -> Self {
        Self::new(RetryErrorType::ServerError)
    }

    pub const fn client_error() -> Self {
        Self::new(RetryErrorType::ClientError)
    }

    #[must_use]
    pub const fn with_retry_after(mut self, hint: SystemTime) -> Self {
        self.retry_after_hint = Some(hint);
        self
    }

    pub const fn is_throttling(&self) -> bool {
        matches!(self.error_type, RetryErrorType::Throttling)
    }
}

/// Which strategy family a client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Capacity-limited retries with exponential backoff
    #[default]
    Standard,
    /// Standard retries plus client-side send-rate limiting
    Adaptive,
}

impl_status_conversions!(RetryMode {
    Standard => "standard",
    Adaptive => "adaptive",
});
