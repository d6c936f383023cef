// Error types for the retry core
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::types::RetryErrorType;
use crate::error::{CommonError, ErrorSeverity};
use crate::{impl_error_classification, impl_error_conversion};

/// Why a strategy refused to issue another retry token.
///
/// This is an internal signal between a strategy and the retry loop. The
/// loop never surfaces it to the end caller; see [`RetryFailure`].
#[derive(Debug, Error)]
pub enum RetryError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Retry attempts exhausted: attempt {attempts} of {max_attempts}")]
    AttemptsExhausted { attempts: u32, max_attempts: u32 },

    #[error("Retry capacity exhausted: {available} available, {required} required")]
    CapacityExhausted { available: u32, required: u32 },

    #[error("Error type '{error_type}' is not retryable")]
    NotRetryable { error_type: RetryErrorType },

    #[error("Max attempts provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },
}

impl RetryError {
    pub fn provider_unavailable<S: Into<String>>(reason: S) -> Self {
        Self::ProviderUnavailable { reason: reason.into() }
    }
}

impl_error_conversion!(RetryError, Common);

impl_error_classification!(RetryError, Common,
    Self::AttemptsExhausted { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::CapacityExhausted { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::NotRetryable { .. } => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::ProviderUnavailable { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

impl From<RetryError> for CommonError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Common(e) => e,
            RetryError::ProviderUnavailable { reason } => {
                Self::config_field("max_attempts", reason)
            }
            other => Self::internal_with_context(other.to_string(), "retry"),
        }
    }
}

/// Result type for strategy operations
pub type RetryResult<T> = Result<T, RetryError>;

/// Attempt accounting attached to every outcome of a retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryMetadata {
    /// Number of times the operation ran
    pub attempts: u32,
    /// Sum of the delays slept between attempts
    pub total_retry_delay: Duration,
}

impl fmt::Display for RetryMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts: {}, total retry delay: {}ms",
            self.attempts,
            self.total_retry_delay.as_millis()
        )
    }
}

/// Terminal failure of a retry loop.
///
/// Carries the operation's own last error so callers see a failure of the
/// same kind as the underlying call, annotated with [`RetryMetadata`].
#[derive(Debug, Error)]
pub enum RetryFailure<E> {
    /// The strategy refused another retry
    #[error("{error} ({metadata})")]
    Exhausted { error: E, metadata: RetryMetadata },

    /// The next wait would have passed the call deadline
    #[error("Retry deadline of {deadline:?} exceeded ({metadata})")]
    DeadlineExceeded { last_error: Option<E>, metadata: RetryMetadata, deadline: Duration },
}

impl<E> RetryFailure<E> {
    pub const fn metadata(&self) -> RetryMetadata {
        match self {
            Self::Exhausted { metadata, .. } | Self::DeadlineExceeded { metadata, .. } => *metadata,
        }
    }

    /// The last error returned by the operation, if it ran at all.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { error, .. } => Some(error),
            Self::DeadlineExceeded { last_error, .. } => last_error,
        }
    }

    pub const fn last_error(&self) -> Option<&E> {
        match self {
            Self::Exhausted { error, .. } => Some(error),
            Self::DeadlineExceeded { last_error, .. } => last_error.as_ref(),
        }
    }

    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }

    /// Convert the carried error, keeping the metadata.
    pub fn map_err<F, T>(self, f: F) -> RetryFailure<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Self::Exhausted { error, metadata } => RetryFailure::Exhausted { error: f(error), metadata },
            Self::DeadlineExceeded { last_error, metadata, deadline } => {
                RetryFailure::DeadlineExceeded { last_error: last_error.map(f), metadata, deadline }
            }
        }
    }
}
