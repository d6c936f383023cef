//! Error type for infrastructure adapters.
//!
//! `InfraError` embeds [`CommonError`] like every module error in the
//! workspace, and adds the failure shapes of file loading and HTTP calls.
//! HTTP failures carry the [`RetryMetadata`] of the loop that produced them.

use std::time::Duration;

use ebbflow_common::error::{CommonError, ErrorSeverity};
use ebbflow_common::impl_error_classification;
use ebbflow_common::retry::{RetryFailure, RetryMetadata};
use thiserror::Error;

pub mod conversions;

/// Result type for infrastructure operations
pub type InfraResult<T> = Result<T, InfraError>;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {format}: {message}")]
    Parse { format: &'static str, message: String },

    #[error("HTTP request failed: {source} ({metadata})")]
    Http {
        #[source]
        source: reqwest::Error,
        metadata: RetryMetadata,
    },

    #[error("HTTP {status} from {url} ({metadata})")]
    Status { status: u16, url: String, metadata: RetryMetadata, retry_after: Option<Duration> },

    #[error(transparent)]
    Retry(RetryFailure<String>),
}

impl InfraError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Retry accounting, for errors produced by a retry loop.
    pub const fn retry_metadata(&self) -> Option<RetryMetadata> {
        match self {
            Self::Http { metadata, .. } | Self::Status { metadata, .. } => Some(*metadata),
            Self::Retry(failure) => Some(failure.metadata()),
            _ => None,
        }
    }
}

impl_error_classification!(InfraError, Common,
    Self::Config(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Io(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Parse { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::Http { .. } => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::Status { status, retry_after, .. } => {
        retryable: *status == 429 || (500..=599).contains(status),
        severity: if *status >= 500 { ErrorSeverity::Error } else { ErrorSeverity::Warning },
        critical: false,
        retry_after: *retry_after,
    },
    Self::Retry(_) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

impl From<InfraError> for CommonError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Common(e) => e,
            InfraError::Config(message) => Self::config(message),
            InfraError::Io(e) => Self::from(e),
            InfraError::Parse { format, message } => Self::serialization_format(format, message),
            other => Self::internal_with_context(other.to_string(), "http"),
        }
    }
}
