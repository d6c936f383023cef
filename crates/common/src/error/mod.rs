//! Shared error types and classification for ebbflow crates
//!
//! Every module-specific error enum embeds [`CommonError`] through a
//! `Common(#[from] CommonError)` variant and implements
//! [`ErrorClassification`] (usually through [`impl_error_classification!`]).
//! This keeps retryability, severity and retry-after hints consistent across
//! the workspace.
//!
//! ```rust,ignore
//! use thiserror::Error;
//!
//! use crate::error::{CommonError, ErrorSeverity};
//!
//! #[derive(Debug, Error)]
//! pub enum LedgerError {
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//!
//!     #[error("ledger overdrawn by {0}")]
//!     Overdrawn(u32),
//! }
//!
//! impl_error_classification!(LedgerError, Common,
//!     Self::Overdrawn(_) => {
//!         retryable: false,
//!         severity: ErrorSeverity::Warning,
//!         critical: false,
//!     }
//! );
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone, PartialEq)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Validation errors
    Validation { field: String, message: String, value: Option<String> },

    /// Timeout errors
    Timeout { operation: String, duration: Duration },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// File I/O errors
    Persistence { message: String, operation: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => match field {
                Some(field) => write!(f, "Configuration error in field '{field}': {message}"),
                None => write!(f, "Configuration error: {message}"),
            },
            Self::Validation { field, message, value } => match value {
                Some(value) => {
                    write!(f, "Validation error for field '{field}' (value: '{value}'): {message}")
                }
                None => write!(f, "Validation error for field '{field}': {message}"),
            },
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{operation}' timed out after {duration:?}")
            }
            Self::Serialization { message, format } => match format {
                Some(format) => write!(f, "Serialization error ({format}): {message}"),
                None => write!(f, "Serialization error: {message}"),
            },
            Self::Persistence { message, operation } => match operation {
                Some(op) => write!(f, "Persistence error during '{op}': {message}"),
                None => write!(f, "Persistence error: {message}"),
            },
            Self::Internal { message, context } => match context {
                Some(ctx) => write!(f, "Internal error in '{ctx}': {message}"),
                None => write!(f, "Internal error: {message}"),
            },
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Config { .. }
            | Self::Validation { .. }
            | Self::Serialization { .. }
            | Self::Persistence { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error tied to a named field or variable
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: None }
    }

    /// Create a validation error that records the rejected value
    pub fn validation_with_value<F: Into<String>, M: Into<String>, V: Into<String>>(
        field: F,
        message: M,
        value: V,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a serialization error with the format that failed
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a persistence error for a named operation
    pub fn persistence_op<O: Into<String>, S: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    /// Create an internal error with context
    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    /// Structured fields for `tracing` events.
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("error.type", self.error_type_name().to_string()),
            ("error.severity", self.severity().to_string()),
            ("error.retryable", self.is_retryable().to_string()),
        ];
        match self {
            Self::Config { field: Some(field), .. } => fields.push(("error.field", field.clone())),
            Self::Validation { field, .. } => fields.push(("error.field", field.clone())),
            Self::Timeout { operation, duration } => {
                fields.push(("error.operation", operation.clone()));
                fields.push(("error.duration_ms", duration.as_millis().to_string()));
            }
            _ => {}
        }
        fields
    }

    fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Validation { .. } => "validation",
            Self::Timeout { .. } => "timeout",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Error classification trait for consistent error handling across modules
pub trait ErrorClassification {
    /// Check if this error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

/// Generates `From<serde_json::Error>` and `From<std::io::Error>` for a
/// module error that embeds [`CommonError`].
///
/// `From<CommonError>` is normally derived through `#[from]` on the variant;
/// pass `with_common` to generate it here instead.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };

    ($error_type:ty, $variant:ident, with_common) => {
        impl From<$crate::error::CommonError> for $error_type {
            fn from(err: $crate::error::CommonError) -> Self {
                Self::$variant(err)
            }
        }

        $crate::impl_error_conversion!($error_type, $variant);
    };
}

/// Implements [`ErrorClassification`] for a module error, delegating the
/// embedded [`CommonError`] variant and listing the rest explicitly.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_retryable(e),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::severity(e),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_critical(e),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::retry_after(e),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
