//! Conversions from external library errors into [`InfraError`].

use ebbflow_common::retry::{RetryError, RetryMetadata};

use super::InfraError;

impl From<reqwest::Error> for InfraError {
    /// Errors raised outside a retry loop, such as building a client or a
    /// request.
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            return Self::Config(format!("invalid HTTP request or client settings: {value}"));
        }
        Self::Http { source: value, metadata: RetryMetadata::default() }
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse { format: "TOML", message: value.to_string() }
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse { format: "JSON", message: value.to_string() }
    }
}

impl From<RetryError> for InfraError {
    fn from(value: RetryError) -> Self {
        Self::Common(value.into())
    }
}
