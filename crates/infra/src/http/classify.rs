//! Mapping HTTP outcomes onto retry error types

use ebbflow_common::retry::RetryErrorType;
use reqwest::StatusCode;

/// Retry classification of a response status.
///
/// 429 is throttling. 500, 502, 503 and 504 are transient. Other 5xx codes
/// are server errors and everything else is a client error.
pub fn classify_status(status: StatusCode) -> RetryErrorType {
    match status.as_u16() {
        429 => RetryErrorType::Throttling,
        500 | 502 | 503 | 504 => RetryErrorType::Transient,
        500..=599 => RetryErrorType::ServerError,
        _ => RetryErrorType::ClientError,
    }
}

/// Retry classification of a transport failure.
pub fn classify_transport(err: &reqwest::Error) -> RetryErrorType {
    if err.is_timeout() || err.is_request() {
        return RetryErrorType::Transient;
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        if err.is_connect() {
            return RetryErrorType::Transient;
        }
    }
    RetryErrorType::ClientError
}
