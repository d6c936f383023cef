//! Lifecycle logging for retry loops
//!
//! Uses plain `tracing` events keyed by the invocation id so every attempt of
//! one logical call can be correlated.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{RetryError, RetryMetadata};
use super::types::RetryErrorType;

/// Opens a [`RetrySpan`] per logical call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryTracer;

impl RetryTracer {
    pub const fn new() -> Self {
        Self
    }

    /// Start tracking one logical call
    pub fn start_retry_span(
        &self,
        operation_name: &str,
        invocation_id: Uuid,
        max_attempts: u32,
    ) -> RetrySpan {
        debug!(
            operation = operation_name,
            %invocation_id,
            max_attempts,
            "Starting retryable call"
        );

        RetrySpan { operation_name: operation_name.to_string(), invocation_id, max_attempts }
    }
}

/// Events of one logical call
#[derive(Debug, Clone)]
pub struct RetrySpan {
    operation_name: String,
    invocation_id: Uuid,
    max_attempts: u32,
}

impl RetrySpan {
    pub const fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Record an attempt, with the delay slept before it
    pub fn record_attempt(&self, attempt: u32, delay: Option<Duration>) {
        match delay {
            Some(delay) => debug!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis(),
                "Retrying after delay"
            ),
            None => debug!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                attempt,
                max_attempts = self.max_attempts,
                "First attempt"
            ),
        }
    }

    /// Record a failed attempt
    pub fn record_failure(&self, attempt: u32, error: &str, error_type: RetryErrorType) {
        debug!(
            operation = %self.operation_name,
            invocation_id = %self.invocation_id,
            attempt,
            error_type = %error_type,
            error = %error,
            "Attempt failed"
        );
    }

    /// Record the call succeeding
    pub fn record_success(&self, metadata: &RetryMetadata) {
        if metadata.attempts > 1 {
            info!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                attempts = metadata.attempts,
                total_retry_delay_ms = metadata.total_retry_delay.as_millis(),
                "Call succeeded after retries"
            );
        } else {
            debug!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                "Call succeeded"
            );
        }
    }

    /// Record the strategy refusing another retry
    pub fn record_refused(&self, reason: &RetryError, metadata: &RetryMetadata) {
        match reason {
            RetryError::NotRetryable { .. } => debug!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                attempts = metadata.attempts,
                reason = %reason,
                "Error is not retryable"
            ),
            _ => warn!(
                operation = %self.operation_name,
                invocation_id = %self.invocation_id,
                attempts = metadata.attempts,
                max_attempts = self.max_attempts,
                total_retry_delay_ms = metadata.total_retry_delay.as_millis(),
                reason = %reason,
                "Retries exhausted"
            ),
        }
    }

    /// Record giving up because the next wait would pass the deadline
    pub fn record_deadline_exceeded(&self, deadline: Duration, elapsed: Duration) {
        warn!(
            operation = %self.operation_name,
            invocation_id = %self.invocation_id,
            deadline_ms = deadline.as_millis(),
            elapsed_ms = elapsed.as_millis(),
            "Retry deadline exceeded"
        );
    }
}
