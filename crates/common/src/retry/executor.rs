//! Retry loop driving an operation through a [`RetryStrategy`]

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::instrument;
use uuid::Uuid;

use super::error::{RetryFailure, RetryMetadata};
use super::strategy::RetryStrategy;
use super::tracing::RetryTracer;
use super::types::RetryErrorInfo;

/// Maps an operation's error to the classification strategies understand.
pub trait RetryClassifier<E>: Send + Sync {
    fn classify(&self, error: &E) -> RetryErrorInfo;
}

/// Adapts a closure into a [`RetryClassifier`].
#[derive(Clone, Copy)]
pub struct FnClassifier<F>(F);

impl<F> FnClassifier<F> {
    pub const fn new(classify: F) -> Self {
        Self(classify)
    }
}

impl<F> fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnClassifier")
    }
}

impl<E, F> RetryClassifier<E> for FnClassifier<F>
where
    F: Fn(&E) -> RetryErrorInfo + Send + Sync,
{
    fn classify(&self, error: &E) -> RetryErrorInfo {
        (self.0)(error)
    }
}

/// Identity of one attempt, handed to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    /// Shared by every attempt of one logical call
    pub invocation_id: Uuid,
    /// 1-based attempt number
    pub attempt: u32,
    pub max_attempts: u32,
}

impl AttemptContext {
    /// Value for the per-attempt request header, `attempt=N; max=M`.
    pub fn request_header_value(&self) -> String {
        format!("attempt={}; max={}", self.attempt, self.max_attempts)
    }
}

/// Successful outcome of a retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub metadata: RetryMetadata,
}

impl<T> Retried<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Runs an operation until it succeeds or the strategy stops granting
/// retries.
///
/// ```
/// use std::sync::Arc;
///
/// use ebbflow_common::retry::{
///     FnClassifier, RetryErrorInfo, RetryExecutor, StandardRetryStrategy,
/// };
///
/// # tokio_test::block_on(async {
/// let executor = RetryExecutor::new(
///     Arc::new(StandardRetryStrategy::new(3)),
///     FnClassifier::new(|_: &String| RetryErrorInfo::client_error()),
/// );
/// let outcome = executor.execute(|ctx| async move { Ok::<_, String>(ctx.attempt) }).await.unwrap();
/// assert_eq!(outcome.value, 1);
/// assert_eq!(outcome.metadata.attempts, 1);
/// # });
/// ```
#[derive(Clone)]
pub struct RetryExecutor<K> {
    strategy: Arc<dyn RetryStrategy>,
    classifier: K,
    deadline: Option<Duration>,
    operation_name: String,
    tracer: RetryTracer,
}

impl<K> RetryExecutor<K> {
    pub fn new(strategy: Arc<dyn RetryStrategy>, classifier: K) -> Self {
        Self {
            strategy,
            classifier,
            deadline: None,
            operation_name: "call".to_string(),
            tracer: RetryTracer::new(),
        }
    }

    /// Bound the whole call, waits included.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Name used in log events.
    #[must_use]
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = name.into();
        self
    }

    pub fn strategy(&self) -> &Arc<dyn RetryStrategy> {
        &self.strategy
    }

    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Run `operation` under the retry strategy.
    ///
    /// The operation is invoked once per attempt with that attempt's
    /// [`AttemptContext`]. On refusal the operation's last error is returned
    /// inside [`RetryFailure::Exhausted`].
    #[instrument(skip_all, fields(operation = %self.operation_name))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<Retried<T>, RetryFailure<E>>
    where
        F: FnMut(AttemptContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        K: RetryClassifier<E>,
    {
        let started = Instant::now();
        let max_attempts = self.strategy.max_attempts().await;
        let invocation_id = Uuid::new_v4();
        let span = self.tracer.start_retry_span(&self.operation_name, invocation_id, max_attempts);
        let mut metadata = RetryMetadata::default();

        let initial = self.strategy.acquire_initial_retry_token();
        let mut token = match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, initial).await {
                Ok(token) => token,
                Err(_) => {
                    span.record_deadline_exceeded(deadline, started.elapsed());
                    return Err(RetryFailure::DeadlineExceeded { last_error: None, metadata, deadline });
                }
            },
            None => initial.await,
        };
        let mut last_delay = None;

        loop {
            metadata.attempts += 1;
            span.record_attempt(metadata.attempts, last_delay);
            let context = AttemptContext { invocation_id, attempt: metadata.attempts, max_attempts };

            let error = match operation(context).await {
                Ok(value) => {
                    self.strategy.record_success(&token);
                    span.record_success(&metadata);
                    return Ok(Retried { value, metadata });
                }
                Err(error) => error,
            };

            let info = self.classifier.classify(&error);
            span.record_failure(metadata.attempts, &error.to_string(), info.error_type);

            let next = match self.strategy.refresh_retry_token_for_retry(&token, &info).await {
                Ok(next) => next,
                Err(refusal) => {
                    span.record_refused(&refusal, &metadata);
                    return Err(RetryFailure::Exhausted { error, metadata });
                }
            };

            let delay = next.retry_delay();
            if let Some(deadline) = self.deadline {
                let elapsed = started.elapsed();
                if elapsed.saturating_add(delay) > deadline {
                    span.record_deadline_exceeded(deadline, elapsed);
                    return Err(RetryFailure::DeadlineExceeded {
                        last_error: Some(error),
                        metadata,
                        deadline,
                    });
                }
            }

            tokio::time::sleep(delay).await;
            metadata.total_retry_delay = metadata.total_retry_delay.saturating_add(delay);

            let send = self.strategy.acquire_send_token();
            if let Some(deadline) = self.deadline {
                let remaining = deadline.saturating_sub(started.elapsed());
                if tokio::time::timeout(remaining, send).await.is_err() {
                    span.record_deadline_exceeded(deadline, started.elapsed());
                    return Err(RetryFailure::DeadlineExceeded {
                        last_error: Some(error),
                        metadata,
                        deadline,
                    });
                }
            } else {
                send.await;
            }
            last_delay = Some(delay);
            token = next;
        }
    }
}

impl<K> fmt::Debug for RetryExecutor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("mode", &self.strategy.mode())
            .field("deadline", &self.deadline)
            .field("operation_name", &self.operation_name)
            .finish_non_exhaustive()
    }
}
