use std::sync::Arc;
use std::time::{Duration, SystemTime};

use ebbflow_common::retry::constants::{INVOCATION_ID_HEADER, REQUEST_HEADER};
use ebbflow_common::retry::{
    AttemptContext, RetryClassifier, RetryErrorInfo, RetryExecutor, RetryFailure, RetryMetadata,
    RetryStrategy,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::classify::{classify_status, classify_transport};
use super::retry_after::retry_after_hint;
use crate::config::RetryClientConfig;
use crate::errors::{InfraError, InfraResult};
use crate::retry::build_retry_strategy;

/// HTTP client whose retries are decided by a shared [`RetryStrategy`].
///
/// Every attempt carries an `ebbflow-invocation-id` header, identical across
/// the attempts of one call, and an `ebbflow-request: attempt=N; max=M`
/// header, unless the client was built with
/// [`omit_retry_headers`](HttpClientBuilder::omit_retry_headers).
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    strategy: Arc<dyn RetryStrategy>,
    deadline: Option<Duration>,
    omit_retry_headers: bool,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> InfraResult<Self> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    pub fn strategy(&self) -> &Arc<dyn RetryStrategy> {
        &self.strategy
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// Responses with a throttling or transient status are retried. Any other
    /// response, including 4xx, is returned as-is. When retries run out on a
    /// retryable status the result is [`InfraError::Status`].
    pub async fn send(&self, builder: RequestBuilder) -> InfraResult<Response> {
        let request = builder.build()?;

        if request.try_clone().is_none() {
            warn!(
                method = %request.method(),
                url = %request.url(),
                "Request body cannot be replayed; sending once without retries"
            );
            return self.send_once(request).await;
        }

        let mut executor = RetryExecutor::new(Arc::clone(&self.strategy), HttpClassifier)
            .with_operation_name(format!("{} {}", request.method(), request.url().path()));
        if let Some(deadline) = self.deadline {
            executor = executor.with_deadline(deadline);
        }

        let template = &request;
        let outcome = executor
            .execute(|ctx| async move {
                let attempt = template.try_clone().ok_or(AttemptError::NotReplayable)?;
                self.send_attempt(attempt, &ctx).await
            })
            .await;

        match outcome {
            Ok(retried) => {
                debug!(
                    attempts = retried.metadata.attempts,
                    status = %retried.value.status(),
                    "HTTP call completed"
                );
                Ok(retried.value)
            }
            Err(RetryFailure::Exhausted { error, metadata }) => Err(error.into_infra(metadata)),
            Err(failure @ RetryFailure::DeadlineExceeded { .. }) => {
                Err(InfraError::Retry(failure.map_err(|e| e.to_string())))
            }
        }
    }

    async fn send_attempt(
        &self,
        mut request: Request,
        ctx: &AttemptContext,
    ) -> Result<Response, AttemptError> {
        if !self.omit_retry_headers {
            attach_attempt_headers(request.headers_mut(), ctx)?;
        }
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(attempt = ctx.attempt, %method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(AttemptError::Transport)?;
        let status = response.status();
        debug!(attempt = ctx.attempt, %method, %url, %status, "received HTTP response");

        if classify_status(status).is_retryable() {
            let retry_after = retry_after_hint(response.headers(), SystemTime::now());
            return Err(AttemptError::Status { response, retry_after });
        }
        Ok(response)
    }

    async fn send_once(&self, mut request: Request) -> InfraResult<Response> {
        if !self.omit_retry_headers {
            let ctx = AttemptContext {
                invocation_id: Uuid::new_v4(),
                attempt: 1,
                max_attempts: 1,
            };
            attach_attempt_headers(request.headers_mut(), &ctx)
                .map_err(|e| e.into_infra(RetryMetadata::default()))?;
        }
        let metadata = RetryMetadata { attempts: 1, total_retry_delay: Duration::ZERO };
        self.client
            .execute(request)
            .await
            .map_err(|source| InfraError::Http { source, metadata })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("retry_mode", &self.strategy.mode())
            .field("deadline", &self.deadline)
            .field("omit_retry_headers", &self.omit_retry_headers)
            .finish_non_exhaustive()
    }
}

fn attach_attempt_headers(headers: &mut HeaderMap, ctx: &AttemptContext) -> Result<(), AttemptError> {
    let invocation = HeaderValue::try_from(ctx.invocation_id.to_string())
        .map_err(|e| AttemptError::InvalidHeader(e.to_string()))?;
    let request = HeaderValue::try_from(ctx.request_header_value())
        .map_err(|e| AttemptError::InvalidHeader(e.to_string()))?;
    headers.insert(INVOCATION_ID_HEADER, invocation);
    headers.insert(REQUEST_HEADER, request);
    Ok(())
}

/// Failure of a single HTTP attempt.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("{0}")]
    Transport(reqwest::Error),

    #[error("HTTP {}", .response.status())]
    Status { response: Response, retry_after: Option<SystemTime> },

    #[error("request body cannot be replayed")]
    NotReplayable,

    #[error("invalid attempt header: {0}")]
    InvalidHeader(String),
}

impl AttemptError {
    fn into_infra(self, metadata: RetryMetadata) -> InfraError {
        match self {
            Self::Transport(source) => InfraError::Http { source, metadata },
            Self::Status { response, retry_after } => InfraError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
                metadata,
                retry_after: retry_after
                    .and_then(|hint| hint.duration_since(SystemTime::now()).ok()),
            },
            Self::NotReplayable => {
                InfraError::config("request body cannot be replayed; buffer it to enable retries")
            }
            Self::InvalidHeader(message) => InfraError::config(message),
        }
    }
}

/// Classifies attempt failures for the retry strategy.
#[derive(Debug, Clone, Copy)]
struct HttpClassifier;

impl RetryClassifier<AttemptError> for HttpClassifier {
    fn classify(&self, error: &AttemptError) -> RetryErrorInfo {
        match error {
            AttemptError::Transport(err) => RetryErrorInfo::new(classify_transport(err)),
            AttemptError::Status { response, retry_after } => {
                let info = RetryErrorInfo::new(classify_status(response.status()));
                match retry_after {
                    Some(hint) => info.with_retry_after(*hint),
                    None => info,
                }
            }
            AttemptError::NotReplayable | AttemptError::InvalidHeader(_) => {
                RetryErrorInfo::client_error()
            }
        }
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    retry_config: RetryClientConfig,
    retry_strategy: Option<Arc<dyn RetryStrategy>>,
    omit_retry_headers: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: None,
            retry_config: RetryClientConfig::default(),
            retry_strategy: None,
            omit_retry_headers: false,
        }
    }
}

impl std::fmt::Debug for HttpClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientBuilder")
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("retry_config", &self.retry_config)
            .field("omit_retry_headers", &self.omit_retry_headers)
            .finish_non_exhaustive()
    }
}

impl HttpClientBuilder {
    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the retry strategy from configuration. Ignored when
    /// [`retry_strategy`](Self::retry_strategy) is set.
    pub fn retry_config(mut self, config: RetryClientConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Share an existing strategy, and its capacity, with other clients.
    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategy>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// Stop attaching the invocation-id and attempt headers, for servers
    /// that reject unknown headers.
    pub fn omit_retry_headers(mut self, omit: bool) -> Self {
        self.omit_retry_headers = omit;
        self
    }

    pub fn build(self) -> InfraResult<HttpClient> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build()?;
        let strategy = match self.retry_strategy {
            Some(strategy) => strategy,
            None => build_retry_strategy(&self.retry_config)?,
        };

        Ok(HttpClient {
            client,
            strategy,
            deadline: self.retry_config.deadline,
            omit_retry_headers: self.omit_retry_headers,
        })
    }
}
