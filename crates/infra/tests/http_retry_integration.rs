//! Integration tests for the retrying HTTP client
//!
//! Runs the client against a wiremock server with strategies built the way
//! applications build them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ebbflow_common::retry::constants::{INVOCATION_ID_HEADER, REQUEST_HEADER};
use ebbflow_common::retry::{ConfiguredRetryStrategy, RetryMode, RetryQuotaConfig, RetryStrategy};
use ebbflow_infra::{build_retry_strategy, HttpClient, InfraError, RetryClientConfig};
use reqwest::{Method, StatusCode};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Route retry log events to the test output; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mounts a responder that fails `failures` times with `status`, then
/// answers 200.
async fn flaky_server(status: u16, failures: usize) -> MockServer {
    let server = MockServer::start().await;
    let seen = Arc::new(AtomicUsize::new(0));
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
            if seen.fetch_add(1, Ordering::SeqCst) < failures {
                ResponseTemplate::new(status)
            } else {
                ResponseTemplate::new(200).set_body_string("[]")
            }
        })
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_two_clients_share_one_strategy() {
    init_tracing();
    let strategy: Arc<dyn RetryStrategy> = Arc::new(ConfiguredRetryStrategy::with_constant_delay(
        3,
        Duration::from_millis(2),
    ));
    let first = HttpClient::builder().retry_strategy(Arc::clone(&strategy)).build().unwrap();
    let second = HttpClient::builder().retry_strategy(Arc::clone(&strategy)).build().unwrap();

    let server = flaky_server(503, 1).await;
    let url = format!("{}/orders", server.uri());

    let a = first.send(first.request(Method::GET, &url)).await.expect("first call");
    let b = second.send(second.request(Method::GET, &url)).await.expect("second call");

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert!(Arc::ptr_eq(first.strategy(), second.strategy()));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let first_id = requests[0].headers.get(INVOCATION_ID_HEADER).unwrap();
    let last_id = requests[2].headers.get(INVOCATION_ID_HEADER).unwrap();
    assert_ne!(first_id, last_id);
}

#[tokio::test]
async fn test_adaptive_client_from_config() {
    let config = RetryClientConfig::builder()
        .retry_mode(RetryMode::Adaptive)
        .max_attempts(3)
        .build()
        .unwrap();
    let strategy = build_retry_strategy(&config).unwrap();
    let client = HttpClient::builder().retry_strategy(strategy).build().unwrap();

    let server = flaky_server(500, 1).await;
    let response = client
        .send(client.request(Method::GET, format!("{}/orders", server.uri())))
        .await
        .expect("adaptive call");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "[]");
}

#[tokio::test]
async fn test_deadline_stops_long_waits() {
    init_tracing();
    let config = RetryClientConfig::builder().deadline(Duration::from_millis(200)).build().unwrap();
    let strategy = Arc::new(ConfiguredRetryStrategy::with_constant_delay(5, Duration::from_secs(5)));
    let client =
        HttpClient::builder().retry_config(config).retry_strategy(strategy.clone()).build().unwrap();

    let server = flaky_server(503, usize::MAX).await;
    let err = client
        .send(client.request(Method::GET, format!("{}/orders", server.uri())))
        .await
        .unwrap_err();

    match err {
        InfraError::Retry(failure) => {
            assert!(failure.is_deadline_exceeded());
            assert_eq!(failure.metadata().attempts, 1);
            assert_eq!(failure.last_error().map(String::as_str), Some("HTTP 503 Service Unavailable"));
        }
        other => panic!("expected deadline failure, got {other:?}"),
    }
    // The granted retry was charged before the deadline check
    assert_eq!(strategy.capacity(), 490);
}

#[tokio::test]
async fn test_exhausted_error_reports_retry_metadata() {
    let strategy = Arc::new(ConfiguredRetryStrategy::with_constant_delay(2, Duration::from_millis(1)));
    let client = HttpClient::builder().retry_strategy(strategy).build().unwrap();

    let server = flaky_server(429, usize::MAX).await;
    let err = client
        .send(client.request(Method::GET, format!("{}/orders", server.uri())))
        .await
        .unwrap_err();

    let metadata = err.retry_metadata().expect("retry loop metadata");
    assert_eq!(metadata.attempts, 2);
    assert!(matches!(err, InfraError::Status { status: 429, .. }));
}

#[tokio::test]
async fn test_configured_quota_refuses_costly_retry() {
    init_tracing();
    // Covers one throttling retry but not a timeout retry
    let quota = RetryQuotaConfig { initial_retry_tokens: 6, ..RetryQuotaConfig::default() };
    let config = RetryClientConfig::builder().max_attempts(5).quota(quota).build().unwrap();
    let client = HttpClient::builder().retry_config(config).omit_retry_headers(true).build().unwrap();

    let server = flaky_server(503, usize::MAX).await;
    let err = client
        .send(client.request(Method::GET, format!("{}/orders", server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, InfraError::Status { status: 503, .. }));
    assert_eq!(err.retry_metadata().map(|m| m.attempts), Some(1));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get(INVOCATION_ID_HEADER).is_none());
    assert!(requests[0].headers.get(REQUEST_HEADER).is_none());
}
