//! HTTP client with strategy-driven retries

pub mod classify;
pub mod client;
pub mod retry_after;

pub use classify::{classify_status, classify_transport};
pub use client::{HttpClient, HttpClientBuilder};
pub use retry_after::retry_after_hint;
