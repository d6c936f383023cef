//! # Ebbflow Infrastructure
//!
//! Adapters that put the retry core from `ebbflow-common` to work.
//!
//! This crate contains:
//! - Configuration loading from files and environment variables
//! - Strategy construction from configuration
//! - An HTTP client whose calls run under a shared retry strategy
//!
//! ## Architecture
//! - Depends on `ebbflow-common` for strategies, rate limiting and errors
//! - Contains all "impure" code (file system, environment, network)

pub mod config;
pub mod errors;
pub mod http;
pub mod retry;

// Re-export commonly used items
pub use config::RetryClientConfig;
pub use errors::{InfraError, InfraResult};
pub use http::{HttpClient, HttpClientBuilder};
pub use retry::{build_retry_strategy, build_retry_strategy_with_provider, EnvMaxAttemptsProvider};
