//! Retry strategy wiring for infrastructure clients

pub mod factory;
pub mod provider;

pub use factory::{build_retry_strategy, build_retry_strategy_with_provider};
pub use provider::EnvMaxAttemptsProvider;
