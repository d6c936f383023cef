// Constants for the retry core
use std::time::Duration;

/// Attempts (initial call included) when no provider value is available
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff base for every error type except throttling
pub const DEFAULT_RETRY_DELAY_BASE: Duration = Duration::from_millis(100);

/// Backoff base for throttling errors
pub const THROTTLING_RETRY_DELAY_BASE: Duration = Duration::from_millis(500);

/// Hard ceiling on any single retry delay
pub const MAXIMUM_RETRY_DELAY: Duration = Duration::from_millis(20_000);

/// Starting and maximum value of the retry capacity ledger
pub const INITIAL_RETRY_TOKENS: u32 = 500;

/// Capacity charged for retrying a throttling error
pub const RETRY_COST: u32 = 5;

/// Capacity charged for retrying a transient (timeout-class) error
pub const TIMEOUT_RETRY_COST: u32 = 10;

/// Capacity credited when a call succeeds without retrying
pub const NO_RETRY_INCREMENT: u32 = 1;

/// Rate limiter: multiplicative decrease factor on throttle
pub const DEFAULT_BETA: f64 = 0.7;

/// Rate limiter: floor on bucket capacity
pub const DEFAULT_MIN_CAPACITY: f64 = 1.0;

/// Rate limiter: floor on fill rate (tokens per second)
pub const DEFAULT_MIN_FILL_RATE: f64 = 0.5;

/// Rate limiter: cubic growth scale
pub const DEFAULT_SCALE_CONSTANT: f64 = 0.4;

/// Rate limiter: weight of the newest sample in the measured send rate
pub const DEFAULT_SMOOTH: f64 = 0.8;

/// Header carrying the per-call invocation id
pub const INVOCATION_ID_HEADER: &str = "ebbflow-invocation-id";

/// Header carrying `attempt=N; max=M`
pub const REQUEST_HEADER: &str = "ebbflow-request";
