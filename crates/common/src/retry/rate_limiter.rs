//! Client-side send-rate limiting for adaptive retries
//!
//! [`DefaultRateLimiter`] is a token bucket whose fill rate follows a cubic
//! curve: multiplicative decrease when the server throttles, then cubic
//! recovery toward (and past) the rate at which throttling last began. The
//! bucket stays disabled until the first throttling response, so clients that
//! are never throttled pay nothing.
//!
//! All state sits behind one mutex. Critical sections only do arithmetic;
//! waiting for tokens happens after the lock is released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::constants::{
    DEFAULT_BETA, DEFAULT_MIN_CAPACITY, DEFAULT_MIN_FILL_RATE, DEFAULT_SCALE_CONSTANT,
    DEFAULT_SMOOTH,
};
use crate::time::{Clock, SystemClock};

/// Throttles how fast attempts may be issued.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one send token is available, then take it.
    async fn get_send_token(&self);

    /// Feed the outcome of an attempt back into the rate controller.
    fn update_client_sending_rate(&self, throttled: bool);
}

/// Tuning for [`DefaultRateLimiter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Multiplicative decrease applied on throttle, in `(0, 1)`
    pub beta: f64,
    /// Floor on bucket capacity
    pub min_capacity: f64,
    /// Floor on fill rate, tokens per second
    pub min_fill_rate: f64,
    /// Scale of the cubic recovery curve
    pub scale_constant: f64,
    /// Weight of the newest sample in the measured send rate, in `(0, 1]`
    pub smooth: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            min_capacity: DEFAULT_MIN_CAPACITY,
            min_fill_rate: DEFAULT_MIN_FILL_RATE,
            scale_constant: DEFAULT_SCALE_CONSTANT,
            smooth: DEFAULT_SMOOTH,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new configuration builder
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        let values =
            [self.beta, self.min_capacity, self.min_fill_rate, self.scale_constant, self.smooth];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("rate limiter settings must be finite numbers".to_string());
        }
        if self.beta <= 0.0 || self.beta >= 1.0 {
            return Err(format!("beta must be between 0 and 1 (exclusive), got {}", self.beta));
        }
        if self.min_capacity <= 0.0 {
            return Err("min_capacity must be greater than 0".to_string());
        }
        if self.min_fill_rate <= 0.0 {
            return Err("min_fill_rate must be greater than 0".to_string());
        }
        if self.scale_constant <= 0.0 {
            return Err("scale_constant must be greater than 0".to_string());
        }
        if self.smooth <= 0.0 || self.smooth > 1.0 {
            return Err(format!("smooth must be in (0, 1], got {}", self.smooth));
        }
        Ok(())
    }
}

/// Builder for RateLimiterConfig
#[derive(Debug, Default)]
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterConfigBuilder {
    /// Builder starting from the default tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiplicative decrease applied to the rate on throttling
    pub fn beta(mut self, beta: f64) -> Self {
        self.config.beta = beta;
        self
    }

    /// Floor for the bucket's capacity
    pub fn min_capacity(mut self, min_capacity: f64) -> Self {
        self.config.min_capacity = min_capacity;
        self
    }

    /// Floor for the refill rate, in tokens per second
    pub fn min_fill_rate(mut self, min_fill_rate: f64) -> Self {
        self.config.min_fill_rate = min_fill_rate;
        self
    }

    /// Scaling of the cubic growth curve
    pub fn scale_constant(mut self, scale_constant: f64) -> Self {
        self.config.scale_constant = scale_constant;
        self
    }

    /// Weight of the newest sample in the measured send rate
    pub fn smooth(mut self, smooth: f64) -> Self {
        self.config.smooth = smooth;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns a message describing the first invalid setting.
    pub fn build(self) -> Result<RateLimiterConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Point-in-time copy of the limiter's numeric state.
///
/// Times are seconds since the limiter was created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterSnapshot {
    pub fill_rate: f64,
    pub max_capacity: f64,
    pub current_capacity: f64,
    pub measured_tx_rate: f64,
    pub last_max_rate: f64,
    pub last_throttle_time: f64,
    pub time_window: f64,
    pub request_count: u64,
    pub last_timestamp: Option<f64>,
    pub last_tx_rate_bucket: f64,
    pub enabled: bool,
}

#[derive(Debug)]
struct LimiterState {
    fill_rate: f64,
    max_capacity: f64,
    current_capacity: f64,
    measured_tx_rate: f64,
    last_max_rate: f64,
    last_throttle_time: f64,
    time_window: f64,
    request_count: u64,
    last_timestamp: Option<f64>,
    last_tx_rate_bucket: f64,
    enabled: bool,
}

impl LimiterState {
    fn new(config: &RateLimiterConfig, now: f64) -> Self {
        Self {
            fill_rate: config.min_fill_rate,
            max_capacity: config.min_capacity,
            current_capacity: 0.0,
            measured_tx_rate: 0.0,
            last_max_rate: 0.0,
            last_throttle_time: now,
            time_window: 0.0,
            request_count: 0,
            last_timestamp: None,
            last_tx_rate_bucket: now.floor(),
            enabled: false,
        }
    }

    /// Add tokens accrued since the last refill. The first call only records
    /// the timestamp. A timestamp in the future marks tokens already
    /// reserved by a waiting caller.
    fn refill(&mut self, now: f64) {
        match self.last_timestamp {
            None => self.last_timestamp = Some(now),
            Some(last) if now > last => {
                let accrued = (now - last) * self.fill_rate;
                self.current_capacity = (self.current_capacity + accrued).min(self.max_capacity);
                self.last_timestamp = Some(now);
            }
            Some(_) => {}
        }
    }

    /// Half-second buckets, exponentially smoothed.
    fn update_measured_rate(&mut self, now: f64, smooth: f64) {
        let bucket = (now * 2.0).floor() / 2.0;
        self.request_count += 1;
        if bucket > self.last_tx_rate_bucket {
            let current_rate = self.request_count as f64 / (bucket - self.last_tx_rate_bucket);
            self.measured_tx_rate = current_rate * smooth + self.measured_tx_rate * (1.0 - smooth);
            self.request_count = 0;
            self.last_tx_rate_bucket = bucket;
        }
    }

    fn snapshot(&self) -> RateLimiterSnapshot {
        RateLimiterSnapshot {
            fill_rate: self.fill_rate,
            max_capacity: self.max_capacity,
            current_capacity: self.current_capacity,
            measured_tx_rate: self.measured_tx_rate,
            last_max_rate: self.last_max_rate,
            last_throttle_time: self.last_throttle_time,
            time_window: self.time_window,
            request_count: self.request_count,
            last_timestamp: self.last_timestamp,
            last_tx_rate_bucket: self.last_tx_rate_bucket,
            enabled: self.enabled,
        }
    }
}

/// Cubic token-bucket rate limiter.
///
/// Clones share the same state.
///
/// ```
/// use ebbflow_common::retry::{DefaultRateLimiter, RateLimiter};
///
/// # tokio_test::block_on(async {
/// let limiter = DefaultRateLimiter::new();
/// // Disabled until the first throttling response
/// limiter.get_send_token().await;
/// limiter.update_client_sending_rate(true);
/// assert!(limiter.snapshot().enabled);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct DefaultRateLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    state: Arc<Mutex<LimiterState>>,
    clock: Arc<C>,
    epoch: Instant,
}

impl DefaultRateLimiter<SystemClock> {
    /// Limiter with default tuning and the system clock
    pub fn new() -> Self {
        let config = RateLimiterConfig::default();
        let clock = SystemClock;
        let epoch = clock.now();
        Self {
            state: Arc::new(Mutex::new(LimiterState::new(&config, 0.0))),
            config,
            clock: Arc::new(clock),
            epoch,
        }
    }

    /// Limiter with custom tuning and the system clock
    ///
    /// # Errors
    /// Returns a message when `config` fails validation.
    pub fn with_config(config: RateLimiterConfig) -> Result<Self, String> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for DefaultRateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> DefaultRateLimiter<C> {
    /// Limiter driven by a custom clock (for testing)
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Result<Self, String> {
        config.validate()?;
        let epoch = clock.now();
        Ok(Self {
            state: Arc::new(Mutex::new(LimiterState::new(&config, 0.0))),
            config,
            clock: Arc::new(clock),
            epoch,
        })
    }

    /// Tuning this limiter was built with.
    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Copy of the current bucket and rate state.
    pub fn snapshot(&self) -> RateLimiterSnapshot {
        self.state.lock().snapshot()
    }

    fn now_secs(&self) -> f64 {
        self.clock.now().saturating_duration_since(self.epoch).as_secs_f64()
    }

    /// Take `amount` tokens, reserving any shortfall against future refills.
    ///
    /// Returns the reservation the caller must wait out, or `None` when
    /// tokens were available or the bucket is disabled.
    fn reserve(&self, amount: f64) -> Option<Reservation<'_, C>> {
        let mut state = self.state.lock();
        if !state.enabled {
            return None;
        }
        let now = self.now_secs();
        state.refill(now);
        if amount <= state.current_capacity {
            state.current_capacity -= amount;
            return None;
        }

        // queue behind tokens already reserved by earlier waiters
        let taken = state.current_capacity;
        let span = (amount - taken) / state.fill_rate;
        let reserved_from = state.last_timestamp.map_or(now, |last| last.max(now));
        let ready_at = reserved_from + span;
        state.current_capacity = 0.0;
        state.last_timestamp = Some(ready_at);
        Some(Reservation {
            limiter: self,
            wait: Duration::try_from_secs_f64(ready_at - now).unwrap_or(Duration::ZERO),
            taken,
            span,
            settled: false,
        })
    }

    /// Give back a reservation whose waiter went away before it was due.
    fn release(&self, taken: f64, span: f64) {
        let mut state = self.state.lock();
        if let Some(last) = state.last_timestamp {
            state.last_timestamp = Some(last - span);
        }
        state.current_capacity = (state.current_capacity + taken).min(state.max_capacity);
        debug!(returned_secs = span, "Released abandoned send token reservation");
    }

    async fn acquire_token_bucket(&self, amount: f64) {
        if let Some(mut reservation) = self.reserve(amount) {
            debug!(wait_ms = reservation.wait.as_millis(), "Waiting for send token");
            tokio::time::sleep(reservation.wait).await;
            reservation.settled = true;
        }
    }

    fn update_sending_rate(&self, throttled: bool) {
        let RateLimiterConfig { beta, min_capacity, min_fill_rate, scale_constant, smooth } =
            self.config;
        let mut state = self.state.lock();
        // read under the lock so updates apply in timestamp order
        let now = self.now_secs();
        state.update_measured_rate(now, smooth);

        let calculated_rate = if throttled {
            let rate_to_use = if state.enabled {
                state.measured_tx_rate.min(state.fill_rate)
            } else {
                state.measured_tx_rate
            };
            state.last_max_rate = rate_to_use;
            state.time_window = (rate_to_use * (1.0 - beta) / scale_constant).cbrt();
            state.last_throttle_time = now;
            if !state.enabled {
                info!(measured_tx_rate = state.measured_tx_rate, "Client-side rate limiting enabled");
            }
            state.enabled = true;
            rate_to_use * beta
        } else {
            let since_window = now - state.last_throttle_time - state.time_window;
            scale_constant * since_window.powi(3) + state.last_max_rate
        };

        let new_rate = calculated_rate.min(2.0 * state.measured_tx_rate);
        state.refill(now);
        state.fill_rate = new_rate.max(min_fill_rate);
        state.max_capacity = new_rate.max(min_capacity);
        state.current_capacity = state.current_capacity.min(state.max_capacity);

        debug!(
            throttled,
            fill_rate = state.fill_rate,
            max_capacity = state.max_capacity,
            measured_tx_rate = state.measured_tx_rate,
            "Updated client sending rate"
        );
    }
}

/// Tokens taken from the bucket ahead of time by one waiter.
///
/// Dropped before the wait completes (the waiting future was cancelled), it
/// hands the slot back so later callers do not queue behind it.
struct Reservation<'a, C: Clock> {
    limiter: &'a DefaultRateLimiter<C>,
    wait: Duration,
    /// Tokens that were in the bucket when the reservation was made
    taken: f64,
    /// Seconds of refill reserved for the shortfall
    span: f64,
    settled: bool,
}

impl<C: Clock> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.release(self.taken, self.span);
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> RateLimiter for DefaultRateLimiter<C> {
    async fn get_send_token(&self) {
        self.acquire_token_bucket(1.0).await;
    }

    fn update_client_sending_rate(&self, throttled: bool) {
        self.update_sending_rate(throttled);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry::rate_limiter.
    use super::*;
    use crate::time::MockClock;

    const EPS: f64 = 1e-9;

    fn limiter() -> (DefaultRateLimiter<MockClock>, MockClock) {
        let clock = MockClock::new();
        let limiter = DefaultRateLimiter::with_clock(RateLimiterConfig::default(), clock.clone())
            .unwrap();
        (limiter, clock)
    }

    /// Reserve and keep the tokens, as a caller that waits to the end does.
    fn reserve_wait(limiter: &DefaultRateLimiter<MockClock>, amount: f64) -> Option<Duration> {
        limiter.reserve(amount).map(|mut reservation| {
            reservation.settled = true;
            reservation.wait
        })
    }

    /// Drive `n` non-throttled updates spaced one second apart.
    fn warm_up(limiter: &DefaultRateLimiter<MockClock>, clock: &MockClock, n: usize) {
        for _ in 0..n {
            clock.advance(Duration::from_secs(1));
            limiter.update_client_sending_rate(false);
        }
    }

    /// Validates the initial state.
    ///
    /// Assertions:
    /// - Disabled, empty bucket, fill rate and capacity at their floors.
    #[test]
    fn test_initial_state() {
        let (limiter, _) = limiter();
        let snap = limiter.snapshot();
        assert!(!snap.enabled);
        assert_eq!(snap.current_capacity, 0.0);
        assert_eq!(snap.fill_rate, 0.5);
        assert_eq!(snap.max_capacity, 1.0);
        assert_eq!(snap.last_timestamp, None);
    }

    /// Validates a disabled bucket never makes callers wait.
    ///
    /// Assertions:
    /// - `reserve` returns `None` and leaves the state untouched.
    #[test]
    fn test_disabled_bucket_is_free() {
        let (limiter, _) = limiter();
        let before = limiter.snapshot();
        assert_eq!(reserve_wait(&limiter, 1.0), None);
        assert_eq!(limiter.snapshot(), before);
    }

    /// Tests the smoothed measurement uses half-second buckets.
    ///
    /// Verifies:
    /// - Two updates in one bucket count toward the next sample
    /// - `measured = rate * 0.8 + previous * 0.2`
    #[test]
    fn test_measured_rate_smoothing() {
        let (limiter, clock) = limiter();

        clock.advance(Duration::from_millis(1_000));
        limiter.update_client_sending_rate(false);
        // bucket 1.0, one request over one second
        assert!((limiter.snapshot().measured_tx_rate - 0.8).abs() < EPS);

        clock.advance(Duration::from_millis(200));
        limiter.update_client_sending_rate(false);
        // still bucket 1.0: counted, not sampled
        assert_eq!(limiter.snapshot().request_count, 1);

        clock.advance(Duration::from_millis(300));
        limiter.update_client_sending_rate(false);
        // bucket 1.5: two requests over half a second = 4/s
        let expected = 4.0 * 0.8 + 0.8 * 0.2;
        assert!((limiter.snapshot().measured_tx_rate - expected).abs() < EPS);
    }

    /// Tests the first throttle enables the bucket with multiplicative
    /// decrease.
    ///
    /// Verifies:
    /// - `last_max_rate` is the measured rate
    /// - `fill_rate` is `measured * 0.7`
    /// - `time_window` is `cbrt(last_max * 0.3 / 0.4)`
    #[test]
    fn test_first_throttle() {
        let (limiter, clock) = limiter();
        warm_up(&limiter, &clock, 5);

        clock.advance(Duration::from_secs(1));
        limiter.update_client_sending_rate(true);
        let snap = limiter.snapshot();

        assert!(snap.enabled);
        assert!((snap.last_max_rate - snap.measured_tx_rate).abs() < EPS);
        assert!((snap.fill_rate - (snap.measured_tx_rate * 0.7).max(0.5)).abs() < EPS);
        let window = (snap.last_max_rate * 0.3 / 0.4).cbrt();
        assert!((snap.time_window - window).abs() < EPS);
        assert!((snap.last_throttle_time - 6.0).abs() < EPS);
    }

    /// Tests a second throttle uses the lower of measured and fill rate.
    ///
    /// Verifies:
    /// - Once enabled, `last_max_rate = min(measured, fill_rate)`
    #[test]
    fn test_repeat_throttle_uses_min_rate() {
        let (limiter, clock) = limiter();
        warm_up(&limiter, &clock, 5);
        clock.advance(Duration::from_secs(1));
        limiter.update_client_sending_rate(true);
        let fill_after_first = limiter.snapshot().fill_rate;

        clock.advance(Duration::from_secs(1));
        limiter.update_client_sending_rate(true);
        let snap = limiter.snapshot();
        assert!((snap.last_max_rate - snap.measured_tx_rate.min(fill_after_first)).abs() < EPS);
    }

    /// Tests cubic recovery after a throttle.
    ///
    /// Verifies:
    /// - 50 non-throttled updates one second apart never lower the fill rate
    /// - The fill rate ends at or above `last_max_rate`
    /// - Capacity never goes negative
    #[test]
    fn test_recovery_is_monotonic() {
        let (limiter, clock) = limiter();
        warm_up(&limiter, &clock, 5);
        clock.advance(Duration::from_secs(1));
        limiter.update_client_sending_rate(true);
        let last_max_rate = limiter.snapshot().last_max_rate;

        let mut previous = limiter.snapshot().fill_rate;
        for _ in 0..50 {
            clock.advance(Duration::from_secs(1));
            limiter.update_client_sending_rate(false);
            let snap = limiter.snapshot();
            assert!(snap.fill_rate + EPS >= previous, "{} < {}", snap.fill_rate, previous);
            assert!(snap.current_capacity >= 0.0);
            assert!(snap.current_capacity <= snap.max_capacity);
            previous = snap.fill_rate;
        }
        assert!(previous + EPS >= last_max_rate);
    }

    /// Tests growth is clamped to twice the measured rate.
    ///
    /// Verifies:
    /// - Long after a throttle the fill rate is `2 * measured`
    #[test]
    fn test_growth_clamped_by_measured_rate() {
        let (limiter, clock) = limiter();
        warm_up(&limiter, &clock, 5);
        clock.advance(Duration::from_secs(1));
        limiter.update_client_sending_rate(true);

        clock.advance(Duration::from_secs(30));
        limiter.update_client_sending_rate(false);
        let snap = limiter.snapshot();
        assert!((snap.fill_rate - (2.0 * snap.measured_tx_rate).max(0.5)).abs() < EPS);
    }

    /// Tests an empty enabled bucket makes the caller wait for the
    /// shortfall.
    ///
    /// Verifies:
    /// - Wait is `(1 - current) / fill_rate`
    /// - Capacity never goes negative
    /// - A second caller waits for its own slot after the first one
    #[test]
    fn test_reservation_when_empty() {
        let (limiter, _) = limiter();
        // nothing measured yet, so the fill rate sits at the 0.5 floor
        limiter.update_client_sending_rate(true);
        assert_eq!(limiter.snapshot().fill_rate, 0.5);

        let first = reserve_wait(&limiter, 1.0).unwrap();
        assert_eq!(first, Duration::from_secs(2));
        let snap = limiter.snapshot();
        assert_eq!(snap.current_capacity, 0.0);
        assert!((snap.last_timestamp.unwrap() - 2.0).abs() < EPS);

        let second = reserve_wait(&limiter, 1.0).unwrap();
        assert_eq!(second, Duration::from_secs(4));
        assert!((limiter.snapshot().last_timestamp.unwrap() - 4.0).abs() < EPS);
    }

    /// Tests a reservation dropped before it is due hands its slot back.
    ///
    /// Verifies:
    /// - The next caller waits for the first slot, not the second
    /// - Tokens already in the bucket are returned too
    #[test]
    fn test_dropped_reservation_is_released() {
        let (limiter, clock) = limiter();
        limiter.update_client_sending_rate(true);

        let abandoned = limiter.reserve(1.0).unwrap();
        assert_eq!(abandoned.wait, Duration::from_secs(2));
        drop(abandoned);
        assert!((limiter.snapshot().last_timestamp.unwrap()).abs() < EPS);
        assert_eq!(reserve_wait(&limiter, 1.0), Some(Duration::from_secs(2)));

        // half a token accrued before the next abandoned reservation
        clock.advance(Duration::from_secs(3));
        drop(limiter.reserve(1.0).unwrap());
        let snap = limiter.snapshot();
        assert!((snap.current_capacity - 0.5).abs() < EPS);
        assert!((snap.last_timestamp.unwrap() - 3.0).abs() < EPS);
    }

    /// Tests a cancelled waiter does not delay the callers behind it.
    ///
    /// Verifies:
    /// - A `get_send_token` abandoned by a timeout releases its slot
    /// - The next caller waits one slot, 2s at the 0.5 floor
    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_releases_slot() {
        let (limiter, _) = limiter();
        limiter.update_client_sending_rate(true);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), limiter.get_send_token()).await;
        assert!(abandoned.is_err());

        let started = tokio::time::Instant::now();
        limiter.get_send_token().await;
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    /// Tests tokens accrue once time passes the reservations.
    ///
    /// Verifies:
    /// - After enough time a token is available without waiting
    /// - Accrued tokens are capped at `max_capacity`
    #[test]
    fn test_refill_after_waiting() {
        let (limiter, clock) = limiter();
        limiter.update_client_sending_rate(true);
        assert!(reserve_wait(&limiter, 1.0).is_some());

        clock.advance(Duration::from_secs(60));
        assert_eq!(reserve_wait(&limiter, 1.0), None);
        let snap = limiter.snapshot();
        assert!(snap.current_capacity >= 0.0);
        assert!(snap.current_capacity <= snap.max_capacity);
    }

    /// Tests identical timestamps produce identical state.
    ///
    /// Verifies:
    /// - Two limiters fed the same schedule end in the same state
    #[test]
    fn test_deterministic_under_mock_clock() {
        let run = || {
            let (limiter, clock) = limiter();
            for step in 0..20u64 {
                clock.advance(Duration::from_millis(350));
                limiter.update_client_sending_rate(step % 7 == 3);
            }
            limiter.snapshot()
        };
        assert_eq!(run(), run());
    }

    /// Tests the async token path under paused tokio time.
    ///
    /// Verifies:
    /// - An enabled, empty bucket suspends the caller
    /// - The call completes once the wait elapses
    #[tokio::test(start_paused = true)]
    async fn test_get_send_token_waits() {
        let (limiter, _) = limiter();
        limiter.update_client_sending_rate(true);

        let started = tokio::time::Instant::now();
        limiter.get_send_token().await;
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    /// Validates config validation rejects out-of-range tuning.
    ///
    /// Assertions:
    /// - beta of 1.0, zero min_fill_rate, smooth above 1 and NaN are rejected.
    /// - Defaults pass.
    #[test]
    fn test_config_validation() {
        assert!(RateLimiterConfig::default().validate().is_ok());
        assert!(RateLimiterConfig::builder().beta(1.0).build().is_err());
        assert!(RateLimiterConfig::builder().min_fill_rate(0.0).build().is_err());
        assert!(RateLimiterConfig::builder().smooth(1.5).build().is_err());
        assert!(RateLimiterConfig::builder().scale_constant(f64::NAN).build().is_err());
        let zero_capacity = RateLimiterConfig { min_capacity: 0.0, ..Default::default() };
        assert!(DefaultRateLimiter::with_config(zero_capacity).is_err());
    }

    /// Validates config deserialization fills missing fields with defaults.
    ///
    /// Assertions:
    /// - Only `beta` is overridden.
    #[test]
    fn test_config_partial_toml() {
        let config: RateLimiterConfig = toml::from_str("beta = 0.5").unwrap();
        assert_eq!(config.beta, 0.5);
        assert_eq!(config.smooth, 0.8);
    }
}
