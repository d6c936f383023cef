// Retry capacity ledger shared by every call using one strategy instance
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::constants::{INITIAL_RETRY_TOKENS, NO_RETRY_INCREMENT, RETRY_COST, TIMEOUT_RETRY_COST};
use super::types::RetryErrorType;

/// Size of the retry ledger and what each retry costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryQuotaConfig {
    /// Starting balance, and the ceiling credits never exceed
    pub initial_retry_tokens: u32,
    /// Charged for retrying a throttling or server error
    pub retry_cost: u32,
    /// Charged for retrying a transient error
    pub timeout_retry_cost: u32,
    /// Credited by a success that needed no retry
    pub no_retry_increment: u32,
}

impl Default for RetryQuotaConfig {
    fn default() -> Self {
        Self {
            initial_retry_tokens: INITIAL_RETRY_TOKENS,
            retry_cost: RETRY_COST,
            timeout_retry_cost: TIMEOUT_RETRY_COST,
            no_retry_increment: NO_RETRY_INCREMENT,
        }
    }
}

impl RetryQuotaConfig {
    /// Capacity charged for retrying an error of `error_type`.
    pub const fn cost_for(&self, error_type: RetryErrorType) -> u32 {
        match error_type {
            RetryErrorType::Transient => self.timeout_retry_cost,
            _ => self.retry_cost,
        }
    }

    /// Fresh ledger sized by this quota.
    pub fn ledger(&self) -> RetryCapacity {
        RetryCapacity::with_ceiling(self.initial_retry_tokens)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_retry_tokens == 0 {
            return Err("initial_retry_tokens must be greater than 0".to_string());
        }
        if self.retry_cost == 0 || self.timeout_retry_cost == 0 {
            return Err("retry costs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Integer ledger limiting total retry volume across concurrent calls.
///
/// Debits and credits are compare-and-swap loops, so the value stays within
/// `0..=ceiling` under any interleaving. Clones share the same counter.
#[derive(Debug, Clone)]
pub struct RetryCapacity {
    ceiling: u32,
    available: Arc<AtomicU32>,
}

impl RetryCapacity {
    /// Ledger starting full at [`INITIAL_RETRY_TOKENS`].
    pub fn new() -> Self {
        Self::with_ceiling(INITIAL_RETRY_TOKENS)
    }

    /// Ledger starting full at `ceiling`.
    pub fn with_ceiling(ceiling: u32) -> Self {
        Self { ceiling, available: Arc::new(AtomicU32::new(ceiling)) }
    }

    /// Ledger starting at `available` (clamped to the default ceiling).
    pub fn with_available(available: u32) -> Self {
        let capacity = Self::new();
        capacity.available.store(available.min(capacity.ceiling), Ordering::Release);
        capacity
    }

    /// Debit `cost` if at least that much is available.
    ///
    /// Returns the balance seen when the debit was refused.
    pub fn try_debit(&self, cost: u32) -> Result<u32, u32> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current < cost {
                return Err(current);
            }
            match self.available.compare_exchange_weak(
                current,
                current - cost,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(current - cost),
                Err(actual) => current = actual,
            }
        }
    }

    /// Credit `amount`, never above the ceiling. Returns the new balance.
    pub fn credit(&self, amount: u32) -> u32 {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(amount).min(self.ceiling);
            if next == current {
                return current;
            }
            match self.available.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current balance.
    pub fn available(&self) -> u32 {
        self.available.load(Ordering::Acquire)
    }

    /// Balance the ledger started at and never exceeds.
    pub const fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

impl Default for RetryCapacity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry::capacity.
    use std::thread;

    use super::*;

    /// Validates `RetryCapacity::new` starts full.
    ///
    /// Assertions:
    /// - Confirms `capacity.available()` equals `500`.
    #[test]
    fn test_starts_full() {
        let capacity = RetryCapacity::new();
        assert_eq!(capacity.available(), 500);
        assert_eq!(capacity.ceiling(), 500);
    }

    /// Validates debits succeed only with enough balance.
    ///
    /// Assertions:
    /// - A debit of 10 from 4 is refused and reports 4.
    /// - A debit of 4 from 4 leaves 0.
    #[test]
    fn test_debit_requires_balance() {
        let capacity = RetryCapacity::with_available(4);
        assert_eq!(capacity.try_debit(10), Err(4));
        assert_eq!(capacity.available(), 4);
        assert_eq!(capacity.try_debit(4), Ok(0));
        assert_eq!(capacity.try_debit(1), Err(0));
    }

    /// Validates credits are capped at the ceiling.
    ///
    /// Assertions:
    /// - Crediting a full ledger leaves it at 500.
    /// - Crediting after a debit restores exactly the debit.
    #[test]
    fn test_credit_is_capped() {
        let capacity = RetryCapacity::new();
        assert_eq!(capacity.credit(1), 500);
        assert_eq!(capacity.try_debit(15), Ok(485));
        assert_eq!(capacity.credit(10), 495);
        assert_eq!(capacity.credit(u32::MAX), 500);
    }

    /// Validates `with_available` clamps to the ceiling.
    ///
    /// Assertions:
    /// - Confirms a requested 900 is stored as 500.
    #[test]
    fn test_with_available_clamps() {
        assert_eq!(RetryCapacity::with_available(900).available(), 500);
    }

    /// Tests the ledger under concurrent debits and credits.
    ///
    /// Verifies:
    /// - The balance never goes below zero or above the ceiling
    /// - Exactly as many debits succeed as the balance allows
    #[test]
    fn test_concurrent_debit_never_overdraws() {
        let capacity = RetryCapacity::with_available(100);
        let mut handles = vec![];

        for _ in 0..16 {
            let ledger = capacity.clone();
            handles.push(thread::spawn(move || {
                let mut granted = 0u32;
                for _ in 0..10 {
                    if ledger.try_debit(5).is_ok() {
                        granted += 1;
                    }
                    assert!(ledger.available() <= 500);
                }
                granted
            }));
        }

        let granted: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 20);
        assert_eq!(capacity.available(), 0);
    }

    /// Tests interleaved credits and debits from many threads.
    ///
    /// Verifies:
    /// - The ceiling holds while credits race with debits
    #[test]
    fn test_concurrent_credit_respects_ceiling() {
        let capacity = RetryCapacity::new();
        let mut handles = vec![];

        for i in 0..8 {
            let ledger = capacity.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    if i % 2 == 0 {
                        let _ = ledger.try_debit(10);
                    } else {
                        ledger.credit(7);
                    }
                    let seen = ledger.available();
                    assert!(seen <= 500);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(capacity.available() <= 500);
    }

    /// Validates quota defaults and per-type costs.
    ///
    /// Assertions:
    /// - Defaults match the 500/5/10/1 table.
    /// - Transient errors use the timeout cost, everything else the retry cost.
    /// - The ledger starts full at the configured size.
    #[test]
    fn test_quota_costs_and_ledger() {
        let quota = RetryQuotaConfig::default();
        assert_eq!(quota.initial_retry_tokens, 500);
        assert_eq!(quota.cost_for(RetryErrorType::Transient), 10);
        assert_eq!(quota.cost_for(RetryErrorType::Throttling), 5);
        assert_eq!(quota.no_retry_increment, 1);

        let custom = RetryQuotaConfig { initial_retry_tokens: 40, retry_cost: 2, ..Default::default() };
        assert_eq!(custom.cost_for(RetryErrorType::ServerError), 2);
        let ledger = custom.ledger();
        assert_eq!(ledger.available(), 40);
        assert_eq!(ledger.ceiling(), 40);
    }

    /// Validates quota validation and partial deserialization.
    ///
    /// Assertions:
    /// - Zero tokens or a zero cost is rejected.
    /// - Missing TOML fields keep their defaults.
    #[test]
    fn test_quota_validation() {
        assert!(RetryQuotaConfig::default().validate().is_ok());
        let empty = RetryQuotaConfig { initial_retry_tokens: 0, ..Default::default() };
        assert!(empty.validate().is_err());
        let free = RetryQuotaConfig { timeout_retry_cost: 0, ..Default::default() };
        assert!(free.validate().is_err());

        let parsed: RetryQuotaConfig = toml::from_str("retry_cost = 3").unwrap();
        assert_eq!(parsed.retry_cost, 3);
        assert_eq!(parsed.timeout_retry_cost, 10);
    }
}
