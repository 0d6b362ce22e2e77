//! Daily rate limits
//!
//! Per-transaction minimum/maximum bounds plus a cumulative per-day cap,
//! kept separately for deposits and withdrawals. Buckets are created lazily
//! per day index and retained for audit; past days are never revisited for
//! limit checks. A daily limit of zero means the kind is paused.

use std::collections::HashMap;

use tracing::debug;

use crate::error::RelayError;
use crate::types::TransferKind;

/// Seconds per day-index bucket
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Day index for a unix timestamp. Pure function of time; home and foreign
/// sides derive their indexes from their own clocks.
pub fn day_index(unix_secs: u64) -> u64 {
    unix_secs / SECONDS_PER_DAY
}

/// Limit parameters for one transfer kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    pub min_per_tx: u128,
    pub max_per_tx: u128,
    /// Cumulative per-day cap; 0 pauses the kind entirely
    pub daily_limit: u128,
}

impl LimitConfig {
    /// Validate `min <= max <= daily`. A paused config (daily == 0) only
    /// requires `min <= max`.
    pub fn new(
        kind: TransferKind,
        min_per_tx: u128,
        max_per_tx: u128,
        daily_limit: u128,
    ) -> Result<Self, RelayError> {
        if min_per_tx > max_per_tx || (daily_limit != 0 && max_per_tx > daily_limit) {
            return Err(RelayError::InvalidLimitOrdering {
                kind,
                min: min_per_tx,
                max: max_per_tx,
                daily: daily_limit,
            });
        }
        Ok(LimitConfig {
            min_per_tx,
            max_per_tx,
            daily_limit,
        })
    }
}

/// Rate limiter for one relay direction.
#[derive(Debug)]
pub struct RateLimiter {
    deposit: LimitConfig,
    withdrawal: LimitConfig,
    totals: HashMap<(u64, TransferKind), u128>,
}

impl RateLimiter {
    pub fn new(deposit: LimitConfig, withdrawal: LimitConfig) -> Self {
        RateLimiter {
            deposit,
            withdrawal,
            totals: HashMap::new(),
        }
    }

    pub fn config(&self, kind: TransferKind) -> &LimitConfig {
        match kind {
            TransferKind::Deposit => &self.deposit,
            TransferKind::Withdrawal => &self.withdrawal,
        }
    }

    fn config_mut(&mut self, kind: TransferKind) -> &mut LimitConfig {
        match kind {
            TransferKind::Deposit => &mut self.deposit,
            TransferKind::Withdrawal => &mut self.withdrawal,
        }
    }

    /// Cumulative total recorded for a day bucket.
    pub fn total_spent(&self, day: u64, kind: TransferKind) -> u128 {
        self.totals.get(&(day, kind)).copied().unwrap_or(0)
    }

    /// Check the amount against per-tx bounds and the day's remaining cap,
    /// and record it into the bucket in the same call. There is no gap
    /// between check and record; callers serialize per direction.
    pub fn check_and_record(
        &mut self,
        day: u64,
        amount: u128,
        kind: TransferKind,
    ) -> Result<(), RelayError> {
        let config = *self.config(kind);

        if amount < config.min_per_tx {
            return Err(RelayError::BelowMinimum {
                amount,
                min: config.min_per_tx,
            });
        }
        if amount > config.max_per_tx {
            return Err(RelayError::AboveMaximum {
                amount,
                max: config.max_per_tx,
            });
        }

        let spent = self.total_spent(day, kind);
        // daily_limit == 0 pauses the kind: nothing fits under a zero cap
        if config.daily_limit == 0 || spent.saturating_add(amount) > config.daily_limit {
            return Err(RelayError::DailyLimitExceeded {
                kind,
                spent,
                amount,
                limit: config.daily_limit,
            });
        }

        let total = self.totals.entry((day, kind)).or_insert(0);
        *total += amount;
        debug!(day, kind = %kind, amount, total = *total, "Amount recorded against daily limit");
        Ok(())
    }

    /// Compensate a recorded amount when a later step of the same atomic
    /// attempt fails. Only valid for an amount previously recorded into the
    /// same bucket.
    pub fn release(&mut self, day: u64, amount: u128, kind: TransferKind) {
        if let Some(total) = self.totals.get_mut(&(day, kind)) {
            *total = total.saturating_sub(amount);
        }
    }

    pub fn set_min_per_tx(&mut self, kind: TransferKind, min: u128) -> Result<(), RelayError> {
        let current = *self.config(kind);
        let updated = LimitConfig::new(kind, min, current.max_per_tx, current.daily_limit)?;
        *self.config_mut(kind) = updated;
        Ok(())
    }

    pub fn set_max_per_tx(&mut self, kind: TransferKind, max: u128) -> Result<(), RelayError> {
        let current = *self.config(kind);
        let updated = LimitConfig::new(kind, current.min_per_tx, max, current.daily_limit)?;
        *self.config_mut(kind) = updated;
        Ok(())
    }

    pub fn set_daily_limit(&mut self, kind: TransferKind, daily: u128) -> Result<(), RelayError> {
        let current = *self.config(kind);
        let updated = LimitConfig::new(kind, current.min_per_tx, current.max_per_tx, daily)?;
        *self.config_mut(kind) = updated;
        Ok(())
    }
}
