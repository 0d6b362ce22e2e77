//! In-memory ledger backing the destination-side effect
//!
//! Credits executed transfers against a finite reserve. Draining the reserve
//! makes executions fail with an effect error, which the relay core records
//! as `Failed` so the transfer stays recoverable through the fix path after
//! the reserve is topped up.

use std::collections::HashMap;

use alloy::primitives::Address;
use tracing::{debug, warn};

use relay_core::EffectHandler;

#[derive(Debug)]
pub struct Ledger {
    reserve: u128,
    balances: HashMap<Address, u128>,
}

impl Ledger {
    pub fn new(reserve: u128) -> Self {
        Ledger {
            reserve,
            balances: HashMap::new(),
        }
    }

    pub fn reserve(&self) -> u128 {
        self.reserve
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Top up the backing reserve (operator action).
    pub fn fund(&mut self, amount: u128) {
        self.reserve = self.reserve.saturating_add(amount);
        debug!(reserve = self.reserve, "Ledger reserve funded");
    }
}

impl EffectHandler for Ledger {
    fn apply_effect(&mut self, recipient: Address, amount: u128) -> Result<(), String> {
        if amount > self.reserve {
            warn!(
                recipient = %recipient,
                amount,
                reserve = self.reserve,
                "Credit refused: insufficient reserve"
            );
            return Err(format!(
                "insufficient reserve: have {}, need {}",
                self.reserve, amount
            ));
        }
        self.reserve -= amount;
        let balance = self.balances.entry(recipient).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!(recipient = %recipient, amount, balance = *balance, "Credit applied");
        Ok(())
    }
}
