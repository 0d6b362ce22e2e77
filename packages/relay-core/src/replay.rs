//! Replay protection
//!
//! Tracks which message hashes have been executed, independent of how many
//! relay attempts were made. Internally this is an explicit tagged state per
//! hash; the bit-packed marker layout of older deployments (attempt count
//! with the high bit flagging completion) is supported at the edge for
//! persisted-record compatibility.

use std::collections::HashMap;

use alloy::primitives::U256;

use crate::types::MessageHash;

/// High bit of the legacy marker word flags "processed"
fn processed_bit() -> U256 {
    U256::from(1u8) << 255
}

/// True if a legacy marker value has the processed flag set.
pub fn marker_is_processed(marker: U256) -> bool {
    marker.bit(255)
}

/// Attempt count embedded in a legacy marker value.
pub fn marker_count(marker: U256) -> U256 {
    marker & !processed_bit()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessedState {
    Collecting { attempts: u64 },
    Executed { attempts: u64 },
}

/// Per-hash execution tracking for one relay direction.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    states: HashMap<MessageHash, ProcessedState>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_executed(&self, hash: &MessageHash) -> bool {
        matches!(self.states.get(hash), Some(ProcessedState::Executed { .. }))
    }

    /// Count one execution attempt against the hash.
    pub fn record_attempt(&mut self, hash: &MessageHash) {
        let state = self
            .states
            .entry(*hash)
            .or_insert(ProcessedState::Collecting { attempts: 0 });
        match state {
            ProcessedState::Collecting { attempts } | ProcessedState::Executed { attempts } => {
                *attempts = attempts.saturating_add(1);
            }
        }
    }

    /// One-way transition to executed. Idempotent; never reverts.
    pub fn mark_executed(&mut self, hash: &MessageHash) {
        let attempts = self.attempt_count(hash);
        self.states
            .insert(*hash, ProcessedState::Executed { attempts });
    }

    pub fn attempt_count(&self, hash: &MessageHash) -> u64 {
        match self.states.get(hash) {
            Some(ProcessedState::Collecting { attempts })
            | Some(ProcessedState::Executed { attempts }) => *attempts,
            None => 0,
        }
    }

    /// Render the hash's state in the legacy bit-packed marker layout:
    /// attempt count in the low bits, bit 255 set once executed.
    pub fn to_marker(&self, hash: &MessageHash) -> U256 {
        match self.states.get(hash) {
            None => U256::ZERO,
            Some(ProcessedState::Collecting { attempts }) => U256::from(*attempts),
            Some(ProcessedState::Executed { attempts }) => {
                U256::from(*attempts) | processed_bit()
            }
        }
    }
}
