//! Common types for the threshold relay core
//!
//! Shared identifiers and state enums used by every component: message
//! hashes, relay direction, transfer kind for rate-limit bucketing, and
//! per-message execution status.

use std::fmt;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Keccak256 hash of a message's canonical encoding.
///
/// Used as the key for all per-message bookkeeping (signature collection,
/// replay protection, execution records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHash(pub [u8; 32]);

impl MessageHash {
    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        MessageHash(bytes)
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex_str: &str) -> Result<Self, RelayError> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(hex_str).map_err(|_| RelayError::InvalidHashLength { got: 0 })?;
        if bytes.len() != 32 {
            return Err(RelayError::InvalidHashLength { got: bytes.len() });
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(&bytes);
        Ok(MessageHash(result))
    }
}

impl fmt::Display for MessageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Relay direction.
///
/// Each direction runs its own executor with independent replay and
/// rate-limit state; the two directions share only the message codec.
/// The wire tag is the first byte of the canonical encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HomeToForeign,
    ForeignToHome,
}

impl Direction {
    /// Wire tag for the canonical encoding (byte 0)
    pub fn tag(&self) -> u8 {
        match self {
            Direction::HomeToForeign => 0x01,
            Direction::ForeignToHome => 0x02,
        }
    }

    /// Parse a wire tag back into a direction
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Direction::HomeToForeign),
            0x02 => Some(Direction::ForeignToHome),
            _ => None,
        }
    }

    /// Get the direction as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::HomeToForeign => "home_to_foreign",
            Direction::ForeignToHome => "foreign_to_home",
        }
    }

    /// Parse from the string form produced by [`Direction::as_str`]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home_to_foreign" => Some(Direction::HomeToForeign),
            "foreign_to_home" => Some(Direction::ForeignToHome),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which daily-limit bucket a transfer counts against.
///
/// `Deposit` covers source-side sends, `Withdrawal` covers destination-side
/// executions. Each kind has its own per-tx bounds and daily cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Deposit,
    Withdrawal,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Deposit => "deposit",
            TransferKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-message execution status.
///
/// `Executed` is terminal. `Failed` is terminal for the original attempt but
/// can transition to `Executed` exactly once through the fix path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Unseen,
    Pending,
    Executed,
    Failed,
}

impl RelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayStatus::Unseen => "unseen",
            RelayStatus::Pending => "pending",
            RelayStatus::Executed => "executed",
            RelayStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Completion record emitted when a message's effect has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Original sender on the source chain
    pub sender: Address,
    /// Recipient of the destination-side effect
    pub executor: Address,
    /// Canonical message hash
    pub message_hash: MessageHash,
}
