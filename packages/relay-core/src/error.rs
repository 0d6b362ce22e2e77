//! Error types for the threshold relay core
//!
//! Every rejection carries enough context for an operator to decide whether
//! to retry now (limit errors may pass later), retry never (replay and
//! authorization errors), or escalate (effect errors need a fix).

use alloy::primitives::Address;
use thiserror::Error;

use crate::types::{MessageHash, RelayStatus, TransferKind};

/// Coarse taxonomy for rejected operations.
///
/// Configuration and authorization failures reject with no state change.
/// Limit and effect failures move the execution record to `Failed` so the
/// message stays discoverable and fixable. Replay failures reject only the
/// new attempt and never disturb the executed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authorization,
    Validation,
    Limit,
    Replay,
    Effect,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Limit => "limit",
            ErrorCategory::Replay => "replay",
            ErrorCategory::Effect => "effect",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid threshold: required {required} of {validator_count} validators")]
    InvalidThreshold {
        required: usize,
        validator_count: usize,
    },

    #[error("Duplicate validator: {validator}")]
    DuplicateValidator { validator: Address },

    #[error("Invalid validator address: {validator}")]
    InvalidValidatorAddress { validator: Address },

    #[error("Validator not registered: {validator}")]
    UnknownValidator { validator: Address },

    #[error("Removing validator would leave {remaining} members below threshold {required}")]
    RemovalBreaksThreshold { remaining: usize, required: usize },

    #[error("Invalid limit ordering for {kind}: min {min} <= max {max} <= daily {daily} required")]
    InvalidLimitOrdering {
        kind: TransferKind,
        min: u128,
        max: u128,
        daily: u128,
    },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Not a validator: {validator}")]
    NotAValidator { validator: Address },

    #[error("Wrong direction: executor handles {expected}, message is {got}")]
    WrongDirection {
        expected: crate::types::Direction,
        got: crate::types::Direction,
    },

    #[error("No execution record for hash {hash}")]
    NotFound { hash: MessageHash },

    #[error("Fix not requested for hash {hash}")]
    FixNotRequested { hash: MessageHash },

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid signature from {validator}")]
    InvalidSignature { validator: Address },

    #[error("Duplicate submission by {validator} for hash {hash}")]
    DuplicateSubmission {
        validator: Address,
        hash: MessageHash,
    },

    #[error("Truncated message: need at least {expected} bytes, got {got}")]
    TruncatedMessage { expected: usize, got: usize },

    #[error("Unknown direction tag: 0x{tag:02x}")]
    UnknownDirectionTag { tag: u8 },

    #[error("Payload length mismatch: header declares {declared} bytes, {actual} present")]
    PayloadLengthMismatch { declared: usize, actual: usize },

    #[error("Invalid hash length: expected 32 bytes, got {got}")]
    InvalidHashLength { got: usize },

    #[error("Malformed amount payload: expected 32 bytes, got {got}")]
    MalformedAmountPayload { got: usize },

    #[error("Amount exceeds 128-bit range")]
    AmountOverflow,

    #[error("Record for hash {hash} is {status}, not failed")]
    NotFailed {
        hash: MessageHash,
        status: RelayStatus,
    },

    // ========================================================================
    // Limit Errors
    // ========================================================================
    #[error("Amount {amount} below per-transaction minimum {min}")]
    BelowMinimum { amount: u128, min: u128 },

    #[error("Amount {amount} above per-transaction maximum {max}")]
    AboveMaximum { amount: u128, max: u128 },

    #[error("Daily {kind} limit exceeded: spent {spent} + {amount} > limit {limit}")]
    DailyLimitExceeded {
        kind: TransferKind,
        spent: u128,
        amount: u128,
        limit: u128,
    },

    // ========================================================================
    // Replay Errors
    // ========================================================================
    #[error("Message already processed: {hash}")]
    AlreadyProcessed { hash: MessageHash },

    #[error("Message already fixed: {hash}")]
    AlreadyFixed { hash: MessageHash },

    // ========================================================================
    // Effect Errors
    // ========================================================================
    #[error("Effect application failed: {reason}")]
    EffectFailed { reason: String },
}

impl RelayError {
    /// Map the error onto the operator-facing taxonomy.
    pub fn category(&self) -> ErrorCategory {
        use RelayError::*;
        match self {
            InvalidThreshold { .. }
            | DuplicateValidator { .. }
            | InvalidValidatorAddress { .. }
            | UnknownValidator { .. }
            | RemovalBreaksThreshold { .. }
            | InvalidLimitOrdering { .. } => ErrorCategory::Configuration,

            NotAValidator { .. }
            | WrongDirection { .. }
            | NotFound { .. }
            | FixNotRequested { .. } => ErrorCategory::Authorization,

            InvalidSignature { .. }
            | DuplicateSubmission { .. }
            | TruncatedMessage { .. }
            | UnknownDirectionTag { .. }
            | PayloadLengthMismatch { .. }
            | InvalidHashLength { .. }
            | MalformedAmountPayload { .. }
            | AmountOverflow
            | NotFailed { .. } => ErrorCategory::Validation,

            BelowMinimum { .. } | AboveMaximum { .. } | DailyLimitExceeded { .. } => {
                ErrorCategory::Limit
            }

            AlreadyProcessed { .. } | AlreadyFixed { .. } => ErrorCategory::Replay,

            EffectFailed { .. } => ErrorCategory::Effect,
        }
    }
}
