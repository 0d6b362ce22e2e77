//! Relay-Core: Threshold Message Relay and Validation Core
//!
//! This crate provides the protocol core shared by both directions of a
//! cross-chain message bridge:
//!
//! - **Codec** - Canonical fixed-offset message encoding and keccak hashing
//! - **Validators** - Enumerated validator set with a signature threshold
//! - **Signatures** - Per-hash signature/affirmation collection and quorum
//! - **Replay** - Exactly-once tracking with legacy marker compatibility
//! - **Limits** - Per-transaction bounds and per-day cumulative caps
//! - **Executor** - Orchestration: validate, gate, apply effect, record
//!
//! The core is synchronous and deterministic: no clocks, no I/O. Callers
//! pass unix timestamps into operations that need a day index, and all
//! mutation is serialized per direction through `&mut RelayExecutor`.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! relay-core = { path = "../relay-core" }
//! ```

pub mod codec;
pub mod error;
pub mod executor;
pub mod limits;
pub mod replay;
pub mod signatures;
pub mod types;
pub mod validators;

// Re-export commonly used items at the crate root
pub use codec::{keccak256, Message, HEADER_LEN};
pub use error::{ErrorCategory, RelayError};
pub use executor::{
    EffectHandler, ExecutionOutcome, ExecutionRecord, RelayExecutor, SubmitOutcome,
};
pub use limits::{day_index, LimitConfig, RateLimiter, SECONDS_PER_DAY};
pub use replay::{marker_count, marker_is_processed, ReplayGuard};
pub use signatures::{
    AffirmationCompleted, CollectedSignatures, CollectionState, SignatureCollector,
};
pub use types::{Completion, Direction, MessageHash, RelayStatus, TransferKind};
pub use validators::ValidatorSet;
