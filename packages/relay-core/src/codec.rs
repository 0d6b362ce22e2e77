//! Canonical message encoding and hashing
//!
//! Every validator must derive the same hash for the same observed event, so
//! the encoding is a frozen fixed-offset concatenation rather than ABI-style
//! variable encoding. Byte layout:
//!
//! | offset | width | field                         |
//! |--------|-------|-------------------------------|
//! | 0      | 1     | direction tag                 |
//! | 1      | 20    | sender                        |
//! | 21     | 20    | executor (recipient)          |
//! | 41     | 32    | source transaction identifier |
//! | 73     | 8     | gas hint (u64, big-endian)    |
//! | 81     | 4     | payload length (u32, BE)      |
//! | 85     | n     | payload                       |
//!
//! Changing any of this breaks signature portability for every deployed
//! validator; treat the layout as append-only frozen.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tiny_keccak::{Hasher, Keccak};

use crate::error::RelayError;
use crate::types::{Direction, MessageHash};

/// Fixed header size preceding the variable-length payload
pub const HEADER_LEN: usize = 85;

const TAG_OFFSET: usize = 0;
const SENDER_OFFSET: usize = 1;
const EXECUTOR_OFFSET: usize = 21;
const TX_ID_OFFSET: usize = 41;
const GAS_HINT_OFFSET: usize = 73;
const PAYLOAD_LEN_OFFSET: usize = 81;

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// A cross-chain message observed on the source chain.
///
/// Immutable once created; all bookkeeping keys off the hash of its
/// canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Which way this message travels
    pub direction: Direction,
    /// Sender on the source chain
    pub sender: Address,
    /// Recipient of the destination-side effect
    pub executor: Address,
    /// Opaque payload; 32-byte big-endian amount for value transfers
    pub payload: Vec<u8>,
    /// Hash of the source-chain transaction that emitted the event
    pub tx_id: [u8; 32],
    /// Gas hint for destination-side execution
    pub gas_hint: u64,
}

impl Message {
    /// Build a value-transfer message whose payload is the 32-byte
    /// big-endian amount.
    pub fn value_transfer(
        direction: Direction,
        sender: Address,
        executor: Address,
        amount: u128,
        tx_id: [u8; 32],
        gas_hint: u64,
    ) -> Self {
        let mut payload = vec![0u8; 32];
        payload[16..32].copy_from_slice(&amount.to_be_bytes());
        Message {
            direction,
            sender,
            executor,
            payload,
            tx_id,
            gas_hint,
        }
    }

    /// Canonical fixed-offset encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN + self.payload.len()];
        data[TAG_OFFSET] = self.direction.tag();
        data[SENDER_OFFSET..SENDER_OFFSET + 20].copy_from_slice(self.sender.as_slice());
        data[EXECUTOR_OFFSET..EXECUTOR_OFFSET + 20].copy_from_slice(self.executor.as_slice());
        data[TX_ID_OFFSET..TX_ID_OFFSET + 32].copy_from_slice(&self.tx_id);
        data[GAS_HINT_OFFSET..GAS_HINT_OFFSET + 8].copy_from_slice(&self.gas_hint.to_be_bytes());
        data[PAYLOAD_LEN_OFFSET..PAYLOAD_LEN_OFFSET + 4]
            .copy_from_slice(&(self.payload.len() as u32).to_be_bytes());
        data[HEADER_LEN..].copy_from_slice(&self.payload);
        data
    }

    /// Hash of the canonical encoding.
    pub fn hash(&self) -> MessageHash {
        MessageHash(keccak256(&self.encode()))
    }

    /// Decode a canonical encoding, rejecting truncated or malformed input.
    pub fn decode(data: &[u8]) -> Result<Self, RelayError> {
        if data.len() < HEADER_LEN {
            return Err(RelayError::TruncatedMessage {
                expected: HEADER_LEN,
                got: data.len(),
            });
        }

        let direction = Direction::from_tag(data[TAG_OFFSET])
            .ok_or(RelayError::UnknownDirectionTag { tag: data[TAG_OFFSET] })?;

        let sender = Address::from_slice(&data[SENDER_OFFSET..SENDER_OFFSET + 20]);
        let executor = Address::from_slice(&data[EXECUTOR_OFFSET..EXECUTOR_OFFSET + 20]);

        let mut tx_id = [0u8; 32];
        tx_id.copy_from_slice(&data[TX_ID_OFFSET..TX_ID_OFFSET + 32]);

        let mut gas_bytes = [0u8; 8];
        gas_bytes.copy_from_slice(&data[GAS_HINT_OFFSET..GAS_HINT_OFFSET + 8]);
        let gas_hint = u64::from_be_bytes(gas_bytes);

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[PAYLOAD_LEN_OFFSET..PAYLOAD_LEN_OFFSET + 4]);
        let declared = u32::from_be_bytes(len_bytes) as usize;

        let actual = data.len() - HEADER_LEN;
        // Trailing bytes are rejected the same as truncation: the encoding
        // must describe the input exactly or the hash is not canonical.
        if declared != actual {
            return Err(RelayError::PayloadLengthMismatch { declared, actual });
        }

        Ok(Message {
            direction,
            sender,
            executor,
            payload: data[HEADER_LEN..].to_vec(),
            tx_id,
            gas_hint,
        })
    }

    /// Parse the payload as a value-transfer amount.
    ///
    /// Value transfers carry a 32-byte big-endian amount whose upper 16
    /// bytes are zero (128-bit range). Anything else is rejected rather
    /// than silently defaulted.
    pub fn transfer_amount(&self) -> Result<u128, RelayError> {
        if self.payload.len() != 32 {
            return Err(RelayError::MalformedAmountPayload {
                got: self.payload.len(),
            });
        }
        if self.payload[..16].iter().any(|&b| b != 0) {
            return Err(RelayError::AmountOverflow);
        }
        let mut amount_bytes = [0u8; 16];
        amount_bytes.copy_from_slice(&self.payload[16..32]);
        Ok(u128::from_be_bytes(amount_bytes))
    }
}
