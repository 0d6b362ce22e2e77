//! Validator set and signature threshold
//!
//! A flat mutable set behind the executor's single-writer guard. Membership
//! changes are admin operations whose caller-side authorization is a
//! precondition, not re-implemented here. The invariant
//! `1 <= required_signatures <= validator count` holds at all times.

use alloy::primitives::Address;
use tracing::info;

use crate::error::RelayError;

/// Sentinel address rejected on admission (all bits set)
const SENTINEL: Address = Address::repeat_byte(0xff);

#[derive(Debug, Clone)]
pub struct ValidatorSet {
    validators: Vec<Address>,
    required_signatures: usize,
}

impl ValidatorSet {
    /// Build the set, rejecting a zero or over-count threshold, duplicate
    /// members, the zero address, and the all-0xFF sentinel.
    pub fn new(validators: Vec<Address>, required_signatures: usize) -> Result<Self, RelayError> {
        if required_signatures == 0 || required_signatures > validators.len() {
            return Err(RelayError::InvalidThreshold {
                required: required_signatures,
                validator_count: validators.len(),
            });
        }
        for (i, v) in validators.iter().enumerate() {
            if *v == Address::ZERO || *v == SENTINEL {
                return Err(RelayError::InvalidValidatorAddress { validator: *v });
            }
            if validators[..i].contains(v) {
                return Err(RelayError::DuplicateValidator { validator: *v });
            }
        }
        Ok(ValidatorSet {
            validators,
            required_signatures,
        })
    }

    /// Current signature threshold. Re-read this at every quorum
    /// evaluation; it may change between collection and execution.
    pub fn required_signatures(&self) -> usize {
        self.required_signatures
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    pub fn is_validator(&self, validator: Address) -> bool {
        self.validators.contains(&validator)
    }

    /// Snapshot of the current members. Insertion order is not preserved
    /// across removals (swap-remove); order carries no meaning.
    pub fn validator_list(&self) -> Vec<Address> {
        self.validators.clone()
    }

    pub fn add_validator(&mut self, validator: Address) -> Result<(), RelayError> {
        if validator == Address::ZERO || validator == SENTINEL {
            return Err(RelayError::InvalidValidatorAddress { validator });
        }
        if self.validators.contains(&validator) {
            return Err(RelayError::DuplicateValidator { validator });
        }
        self.validators.push(validator);
        info!(validator = %validator, count = self.validators.len(), "Validator added");
        Ok(())
    }

    pub fn remove_validator(&mut self, validator: Address) -> Result<(), RelayError> {
        let pos = self
            .validators
            .iter()
            .position(|v| *v == validator)
            .ok_or(RelayError::UnknownValidator { validator })?;
        if self.validators.len() - 1 < self.required_signatures {
            return Err(RelayError::RemovalBreaksThreshold {
                remaining: self.validators.len() - 1,
                required: self.required_signatures,
            });
        }
        self.validators.swap_remove(pos);
        info!(validator = %validator, count = self.validators.len(), "Validator removed");
        Ok(())
    }

    pub fn set_required_signatures(&mut self, required: usize) -> Result<(), RelayError> {
        if required == 0 || required > self.validators.len() {
            return Err(RelayError::InvalidThreshold {
                required,
                validator_count: self.validators.len(),
            });
        }
        info!(
            old = self.required_signatures,
            new = required,
            "Signature threshold changed"
        );
        self.required_signatures = required;
        Ok(())
    }
}
