//! Per-message signature and affirmation collection
//!
//! State machine per hash: Empty → Collecting → Quorate. Signatures are
//! accepted in arrival order; the quorum transition fires exactly once, the
//! instant the distinct-signer count reaches the *current* threshold.
//! Submissions past quorum are still accepted for audit. One bad submission
//! never disturbs the signatures already counted.

use std::collections::HashMap;

use alloy::primitives::{Address, Signature, B256};
use tracing::{debug, info};

use crate::codec::Message;
use crate::error::RelayError;
use crate::types::MessageHash;
use crate::validators::ValidatorSet;

/// Collection state for a hash, reported against the current threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Empty,
    Collecting(usize),
    Quorate(usize),
}

/// Emitted exactly once when a hash's signed submissions reach quorum.
#[derive(Debug, Clone)]
pub struct CollectedSignatures {
    pub hash: MessageHash,
    /// All signatures gathered so far, in arrival order
    pub signatures: Vec<Signature>,
    /// The signer whose submission tipped quorum. Bookkeeping identity
    /// only; carries no correctness weight.
    pub relay_responsible: Address,
}

/// Emitted exactly once when a hash's affirmations reach quorum.
#[derive(Debug, Clone)]
pub struct AffirmationCompleted {
    pub hash: MessageHash,
    pub affirmations: usize,
}

#[derive(Debug, Default)]
struct SignatureEntry {
    signers: Vec<Address>,
    signatures: Vec<Signature>,
    announced: bool,
}

#[derive(Debug, Default)]
struct AffirmationEntry {
    affirmers: Vec<Address>,
    announced: bool,
}

/// Accumulates per-validator signatures and affirmations keyed by message
/// hash, rejecting duplicates and non-members.
#[derive(Debug, Default)]
pub struct SignatureCollector {
    signed: HashMap<MessageHash, SignatureEntry>,
    affirmed: HashMap<MessageHash, AffirmationEntry>,
}

impl SignatureCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit one validator's signature over a message.
    ///
    /// Returns `Some(CollectedSignatures)` when this submission newly
    /// reaches quorum; `None` for earlier and later accepted submissions.
    pub fn submit_signature(
        &mut self,
        validators: &ValidatorSet,
        signer: Address,
        signature: Signature,
        message: &Message,
    ) -> Result<Option<CollectedSignatures>, RelayError> {
        if !validators.is_validator(signer) {
            return Err(RelayError::NotAValidator { validator: signer });
        }

        let hash = message.hash();
        let recovered = signature
            .recover_address_from_prehash(&B256::from(hash.0))
            .map_err(|_| RelayError::InvalidSignature { validator: signer })?;
        if recovered != signer {
            return Err(RelayError::InvalidSignature { validator: signer });
        }

        let entry = self.signed.entry(hash).or_default();
        if entry.signers.contains(&signer) {
            return Err(RelayError::DuplicateSubmission {
                validator: signer,
                hash,
            });
        }

        entry.signers.push(signer);
        entry.signatures.push(signature);
        debug!(
            hash = %hash,
            signer = %signer,
            count = entry.signers.len(),
            required = validators.required_signatures(),
            "Signature accepted"
        );

        // Quorum is evaluated against the threshold in force right now, not
        // the one in force when collection started. The transition is
        // one-way: an entry already announced stays quorate.
        if !entry.announced && entry.signers.len() >= validators.required_signatures() {
            entry.announced = true;
            info!(hash = %hash, signatures = entry.signers.len(), "Signature quorum reached");
            return Ok(Some(CollectedSignatures {
                hash,
                signatures: entry.signatures.clone(),
                relay_responsible: signer,
            }));
        }
        Ok(None)
    }

    /// Submit one validator's affirmation that the source-chain event
    /// occurred (push-style flow, no signature payload).
    pub fn submit_affirmation(
        &mut self,
        validators: &ValidatorSet,
        validator: Address,
        message: &Message,
    ) -> Result<Option<AffirmationCompleted>, RelayError> {
        if !validators.is_validator(validator) {
            return Err(RelayError::NotAValidator { validator });
        }

        let hash = message.hash();
        let entry = self.affirmed.entry(hash).or_default();
        if entry.affirmers.contains(&validator) {
            return Err(RelayError::DuplicateSubmission { validator, hash });
        }

        entry.affirmers.push(validator);
        debug!(
            hash = %hash,
            validator = %validator,
            count = entry.affirmers.len(),
            "Affirmation accepted"
        );

        if !entry.announced && entry.affirmers.len() >= validators.required_signatures() {
            entry.announced = true;
            info!(hash = %hash, affirmations = entry.affirmers.len(), "Affirmation quorum reached");
            return Ok(Some(AffirmationCompleted {
                hash,
                affirmations: entry.affirmers.len(),
            }));
        }
        Ok(None)
    }

    pub fn signature_count(&self, hash: &MessageHash) -> usize {
        self.signed.get(hash).map_or(0, |e| e.signers.len())
    }

    pub fn affirmation_count(&self, hash: &MessageHash) -> usize {
        self.affirmed.get(hash).map_or(0, |e| e.affirmers.len())
    }

    pub fn has_signed(&self, validator: Address, hash: &MessageHash) -> bool {
        self.signed
            .get(hash)
            .is_some_and(|e| e.signers.contains(&validator))
    }

    pub fn has_affirmed(&self, validator: Address, hash: &MessageHash) -> bool {
        self.affirmed
            .get(hash)
            .is_some_and(|e| e.affirmers.contains(&validator))
    }

    /// Signed-flow collection state for a hash.
    pub fn signature_state(&self, hash: &MessageHash) -> CollectionState {
        match self.signed.get(hash) {
            None => CollectionState::Empty,
            Some(e) if e.announced => CollectionState::Quorate(e.signers.len()),
            Some(e) => CollectionState::Collecting(e.signers.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;

    use crate::types::Direction;

    fn sample_message() -> Message {
        Message::value_transfer(
            Direction::HomeToForeign,
            Address::repeat_byte(0x0a),
            Address::repeat_byte(0x0b),
            500,
            [0x0c; 32],
            100_000,
        )
    }

    fn signers(n: usize) -> Vec<PrivateKeySigner> {
        (0..n).map(|_| PrivateKeySigner::random()).collect()
    }

    fn validator_set(signers: &[PrivateKeySigner], required: usize) -> ValidatorSet {
        ValidatorSet::new(signers.iter().map(|s| s.address()).collect(), required).unwrap()
    }

    fn sign(signer: &PrivateKeySigner, message: &Message) -> Signature {
        let sig = signer
            .sign_hash_sync(&B256::from(message.hash().0))
            .unwrap();
        Signature::try_from(&sig.as_bytes()[..]).unwrap()
    }

    #[test]
    fn test_quorum_fires_once_at_threshold() {
        let keys = signers(3);
        let validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        let first = collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap();
        assert!(first.is_none());
        assert_eq!(
            collector.signature_state(&message.hash()),
            CollectionState::Collecting(1)
        );

        let second = collector
            .submit_signature(&validators, keys[1].address(), sign(&keys[1], &message), &message)
            .unwrap();
        let collected = second.expect("quorum should fire on second signature");
        assert_eq!(collected.signatures.len(), 2);
        assert_eq!(collected.relay_responsible, keys[1].address());

        // Post-quorum signature accepted for audit, no re-trigger
        let third = collector
            .submit_signature(&validators, keys[2].address(), sign(&keys[2], &message), &message)
            .unwrap();
        assert!(third.is_none());
        assert_eq!(collector.signature_count(&message.hash()), 3);
        assert_eq!(
            collector.signature_state(&message.hash()),
            CollectionState::Quorate(3)
        );
    }

    #[test]
    fn test_non_member_rejected() {
        let keys = signers(2);
        let validators = validator_set(&keys[..1], 1);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        let err = collector
            .submit_signature(&validators, keys[1].address(), sign(&keys[1], &message), &message)
            .unwrap_err();
        assert!(matches!(err, RelayError::NotAValidator { .. }));
        assert_eq!(collector.signature_count(&message.hash()), 0);
    }

    #[test]
    fn test_wrong_key_signature_rejected() {
        let keys = signers(2);
        let validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        // Validator 0 submits a signature produced by validator 1's key
        let err = collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[1], &message), &message)
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidSignature { .. }));
    }

    #[test]
    fn test_duplicate_submission_keeps_first_signature() {
        let keys = signers(2);
        let validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap();
        let err = collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap_err();
        assert!(matches!(err, RelayError::DuplicateSubmission { .. }));
        assert_eq!(collector.signature_count(&message.hash()), 1);
        assert!(collector.has_signed(keys[0].address(), &message.hash()));
    }

    #[test]
    fn test_failed_submission_does_not_poison_collected() {
        let keys = signers(3);
        let validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap();

        // Garbage signature from validator 1
        let bad = sign(&keys[2], &message);
        assert!(collector
            .submit_signature(&validators, keys[1].address(), bad, &message)
            .is_err());
        assert_eq!(collector.signature_count(&message.hash()), 1);

        // Valid second signature still reaches quorum
        let collected = collector
            .submit_signature(&validators, keys[1].address(), sign(&keys[1], &message), &message)
            .unwrap();
        assert!(collected.is_some());
    }

    #[test]
    fn test_threshold_raise_is_authoritative_at_evaluation() {
        let keys = signers(3);
        let mut validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap();

        // Threshold raised before the second signature lands
        validators.set_required_signatures(3).unwrap();

        let second = collector
            .submit_signature(&validators, keys[1].address(), sign(&keys[1], &message), &message)
            .unwrap();
        assert!(second.is_none(), "2 signatures no longer suffice");

        let third = collector
            .submit_signature(&validators, keys[2].address(), sign(&keys[2], &message), &message)
            .unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn test_quorate_entry_survives_threshold_raise() {
        let keys = signers(3);
        let mut validators = validator_set(&keys, 1);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        let collected = collector
            .submit_signature(&validators, keys[0].address(), sign(&keys[0], &message), &message)
            .unwrap();
        assert!(collected.is_some());

        // Accepted TOCTOU: raising the threshold does not demote the entry
        validators.set_required_signatures(3).unwrap();
        assert_eq!(
            collector.signature_state(&message.hash()),
            CollectionState::Quorate(1)
        );
    }

    #[test]
    fn test_affirmation_flow() {
        let keys = signers(3);
        let validators = validator_set(&keys, 2);
        let mut collector = SignatureCollector::new();
        let message = sample_message();

        assert!(collector
            .submit_affirmation(&validators, keys[0].address(), &message)
            .unwrap()
            .is_none());

        let err = collector
            .submit_affirmation(&validators, keys[0].address(), &message)
            .unwrap_err();
        assert!(matches!(err, RelayError::DuplicateSubmission { .. }));

        let completed = collector
            .submit_affirmation(&validators, keys[1].address(), &message)
            .unwrap()
            .expect("second distinct affirmation completes");
        assert_eq!(completed.affirmations, 2);
        assert!(collector.has_affirmed(keys[1].address(), &message.hash()));
    }
}
