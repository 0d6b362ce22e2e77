//! Relay execution state machine
//!
//! One `RelayExecutor` per direction owns the validator set, signature
//! collector, replay guard, rate limiter, and execution records for that
//! direction. Every mutating operation funnels through `&mut self`, which
//! gives the transactional-by-message model: no other attempt can interleave
//! with a check-then-record sequence.
//!
//! Per-message states: Unseen → Pending → {Executed | Failed}, with
//! Failed → Executed reachable exactly once through the fix path.

use std::collections::HashMap;

use alloy::primitives::{Address, Signature, U256};
use tracing::{info, warn};

use crate::codec::Message;
use crate::error::{ErrorCategory, RelayError};
use crate::limits::{day_index, RateLimiter};
use crate::replay::ReplayGuard;
use crate::signatures::SignatureCollector;
use crate::types::{Completion, Direction, MessageHash, RelayStatus, TransferKind};
use crate::validators::ValidatorSet;

/// Destination-side value effect (mint/unlock), the token collaborator
/// boundary. A failure here surfaces as an effect error and a `Failed`
/// record, never a silent `Executed`.
pub trait EffectHandler {
    fn apply_effect(&mut self, recipient: Address, amount: u128) -> Result<(), String>;
}

/// Per-message bookkeeping once a first relay attempt has been seen.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub message: Message,
    pub status: RelayStatus,
    /// Category of the most recent execution failure, if any
    pub failure: Option<ErrorCategory>,
    pub fix_requested: bool,
}

impl ExecutionRecord {
    fn pending(message: Message) -> Self {
        ExecutionRecord {
            message,
            status: RelayStatus::Pending,
            failure: None,
            fix_requested: false,
        }
    }
}

/// Result of the execution attempt chained onto a fresh quorum.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Executed(Completion),
    Failed {
        category: ErrorCategory,
        detail: String,
    },
}

/// Result of an accepted signature or affirmation submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub hash: MessageHash,
    /// Distinct submissions collected so far for this flow
    pub submissions: usize,
    /// Whether this submission newly reached quorum
    pub quorum_reached: bool,
    /// Signer whose submission tipped quorum (signed flow only)
    pub relay_responsible: Option<Address>,
    /// Execution result when quorum fired this call
    pub execution: Option<ExecutionOutcome>,
}

/// Orchestrates validation, replay protection, rate limiting, and effect
/// application for one relay direction.
pub struct RelayExecutor<E: EffectHandler> {
    direction: Direction,
    validators: ValidatorSet,
    collector: SignatureCollector,
    replay: ReplayGuard,
    limits: RateLimiter,
    records: HashMap<MessageHash, ExecutionRecord>,
    effects: E,
}

impl<E: EffectHandler> RelayExecutor<E> {
    pub fn new(
        direction: Direction,
        validators: ValidatorSet,
        limits: RateLimiter,
        effects: E,
    ) -> Self {
        RelayExecutor {
            direction,
            validators,
            collector: SignatureCollector::new(),
            replay: ReplayGuard::new(),
            limits,
            records: HashMap::new(),
            effects,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Submit a validator signature; on a fresh quorum, chains synchronously
    /// into execution. A limit or effect failure during that execution marks
    /// the record `Failed` and is reported in the outcome, not as an error
    /// of the submission itself.
    pub fn submit_signature(
        &mut self,
        signer: Address,
        signature: Signature,
        message: &Message,
        now_secs: u64,
    ) -> Result<SubmitOutcome, RelayError> {
        let hash = self.gate(message)?;
        let collected =
            self.collector
                .submit_signature(&self.validators, signer, signature, message)?;
        self.records
            .entry(hash)
            .or_insert_with(|| ExecutionRecord::pending(message.clone()));

        let mut outcome = SubmitOutcome {
            hash,
            submissions: self.collector.signature_count(&hash),
            quorum_reached: false,
            relay_responsible: None,
            execution: None,
        };
        if let Some(collected) = collected {
            outcome.quorum_reached = true;
            outcome.relay_responsible = Some(collected.relay_responsible);
            outcome.execution = Some(self.run_execution(message, now_secs));
        }
        Ok(outcome)
    }

    /// Submit a validator affirmation (push-style flow, no signature).
    pub fn submit_affirmation(
        &mut self,
        validator: Address,
        message: &Message,
        now_secs: u64,
    ) -> Result<SubmitOutcome, RelayError> {
        let hash = self.gate(message)?;
        let completed = self
            .collector
            .submit_affirmation(&self.validators, validator, message)?;
        self.records
            .entry(hash)
            .or_insert_with(|| ExecutionRecord::pending(message.clone()));

        let mut outcome = SubmitOutcome {
            hash,
            submissions: self.collector.affirmation_count(&hash),
            quorum_reached: false,
            relay_responsible: None,
            execution: None,
        };
        if completed.is_some() {
            outcome.quorum_reached = true;
            outcome.execution = Some(self.run_execution(message, now_secs));
        }
        Ok(outcome)
    }

    /// Flag a failed record for recovery. Separately authorized from the
    /// submission path; the embedding node performs the caller check.
    pub fn request_fix(&mut self, hash: MessageHash) -> Result<(), RelayError> {
        let record = self
            .records
            .get_mut(&hash)
            .ok_or(RelayError::NotFound { hash })?;
        match record.status {
            RelayStatus::Executed => Err(RelayError::AlreadyFixed { hash }),
            RelayStatus::Failed => {
                record.fix_requested = true;
                info!(hash = %hash, "Fix requested");
                Ok(())
            }
            status => Err(RelayError::NotFailed { hash, status }),
        }
    }

    /// Retry a failed record against the limits in force *now*.
    ///
    /// Deliberate leniency carried over from the source protocol: an
    /// operator can raise a limit and then fix a transfer the old limit
    /// capped. Succeeds at most once; fixing an executed hash is
    /// `AlreadyFixed` and never re-applies the effect.
    pub fn fix(&mut self, hash: MessageHash, now_secs: u64) -> Result<Completion, RelayError> {
        let (message, status, requested) = {
            let record = self.records.get(&hash).ok_or(RelayError::NotFound { hash })?;
            (record.message.clone(), record.status, record.fix_requested)
        };
        match status {
            RelayStatus::Executed => return Err(RelayError::AlreadyFixed { hash }),
            RelayStatus::Failed => {}
            status => return Err(RelayError::NotFailed { hash, status }),
        }
        if !requested {
            return Err(RelayError::FixNotRequested { hash });
        }

        match self.execute(&message, now_secs) {
            Ok(completion) => {
                if let Some(record) = self.records.get_mut(&hash) {
                    record.status = RelayStatus::Executed;
                    record.failure = None;
                    record.fix_requested = false;
                }
                info!(hash = %hash, "Failed message fixed and executed");
                Ok(completion)
            }
            Err(err) => {
                let category = err.category();
                if let Some(record) = self.records.get_mut(&hash) {
                    record.failure = Some(category);
                }
                warn!(hash = %hash, category = %category, error = %err, "Fix attempt failed");
                Err(err)
            }
        }
    }

    /// Record a source-side send against the deposit daily limit. The
    /// inbound event boundary calls this when originating a transfer.
    pub fn note_outbound_transfer(&mut self, amount: u128, now_secs: u64) -> Result<(), RelayError> {
        self.limits
            .check_and_record(day_index(now_secs), amount, TransferKind::Deposit)
    }

    pub fn status(&self, hash: &MessageHash) -> RelayStatus {
        self.records
            .get(hash)
            .map_or(RelayStatus::Unseen, |r| r.status)
    }

    pub fn record(&self, hash: &MessageHash) -> Option<&ExecutionRecord> {
        self.records.get(hash)
    }

    /// Legacy bit-packed processed marker for the hash (§ persisted-state
    /// compatibility).
    pub fn processed_marker(&self, hash: &MessageHash) -> U256 {
        self.replay.to_marker(hash)
    }

    pub fn collector(&self) -> &SignatureCollector {
        &self.collector
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Admin access to the validator set. Mutations ride the same `&mut
    /// self` as relay attempts, so they are serialized against in-flight
    /// submissions.
    pub fn validators_mut(&mut self) -> &mut ValidatorSet {
        &mut self.validators
    }

    pub fn limits(&self) -> &RateLimiter {
        &self.limits
    }

    pub fn limits_mut(&mut self) -> &mut RateLimiter {
        &mut self.limits
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    /// Mutable access to the effect collaborator (operator actions such as
    /// funding a backing reserve).
    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    /// Direction and replay gate for incoming submissions. Submissions for
    /// an executed hash are replay-rejected; submissions for a pending or
    /// failed hash are still collected.
    fn gate(&self, message: &Message) -> Result<MessageHash, RelayError> {
        if message.direction != self.direction {
            return Err(RelayError::WrongDirection {
                expected: self.direction,
                got: message.direction,
            });
        }
        let hash = message.hash();
        if self.replay.is_executed(&hash) {
            return Err(RelayError::AlreadyProcessed { hash });
        }
        Ok(hash)
    }

    /// Run execution for a freshly quorate message and fold the result into
    /// the record.
    fn run_execution(&mut self, message: &Message, now_secs: u64) -> ExecutionOutcome {
        let hash = message.hash();
        match self.execute(message, now_secs) {
            Ok(completion) => {
                if let Some(record) = self.records.get_mut(&hash) {
                    record.status = RelayStatus::Executed;
                    record.failure = None;
                }
                info!(
                    hash = %hash,
                    sender = %completion.sender,
                    executor = %completion.executor,
                    "Message executed"
                );
                ExecutionOutcome::Executed(completion)
            }
            Err(err) => {
                let category = err.category();
                // A replay rejection means the effect already happened; the
                // executed record must not be demoted.
                if category != ErrorCategory::Replay {
                    if let Some(record) = self.records.get_mut(&hash) {
                        record.status = RelayStatus::Failed;
                        record.failure = Some(category);
                    }
                }
                warn!(hash = %hash, category = %category, error = %err, "Execution failed");
                ExecutionOutcome::Failed {
                    category,
                    detail: err.to_string(),
                }
            }
        }
    }

    /// Apply the destination-side effect exactly once.
    ///
    /// Order matters: the replay gate comes before any side effect, the
    /// limit check-and-record and the effect application form one atomic
    /// attempt (the bucket is compensated if the effect fails), and the
    /// replay mark lands only after the effect succeeded.
    fn execute(&mut self, message: &Message, now_secs: u64) -> Result<Completion, RelayError> {
        let hash = message.hash();
        if self.replay.is_executed(&hash) {
            return Err(RelayError::AlreadyProcessed { hash });
        }
        self.replay.record_attempt(&hash);

        let amount = message.transfer_amount()?;
        let day = day_index(now_secs);
        self.limits
            .check_and_record(day, amount, TransferKind::Withdrawal)?;

        if let Err(reason) = self.effects.apply_effect(message.executor, amount) {
            self.limits.release(day, amount, TransferKind::Withdrawal);
            return Err(RelayError::EffectFailed { reason });
        }

        self.replay.mark_executed(&hash);
        Ok(Completion {
            sender: message.sender,
            executor: message.executor,
            message_hash: hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use alloy::signers::local::PrivateKeySigner;
    use alloy::signers::SignerSync;

    use crate::limits::LimitConfig;

    /// In-memory effect recorder with an optional forced failure.
    #[derive(Debug, Default)]
    struct TestEffects {
        applied: Vec<(Address, u128)>,
        fail_with: Option<String>,
    }

    impl EffectHandler for TestEffects {
        fn apply_effect(&mut self, recipient: Address, amount: u128) -> Result<(), String> {
            if let Some(reason) = &self.fail_with {
                return Err(reason.clone());
            }
            self.applied.push((recipient, amount));
            Ok(())
        }
    }

    const NOW: u64 = 1_700_000_000;

    fn keys(n: usize) -> Vec<PrivateKeySigner> {
        (0..n).map(|_| PrivateKeySigner::random()).collect()
    }

    fn executor(keys: &[PrivateKeySigner], required: usize) -> RelayExecutor<TestEffects> {
        let validators =
            ValidatorSet::new(keys.iter().map(|k| k.address()).collect(), required).unwrap();
        let limits = RateLimiter::new(
            LimitConfig::new(TransferKind::Deposit, 1, 1_000, 5_000).unwrap(),
            LimitConfig::new(TransferKind::Withdrawal, 1, 1_000, 5_000).unwrap(),
        );
        RelayExecutor::new(
            Direction::HomeToForeign,
            validators,
            limits,
            TestEffects::default(),
        )
    }

    fn transfer(amount: u128, nonce: u8) -> Message {
        Message::value_transfer(
            Direction::HomeToForeign,
            Address::repeat_byte(0x01),
            Address::repeat_byte(0x02),
            amount,
            [nonce; 32],
            100_000,
        )
    }

    fn sign(key: &PrivateKeySigner, message: &Message) -> Signature {
        let sig = key.sign_hash_sync(&B256::from(message.hash().0)).unwrap();
        Signature::try_from(&sig.as_bytes()[..]).unwrap()
    }

    #[test]
    fn test_single_validator_executes_immediately() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        let message = transfer(100, 1);

        let outcome = exec
            .submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        assert!(outcome.quorum_reached);
        assert!(matches!(
            outcome.execution,
            Some(ExecutionOutcome::Executed(_))
        ));
        assert_eq!(exec.status(&message.hash()), RelayStatus::Executed);
        assert_eq!(exec.effects().applied, vec![(Address::repeat_byte(0x02), 100)]);
    }

    #[test]
    fn test_pending_until_threshold_then_executes() {
        let keys = keys(5);
        let mut exec = executor(&keys, 3);
        let message = transfer(100, 1);

        for key in &keys[..2] {
            let outcome = exec
                .submit_signature(key.address(), sign(key, &message), &message, NOW)
                .unwrap();
            assert!(!outcome.quorum_reached);
        }
        assert_eq!(exec.status(&message.hash()), RelayStatus::Pending);

        let outcome = exec
            .submit_signature(keys[2].address(), sign(&keys[2], &message), &message, NOW)
            .unwrap();
        assert!(outcome.quorum_reached);
        assert_eq!(outcome.relay_responsible, Some(keys[2].address()));
        assert_eq!(exec.status(&message.hash()), RelayStatus::Executed);
        assert_eq!(exec.effects().applied.len(), 1);
    }

    #[test]
    fn test_wrong_direction_rejected_without_state_change() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        let mut message = transfer(100, 1);
        message.direction = Direction::ForeignToHome;

        let err = exec
            .submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap_err();
        assert!(matches!(err, RelayError::WrongDirection { .. }));
        assert_eq!(exec.status(&message.hash()), RelayStatus::Unseen);
    }

    #[test]
    fn test_replay_of_executed_message_rejected() {
        let keys = keys(2);
        let mut exec = executor(&keys, 1);
        let message = transfer(100, 1);

        exec.submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        assert_eq!(exec.status(&message.hash()), RelayStatus::Executed);

        // Fresh valid signature from another validator, same message
        let err = exec
            .submit_signature(keys[1].address(), sign(&keys[1], &message), &message, NOW)
            .unwrap_err();
        assert!(matches!(err, RelayError::AlreadyProcessed { .. }));
        assert_eq!(exec.effects().applied.len(), 1);
    }

    #[test]
    fn test_limit_failure_marks_failed_and_fix_recovers() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        // max_per_tx is 1_000
        let message = transfer(1_001, 1);
        let hash = message.hash();

        let outcome = exec
            .submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        match outcome.execution {
            Some(ExecutionOutcome::Failed { category, .. }) => {
                assert_eq!(category, ErrorCategory::Limit);
            }
            other => panic!("expected limit failure, got {:?}", other),
        }
        assert_eq!(exec.status(&hash), RelayStatus::Failed);
        assert!(exec.effects().applied.is_empty());

        // Fix without a request is rejected
        assert!(matches!(
            exec.fix(hash, NOW).unwrap_err(),
            RelayError::FixNotRequested { .. }
        ));

        // Operator raises the limits, requests and runs the fix
        exec.limits_mut()
            .set_daily_limit(TransferKind::Withdrawal, 10_000)
            .unwrap();
        exec.limits_mut()
            .set_max_per_tx(TransferKind::Withdrawal, 2_000)
            .unwrap();
        exec.request_fix(hash).unwrap();
        let completion = exec.fix(hash, NOW).unwrap();
        assert_eq!(completion.message_hash, hash);
        assert_eq!(exec.status(&hash), RelayStatus::Executed);
        assert_eq!(exec.effects().applied, vec![(Address::repeat_byte(0x02), 1_001)]);

        // Fix is idempotent: second call is AlreadyFixed, no double effect
        assert!(matches!(
            exec.fix(hash, NOW).unwrap_err(),
            RelayError::AlreadyFixed { .. }
        ));
        assert_eq!(exec.effects().applied.len(), 1);
    }

    #[test]
    fn test_effect_failure_marks_failed_and_releases_budget() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        exec.effects.fail_with = Some("insufficient backing reserve".to_string());
        let message = transfer(500, 1);
        let hash = message.hash();

        let outcome = exec
            .submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        match outcome.execution {
            Some(ExecutionOutcome::Failed { category, .. }) => {
                assert_eq!(category, ErrorCategory::Effect);
            }
            other => panic!("expected effect failure, got {:?}", other),
        }
        assert_eq!(exec.status(&hash), RelayStatus::Failed);
        // The failed attempt must not consume daily budget
        assert_eq!(
            exec.limits().total_spent(day_index(NOW), TransferKind::Withdrawal),
            0
        );

        // Once the effect collaborator recovers, fix succeeds
        exec.effects.fail_with = None;
        exec.request_fix(hash).unwrap();
        exec.fix(hash, NOW).unwrap();
        assert_eq!(exec.status(&hash), RelayStatus::Executed);
    }

    #[test]
    fn test_request_fix_rejections() {
        let keys = keys(2);
        let mut exec = executor(&keys, 2);
        let message = transfer(100, 1);
        let hash = message.hash();

        assert!(matches!(
            exec.request_fix(hash).unwrap_err(),
            RelayError::NotFound { .. }
        ));

        exec.submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        assert!(matches!(
            exec.request_fix(hash).unwrap_err(),
            RelayError::NotFailed {
                status: RelayStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn test_affirmation_flow_executes() {
        let keys = keys(3);
        let mut exec = executor(&keys, 2);
        let message = transfer(200, 1);

        let outcome = exec
            .submit_affirmation(keys[0].address(), &message, NOW)
            .unwrap();
        assert!(!outcome.quorum_reached);

        let outcome = exec
            .submit_affirmation(keys[1].address(), &message, NOW)
            .unwrap();
        assert!(outcome.quorum_reached);
        assert_eq!(exec.status(&message.hash()), RelayStatus::Executed);
    }

    #[test]
    fn test_outbound_transfer_uses_deposit_bucket() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        exec.note_outbound_transfer(800, NOW).unwrap();
        assert_eq!(
            exec.limits().total_spent(day_index(NOW), TransferKind::Deposit),
            800
        );
        // Withdrawal bucket untouched
        assert_eq!(
            exec.limits().total_spent(day_index(NOW), TransferKind::Withdrawal),
            0
        );
    }

    #[test]
    fn test_processed_marker_reflects_execution() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        let message = transfer(100, 1);
        let hash = message.hash();

        assert_eq!(exec.processed_marker(&hash), U256::ZERO);
        exec.submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        let marker = exec.processed_marker(&hash);
        assert!(crate::replay::marker_is_processed(marker));
        assert_eq!(crate::replay::marker_count(marker), U256::from(1u8));
    }

    #[test]
    fn test_malformed_payload_fails_at_execution() {
        let keys = keys(1);
        let mut exec = executor(&keys, 1);
        let message = Message {
            direction: Direction::HomeToForeign,
            sender: Address::repeat_byte(0x01),
            executor: Address::repeat_byte(0x02),
            payload: vec![0u8; 7],
            tx_id: [9u8; 32],
            gas_hint: 0,
        };

        let outcome = exec
            .submit_signature(keys[0].address(), sign(&keys[0], &message), &message, NOW)
            .unwrap();
        match outcome.execution {
            Some(ExecutionOutcome::Failed { category, .. }) => {
                assert_eq!(category, ErrorCategory::Validation);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
        assert_eq!(exec.status(&message.hash()), RelayStatus::Failed);
    }
}
