// Copyright 2024. The Concord Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! The consensus driver: the capability object an external FBA (Stellar-style SCP) library is
//! driven against. This crate does not implement the nomination/ballot protocol itself — only
//! the eight callbacks the protocol needs from the host application.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::{debug, warn};
use tari_utilities::ByteArray;
use tokio::sync::Mutex;

use crate::{
    consensus::{
        envelope::{CandidateValue, Envelope},
        error::ConsensusError,
        timer::{TimerKind, TimerRegistry},
    },
    crypto::{self, merkle_hash_leaf, Hash},
    mempool::TransactionPool,
    quorum::{QuorumSet, ValidatorId},
};

const LOG_TARGET: &str = "concord::consensus::driver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueValidity {
    FullyValid,
    Invalid,
}

/// What the ledger side of the node needs to do once a slot value finally externalises. Kept as
/// a trait so the consensus driver never depends on the coordinator crate module directly.
pub trait LedgerCallbacks: Send + Sync {
    /// Whether every transaction in a candidate set would currently apply cleanly.
    fn validate_tx_set(&self, transactions: &[crate::transactions::Transaction]) -> bool;

    /// Apply an externalised tx set to chain state. User-visible failures are reported as
    /// strings, not typed errors, per the externally-facing contract of this callback.
    fn on_tx_set_externalized(&self, slot: u64, transactions: Vec<crate::transactions::Transaction>) -> Result<(), String>;
}

/// Where signed envelopes get sent once produced. Send failures are ignored by the driver: it
/// gossips optimistically rather than tracking delivery.
pub trait EnvelopeSink: Send + Sync {
    fn broadcast(&self, envelope: Envelope);
}

fn quorum_set_hash(quorum: &QuorumSet) -> Hash {
    let encoded = borsh::to_vec(quorum).expect("quorum set borsh encoding is infallible");
    merkle_hash_leaf(&encoded)
}

/// The eight-method FBA capability object. Generic over the ledger-side callback implementation
/// so this module stays independent of the coordinator.
pub struct ConsensusDriver<L: LedgerCallbacks> {
    validator_id: ValidatorId,
    keypair: crypto::KeyPair,
    mempool: Arc<Mutex<TransactionPool>>,
    ledger: L,
    sink: Arc<dyn EnvelopeSink>,
    timers: TimerRegistry,
    quorum_sets: HashMap<ValidatorId, QuorumSet>,
    quorum_sets_by_hash: HashMap<Hash, QuorumSet>,
    externalized: Mutex<HashMap<u64, ()>>,
}

impl<L: LedgerCallbacks> ConsensusDriver<L> {
    pub fn new(
        validator_id: ValidatorId,
        keypair: crypto::KeyPair,
        mempool: Arc<Mutex<TransactionPool>>,
        ledger: L,
        sink: Arc<dyn EnvelopeSink>,
        quorum_sets: HashMap<ValidatorId, QuorumSet>,
    ) -> Self {
        let quorum_sets_by_hash = quorum_sets.values().map(|q| (quorum_set_hash(q), q.clone())).collect();
        Self {
            validator_id,
            keypair,
            mempool,
            ledger,
            sink,
            timers: TimerRegistry::new(),
            quorum_sets,
            quorum_sets_by_hash,
            externalized: Mutex::new(HashMap::new()),
        }
    }

    /// Ask the mempool for up to `txs_to_nominate` transactions to propose for `slot`. Returns
    /// `None` when fewer are available and the caller should defer nominating this round, unless
    /// `txs_to_nominate == 0` (nominate an empty value).
    pub async fn propose_value(&self, txs_to_nominate: usize) -> Option<CandidateValue> {
        if txs_to_nominate == 0 {
            return Some(CandidateValue::new(vec![]));
        }
        let pool = self.mempool.lock().await;
        let ordered = pool.ordered();
        if ordered.len() < txs_to_nominate {
            debug!(
                target: LOG_TARGET,
                "deferring nomination: pool has {} of {} requested transactions",
                ordered.len(),
                txs_to_nominate
            );
            return None;
        }
        let chosen = ordered.into_iter().take(txs_to_nominate).cloned().collect();
        Some(CandidateValue::new(chosen))
    }

    pub fn validator_id(&self) -> ValidatorId {
        self.validator_id
    }
}

#[async_trait]
pub trait FbaDriver {
    async fn validate_value(&self, slot: u64, value: &[u8]) -> ValueValidity;
    fn combine_candidates(&self, slot: u64, candidates: Vec<Vec<u8>>) -> Vec<u8>;
    async fn value_externalized(&self, slot: u64, value: Vec<u8>) -> Result<(), ConsensusError>;
    fn emit_envelope(&self, envelope: Envelope);
    fn sign_envelope(&self, envelope: &Envelope) -> Vec<u8>;
    fn get_quorum_set(&self, hash: &Hash) -> Option<QuorumSet>;
    async fn setup_timer(&self, slot: u64, kind: TimerKind, timeout_ms: u64, callback: Option<Box<dyn FnOnce() + Send>>);
    async fn receive_envelope(&self, envelope: Envelope) -> Result<(), ConsensusError>;
}

#[async_trait]
impl<L: LedgerCallbacks + 'static> FbaDriver for ConsensusDriver<L> {
    async fn validate_value(&self, slot: u64, value: &[u8]) -> ValueValidity {
        let Ok(candidate) = CandidateValue::decode(value) else {
            warn!(target: LOG_TARGET, "slot {slot}: candidate value failed to decode");
            return ValueValidity::Invalid;
        };
        if self.ledger.validate_tx_set(&candidate.transactions) {
            ValueValidity::FullyValid
        } else {
            ValueValidity::Invalid
        }
    }

    /// Deterministic merge: every candidate that would not currently apply cleanly against chain
    /// state is discarded, then the lowest-fingerprint survivor wins, so every honest node
    /// resolves the same winner from the same candidate set regardless of arrival order.
    fn combine_candidates(&self, slot: u64, candidates: Vec<Vec<u8>>) -> Vec<u8> {
        let mut decoded: Vec<CandidateValue> = candidates
            .iter()
            .filter_map(|bytes| match CandidateValue::decode(bytes) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(target: LOG_TARGET, "slot {slot}: dropping undecodable candidate during combine");
                    None
                },
            })
            .filter(|candidate| {
                let valid = self.ledger.validate_tx_set(&candidate.transactions);
                if !valid {
                    warn!(target: LOG_TARGET, "slot {slot}: dropping a candidate that fails to apply during combine");
                }
                valid
            })
            .collect();
        decoded.sort_by_key(CandidateValue::fingerprint);
        decoded.into_iter().next().unwrap_or_else(|| CandidateValue::new(vec![])).encode()
    }

    async fn value_externalized(&self, slot: u64, value: Vec<u8>) -> Result<(), ConsensusError> {
        let mut externalized = self.externalized.lock().await;
        if externalized.contains_key(&slot) {
            debug!(target: LOG_TARGET, "slot {slot} already externalized, ignoring duplicate callback");
            return Ok(());
        }
        let candidate = CandidateValue::decode(&value)?;
        if let Err(reason) = self.ledger.on_tx_set_externalized(slot, candidate.transactions) {
            warn!(target: LOG_TARGET, "slot {slot}: externalization rejected by ledger: {reason}");
        }
        externalized.insert(slot, ());
        Ok(())
    }

    fn emit_envelope(&self, envelope: Envelope) {
        self.sink.broadcast(envelope);
    }

    fn sign_envelope(&self, envelope: &Envelope) -> Vec<u8> {
        match crypto::sign(&self.keypair.secret, &envelope.signing_bytes()) {
            Ok(signature) => borsh::to_vec(&signature).expect("signature borsh encoding is infallible"),
            Err(e) => {
                warn!(target: LOG_TARGET, "failed to sign envelope for slot {}: {e}", envelope.slot);
                vec![]
            },
        }
    }

    fn get_quorum_set(&self, hash: &Hash) -> Option<QuorumSet> {
        self.quorum_sets_by_hash.get(hash).cloned()
    }

    async fn setup_timer(&self, slot: u64, kind: TimerKind, timeout_ms: u64, callback: Option<Box<dyn FnOnce() + Send>>) {
        self.timers.setup_timer(slot, kind, timeout_ms, callback).await;
    }

    async fn receive_envelope(&self, envelope: Envelope) -> Result<(), ConsensusError> {
        envelope.verify()?;
        let sender = crypto::PublicKey::from_bytes(&envelope.sender).map_err(|_| ConsensusError::MalformedEnvelope)?;
        debug!(target: LOG_TARGET, "accepted envelope for slot {} from {}", envelope.slot, hex::encode(sender.as_bytes()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::Transaction;

    struct AcceptingLedger;
    impl LedgerCallbacks for AcceptingLedger {
        fn validate_tx_set(&self, _transactions: &[Transaction]) -> bool {
            true
        }

        fn on_tx_set_externalized(&self, _slot: u64, _transactions: Vec<Transaction>) -> Result<(), String> {
            Ok(())
        }
    }

    /// Rejects any candidate whose single transaction has fee `13`, to exercise
    /// `combine_candidates`'s validation filter independent of decodability.
    struct RejectingFeeThirteen;
    impl LedgerCallbacks for RejectingFeeThirteen {
        fn validate_tx_set(&self, transactions: &[Transaction]) -> bool {
            !transactions.iter().any(|tx| tx.fee == 13)
        }

        fn on_tx_set_externalized(&self, _slot: u64, _transactions: Vec<Transaction>) -> Result<(), String> {
            Ok(())
        }
    }

    struct NullSink;
    impl EnvelopeSink for NullSink {
        fn broadcast(&self, _envelope: Envelope) {}
    }

    fn driver() -> ConsensusDriver<AcceptingLedger> {
        let pair = crypto::KeyPair::generate();
        ConsensusDriver::new(
            ([7u8; 32], 0),
            pair,
            Arc::new(Mutex::new(TransactionPool::new())),
            AcceptingLedger,
            Arc::new(NullSink),
            HashMap::new(),
        )
    }

    fn driver_rejecting_fee_thirteen() -> ConsensusDriver<RejectingFeeThirteen> {
        let pair = crypto::KeyPair::generate();
        ConsensusDriver::new(
            ([7u8; 32], 0),
            pair,
            Arc::new(Mutex::new(TransactionPool::new())),
            RejectingFeeThirteen,
            Arc::new(NullSink),
            HashMap::new(),
        )
    }

    #[tokio::test]
    async fn validate_value_rejects_undecodable_bytes() {
        let driver = driver();
        assert_eq!(driver.validate_value(1, b"not-borsh-at-all!!").await, ValueValidity::Invalid);
    }

    #[tokio::test]
    async fn validate_value_accepts_an_empty_candidate() {
        let driver = driver();
        let value = CandidateValue::new(vec![]).encode();
        assert_eq!(driver.validate_value(1, &value).await, ValueValidity::FullyValid);
    }

    #[test]
    fn combine_candidates_picks_the_only_decodable_one() {
        let driver = driver();
        let good = CandidateValue::new(vec![]).encode();
        let garbage = vec![0xffu8; 4];
        let winner = driver.combine_candidates(1, vec![garbage, good.clone()]);
        assert_eq!(winner, good);
    }

    #[test]
    fn combine_candidates_discards_a_candidate_that_fails_validation_even_with_fewer_transactions() {
        use crate::transactions::TransactionTag;

        let driver = driver_rejecting_fee_thirteen();
        let invalid_but_short = CandidateValue::new(vec![Transaction::new(TransactionTag::Payment, vec![], vec![], 13)]);
        let valid_but_longer = CandidateValue::new(vec![
            Transaction::new(TransactionTag::Payment, vec![], vec![], 1),
            Transaction::new(TransactionTag::Payment, vec![], vec![], 2),
        ]);
        let winner =
            driver.combine_candidates(1, vec![invalid_but_short.encode(), valid_but_longer.clone().encode()]);
        assert_eq!(winner, valid_but_longer.encode());
    }

    #[test]
    fn combine_candidates_breaks_ties_on_fingerprint_alone() {
        use crate::transactions::TransactionTag;

        let driver = driver();
        let a = CandidateValue::new(vec![Transaction::new(TransactionTag::Payment, vec![], vec![], 1)]);
        let b = CandidateValue::new(vec![Transaction::new(TransactionTag::Payment, vec![], vec![], 2)]);
        let expected = if a.fingerprint() <= b.fingerprint() { a.encode() } else { b.encode() };
        let winner = driver.combine_candidates(1, vec![a.encode(), b.encode()]);
        assert_eq!(winner, expected);
    }

    #[tokio::test]
    async fn value_externalized_is_idempotent() {
        let driver = driver();
        let value = CandidateValue::new(vec![]).encode();
        assert!(driver.value_externalized(5, value.clone()).await.is_ok());
        assert!(driver.value_externalized(5, value).await.is_ok());
    }

    #[tokio::test]
    async fn propose_value_defers_when_pool_is_thin() {
        let driver = driver();
        assert!(driver.propose_value(3).await.is_none());
        assert!(driver.propose_value(0).await.is_some());
    }

    #[test]
    fn sign_envelope_produces_a_verifiable_signature() {
        let driver = driver();
        let sender = driver.keypair.public.clone();
        let mut envelope = Envelope::new_signed(1, &sender, vec![1, 2, 3], &driver.keypair.secret).unwrap();
        envelope.signature = driver.sign_envelope(&envelope);
        assert!(envelope.verify().is_ok());
    }
}
