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

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use log::{info, warn};
use tari_utilities::ByteArray;

use crate::{
    blocks::{Block, BlockHeader, ValidatorBitfield},
    chain_storage::BlockStore,
    consensus::LedgerCallbacks,
    coordinator::error::CoordinatorError,
    crypto::{self, Hash, PublicKey, Signature},
    enrollment::{Enrollment, EnrollmentError, EnrollmentManager},
    mempool::TransactionPool,
    transactions::{OutputLock, ScriptEngine, StackBudget, Transaction, TxHash},
    utxo::{UtxoKey, UtxoSet},
};

const LOG_TARGET: &str = "concord::coordinator::ledger";

/// Bookkeeping a height change triggers in the enrollment lifecycle.
#[derive(Debug, Default)]
pub struct EnrollmentBookkeeping {
    pub missed_reveals: Vec<crate::utxo::UtxoKey>,
    pub due_for_reenrollment: Vec<crate::utxo::UtxoKey>,
    pub ejected: Vec<crate::utxo::UtxoKey>,
}

/// Signatures collected so far over a single candidate block at some height, keyed by the
/// candidate's own `(previous_hash, merkle_root)` so a late signature over a stale or
/// since-replaced candidate is never folded into the wrong header.
struct PendingBlockSignatures {
    previous_hash: TxHash,
    merkle_root: Hash,
    signatures: HashMap<UtxoKey, Signature>,
}

struct CoordinatorState {
    block_store: BlockStore,
    utxo_set: UtxoSet,
    mempool: TransactionPool,
    enrollment_manager: EnrollmentManager,
    pending_block_signatures: HashMap<u64, PendingBlockSignatures>,
}

/// Orchestrates the ledger's core components end to end (component C8): admits transactions into
/// the pool, applies externalised slot values to chain state, replays blocks fetched during
/// catch-up sync, and runs the per-height enrollment bookkeeping pass.
pub struct LedgerCoordinator {
    state: Mutex<CoordinatorState>,
    script_engine: ScriptEngine,
    max_enrollments_per_block: usize,
    slash_penalty_amount: u64,
}

impl LedgerCoordinator {
    pub fn new(
        genesis: Block,
        min_stake: u64,
        cycle_length: u64,
        max_enrollments_per_block: usize,
        slash_penalty_amount: u64,
        recurring_enrollment: bool,
    ) -> Self {
        let script_engine = ScriptEngine::new(StackBudget::default());
        let mut utxo_set = UtxoSet::new(min_stake);
        utxo_set
            .apply(&genesis.transactions, 0, &script_engine)
            .expect("genesis transactions must be self-consistent");
        Self {
            state: Mutex::new(CoordinatorState {
                block_store: BlockStore::new(genesis),
                utxo_set,
                mempool: TransactionPool::new(),
                enrollment_manager: EnrollmentManager::new(cycle_length, recurring_enrollment),
                pending_block_signatures: HashMap::new(),
            }),
            script_engine,
            max_enrollments_per_block,
            slash_penalty_amount,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoordinatorState> {
        self.state.lock().expect("coordinator mutex poisoned")
    }

    pub fn tip_height(&self) -> u64 {
        self.lock().block_store.tip_height()
    }

    /// Clone of the block at `height`, for test and sync-response assembly.
    pub fn block_at(&self, height: u64) -> Option<Block> {
        self.lock().block_store.get(height).cloned()
    }

    /// Total enrolled validators (admitted or renewed), regardless of reveal-derived activity.
    pub fn enrolled_count(&self) -> usize {
        self.lock().enrollment_manager.validator_set().len()
    }

    /// Validators active at `height`, the input the quorum constructor derives each validator's
    /// quorum set from.
    pub fn active_validators(&self, height: u64) -> Vec<UtxoKey> {
        self.lock().enrollment_manager.validator_set().active_validators(height)
    }

    /// Current amount backing the frozen stake at `key`, for observing slashing's effect.
    pub fn utxo_amount(&self, key: &UtxoKey) -> Option<u64> {
        self.lock().utxo_set.peek(key).map(|utxo| utxo.amount)
    }

    /// Admit a newly received transaction into the pool, to be nominated in a future slot.
    pub fn accept_transaction(&self, tx: Transaction) -> Result<TxHash, CoordinatorError> {
        let mut state = self.lock();
        let next_height = state.block_store.tip_height() + 1;
        let hash = state.mempool.add(tx, &state.utxo_set, next_height, &self.script_engine)?;
        Ok(hash)
    }

    /// Whether every transaction in `transactions` would currently apply cleanly against chain
    /// state, without mutating it.
    pub fn validate_tx_set(&self, transactions: &[Transaction]) -> bool {
        let state = self.lock();
        let next_height = state.block_store.tip_height() + 1;
        let mut scratch = state.utxo_set.clone();
        scratch.apply(transactions, next_height, &self.script_engine).is_ok()
    }

    /// Submit `validator`'s signature over the candidate block at `height` built from
    /// `previous_hash` and `merkle_root`. Verified against the staker key backing the validator's
    /// frozen utxo and held until [`Self::on_tx_set_externalized`] folds it into the header's
    /// aggregated signature, provided that call ends up building the very same candidate.
    pub fn submit_block_signature(
        &self,
        height: u64,
        previous_hash: TxHash,
        merkle_root: Hash,
        validator: UtxoKey,
        signature: Vec<u8>,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        if !state.enrollment_manager.validator_set().active_validators(height).contains(&validator) {
            return Err(CoordinatorError::NotAnActiveValidator(validator));
        }
        let utxo = state.utxo_set.peek(&validator).cloned().ok_or(EnrollmentError::UnknownUtxo(validator))?;
        let staker_key = match &utxo.lock {
            OutputLock::Key(bytes) => {
                PublicKey::from_bytes(bytes).map_err(|_| CoordinatorError::InvalidBlockSignature(validator))?
            },
            _ => return Err(CoordinatorError::InvalidBlockSignature(validator)),
        };
        let sig = borsh::from_slice::<Signature>(&signature)
            .map_err(|_| CoordinatorError::InvalidBlockSignature(validator))?;
        let payload = BlockHeader::signing_payload(&previous_hash, height, &merkle_root);
        if !crypto::verify(&staker_key, &sig, &payload) {
            return Err(CoordinatorError::InvalidBlockSignature(validator));
        }
        let entry = state.pending_block_signatures.entry(height).or_insert_with(|| PendingBlockSignatures {
            previous_hash,
            merkle_root,
            signatures: HashMap::new(),
        });
        if entry.previous_hash != previous_hash || entry.merkle_root != merkle_root {
            return Err(CoordinatorError::StaleBlockSignature(height));
        }
        entry.signatures.insert(validator, sig);
        Ok(())
    }

    /// Fold an externalised slot value into a new block: applies its transactions to UTXO state,
    /// folds in pending enrollments up to the social-distancing cap, builds the header's
    /// validator bitfield and aggregated signature from whatever block signatures were collected
    /// for this exact candidate via [`Self::submit_block_signature`], and appends the block. A
    /// validator that never submitted a signature simply leaves its bit unset; nothing here
    /// requires a signing quorum before externalising, since that threshold is the nomination
    /// protocol's concern, not the ledger's.
    pub fn on_tx_set_externalized(&self, _slot: u64, transactions: Vec<Transaction>) -> Result<(), String> {
        let mut state = self.lock();
        let height = state.block_store.tip_height() + 1;

        if let Err(e) = state.utxo_set.apply(&transactions, height, &self.script_engine) {
            return Err(format!("externalised tx set rejected at height {height}: {e}"));
        }

        let enrollments = state.enrollment_manager.admit_pending(height, self.max_enrollments_per_block);
        for enroll in &enrollments {
            if let Err(e) = state.utxo_set.lock_freeze_for_enrollment(&enroll.utxo_key, height, enroll.cycle_length) {
                return Err(format!("failed to lock freeze stake for enrollment at height {height}: {e}"));
            }
        }
        let active_validators = state.enrollment_manager.validator_set().active_validators(height);
        let previous_hash = state.block_store.tip().hash();
        let merkle_root =
            crate::blocks::merkle_root(&transactions.iter().map(Transaction::hash).collect::<Vec<_>>());

        let collected = state
            .pending_block_signatures
            .remove(&height)
            .filter(|pending| pending.previous_hash == previous_hash && pending.merkle_root == merkle_root)
            .map(|pending| pending.signatures)
            .unwrap_or_default();
        let mut validator_bitfield = ValidatorBitfield::zeroed(active_validators.len());
        let mut signatures = Vec::new();
        for (index, key) in active_validators.iter().enumerate() {
            if let Some(sig) = collected.get(key) {
                validator_bitfield.set(index);
                signatures.push(sig.clone());
            }
        }
        let aggregated_signature =
            borsh::to_vec(&signatures).expect("signature vector borsh encoding is infallible");

        let header = BlockHeader {
            previous_hash,
            height,
            merkle_root,
            timestamp: Utc::now(),
            validator_bitfield,
            aggregated_signature,
            enrollments,
        };
        let block = Block::new(header, transactions);
        let hashes: Vec<TxHash> = block.transactions.iter().map(Transaction::hash).collect();

        if let Err(e) = state.block_store.append(block) {
            return Err(format!("failed to append block at height {height}: {e}"));
        }
        for hash in hashes {
            state.mempool.remove(&hash);
        }

        let missed = state.enrollment_manager.apply_missed_reveals(height);
        for key in &missed {
            if let Err(e) = state.utxo_set.slash(key, self.slash_penalty_amount) {
                warn!(target: LOG_TARGET, "height {height}: could not slash {key:?}: {e}");
            }
        }
        let ejected = state.enrollment_manager.eject_expired(height);
        if !missed.is_empty() {
            warn!(target: LOG_TARGET, "height {height}: {} validators missed their reveal", missed.len());
        }
        if !ejected.is_empty() {
            info!(target: LOG_TARGET, "height {height}: {} validators ejected at cycle end", ejected.len());
        }
        info!(target: LOG_TARGET, "externalised height {height}");
        Ok(())
    }

    /// Replay blocks fetched from a sync peer: applies each block's UTXO effects in order,
    /// appends it (verifying the same linkage checks a live-produced block would have to
    /// satisfy, plus a structural check that the aggregated signature's length matches the
    /// bitfield's set-bit count), and folds its committed enrollments into the validator set.
    /// Pre-image reveals are not carried by headers, so a synced node only regains
    /// per-validator liveness once reveals are re-gossiped to it — which also means the
    /// validator-ordinal mapping a signature bit refers to cannot be reconstructed here, so this
    /// stops short of re-verifying each individual signature against its signer.
    pub fn catchup(&self, blocks: Vec<Block>) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        for block in blocks {
            let height = block.header.height;
            if height <= state.block_store.tip_height() {
                continue;
            }
            let decoded: Vec<Signature> = borsh::from_slice(&block.header.aggregated_signature)
                .map_err(|_| CoordinatorError::CorruptAggregatedSignature(height))?;
            if decoded.len() as u32 != block.header.validator_bitfield.count_ones() {
                return Err(CoordinatorError::SignatureCountMismatch(
                    decoded.len() as u32,
                    block.header.validator_bitfield.count_ones(),
                ));
            }
            state.utxo_set.apply(&block.transactions, height, &self.script_engine)?;
            for enroll in &block.header.enrollments {
                state.enrollment_manager.replay_enrollment(enroll, height);
            }
            state.block_store.append(block)?;
        }
        Ok(())
    }

    /// Validate and admit an enrollment bid into the pending pool. The staked output must
    /// already exist in chain state as a Freeze utxo.
    pub fn submit_enrollment(&self, enroll: Enrollment) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        let utxo_key = enroll.utxo_key;
        let utxo = state.utxo_set.peek(&utxo_key).cloned().ok_or(EnrollmentError::UnknownUtxo(utxo_key))?;
        let cycle_length = state.enrollment_manager.cycle_length();
        state.enrollment_manager.add_enrollment(enroll, &utxo, cycle_length)?;
        Ok(())
    }

    /// Validators whose cycle ends at the upcoming height and who must submit a renewal bid
    /// before it.
    pub fn due_for_reenrollment(&self) -> Vec<UtxoKey> {
        let state = self.lock();
        let next_height = state.block_store.tip_height() + 1;
        state.enrollment_manager.due_for_reenrollment(next_height)
    }

    /// Submit a renewal bid for a validator [`Self::due_for_reenrollment`] already names, folding
    /// it into the pending pool without the validator ever leaving the active set.
    pub fn renew_enrollment(&self, enroll: Enrollment) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        let next_height = state.block_store.tip_height() + 1;
        let utxo_key = enroll.utxo_key;
        let utxo = state.utxo_set.peek(&utxo_key).cloned().ok_or(EnrollmentError::UnknownUtxo(utxo_key))?;
        let cycle_length = state.enrollment_manager.cycle_length();
        state.enrollment_manager.submit_renewal(enroll, &utxo, cycle_length, next_height)?;
        Ok(())
    }

    /// Record a pre-image reveal for an already-enrolled validator.
    pub fn reveal(&self, key: UtxoKey, preimage: crate::crypto::Hash, height: u64) -> Result<(), CoordinatorError> {
        let mut state = self.lock();
        state.enrollment_manager.record_reveal(&key, preimage, height)?;
        Ok(())
    }

    /// Run the per-height enrollment bookkeeping pass: missed-reveal slashing, due-for-reenrollment
    /// notices, and cycle-end ejection.
    pub fn check_and_enroll(&self, height: u64) -> EnrollmentBookkeeping {
        let mut state = self.lock();
        EnrollmentBookkeeping {
            missed_reveals: state.enrollment_manager.apply_missed_reveals(height),
            due_for_reenrollment: state.enrollment_manager.due_for_reenrollment(height),
            ejected: state.enrollment_manager.eject_expired(height),
        }
    }
}

impl LedgerCallbacks for LedgerCoordinator {
    fn validate_tx_set(&self, transactions: &[Transaction]) -> bool {
        LedgerCoordinator::validate_tx_set(self, transactions)
    }

    fn on_tx_set_externalized(&self, slot: u64, transactions: Vec<Transaction>) -> Result<(), String> {
        LedgerCoordinator::on_tx_set_externalized(self, slot, transactions)
    }
}

impl LedgerCallbacks for Arc<LedgerCoordinator> {
    fn validate_tx_set(&self, transactions: &[Transaction]) -> bool {
        (**self).validate_tx_set(transactions)
    }

    fn on_tx_set_externalized(&self, slot: u64, transactions: Vec<Transaction>) -> Result<(), String> {
        (**self).on_tx_set_externalized(slot, transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> Block {
        Block::genesis(Utc::now(), vec![])
    }

    #[test]
    fn accepting_an_unknown_input_transaction_is_rejected() {
        let coordinator = LedgerCoordinator::new(genesis(), 1000, 1008, 4, 100, true);
        let tx = Transaction::new(
            crate::transactions::TransactionTag::Payment,
            vec![crate::transactions::TransactionInput {
                previous_tx_hash: [9u8; 32],
                previous_output_index: 0,
                witness: crate::transactions::Witness::Key { signature: vec![] },
            }],
            vec![],
            0,
        );
        assert!(coordinator.accept_transaction(tx).is_err());
    }

    #[test]
    fn externalizing_an_empty_tx_set_advances_the_tip() {
        let coordinator = LedgerCoordinator::new(genesis(), 1000, 1008, 4, 100, true);
        assert!(coordinator.on_tx_set_externalized(1, vec![]).is_ok());
        assert_eq!(coordinator.tip_height(), 1);
    }

    #[test]
    fn validate_tx_set_does_not_mutate_state_on_rejection() {
        let coordinator = LedgerCoordinator::new(genesis(), 1000, 1008, 4, 100, true);
        let tx = Transaction::new(
            crate::transactions::TransactionTag::Payment,
            vec![crate::transactions::TransactionInput {
                previous_tx_hash: [9u8; 32],
                previous_output_index: 0,
                witness: crate::transactions::Witness::Key { signature: vec![] },
            }],
            vec![],
            0,
        );
        assert!(!coordinator.validate_tx_set(&[tx]));
        assert_eq!(coordinator.tip_height(), 0);
    }

    #[test]
    fn a_collected_block_signature_is_verified_and_folded_into_the_header() {
        use crate::{
            crypto::KeyPair,
            enrollment::{Enrollment, PreImageChain},
            transactions::{TransactionOutput, TransactionTag},
        };

        let keypair = KeyPair::generate();
        let freeze_tx = Transaction::new(
            TransactionTag::Freeze,
            vec![],
            vec![TransactionOutput { amount: 1_000, lock: OutputLock::key(&keypair.public) }],
            0,
        );
        let utxo_key = (freeze_tx.hash(), 0u32);
        let coordinator = LedgerCoordinator::new(Block::genesis(Utc::now(), vec![freeze_tx]), 1_000, 20, 4, 100, true);

        let chain = PreImageChain::generate(20);
        let unsigned = Enrollment::new(utxo_key, chain.commitment(), 20, Vec::new());
        let enroll_sig = crypto::sign(&keypair.secret, &unsigned.signing_bytes()).unwrap();
        let enroll = Enrollment::new(utxo_key, chain.commitment(), 20, borsh::to_vec(&enroll_sig).unwrap());
        coordinator.submit_enrollment(enroll).unwrap();
        coordinator.on_tx_set_externalized(1, vec![]).unwrap();

        coordinator.reveal(utxo_key, chain.reveal_at_distance(0).unwrap(), 2).unwrap();
        coordinator.on_tx_set_externalized(2, vec![]).unwrap();

        coordinator.reveal(utxo_key, chain.reveal_at_distance(1).unwrap(), 3).unwrap();
        assert_eq!(coordinator.active_validators(3), vec![utxo_key]);

        let previous_hash = coordinator.block_at(2).unwrap().hash();
        let merkle_root = crate::blocks::merkle_root(&[]);
        let payload = BlockHeader::signing_payload(&previous_hash, 3, &merkle_root);
        let block_sig = crypto::sign(&keypair.secret, &payload).unwrap();
        coordinator
            .submit_block_signature(3, previous_hash, merkle_root, utxo_key, borsh::to_vec(&block_sig).unwrap())
            .unwrap();
        coordinator.on_tx_set_externalized(3, vec![]).unwrap();

        let block = coordinator.block_at(3).unwrap();
        assert_eq!(block.header.validator_bitfield.count_ones(), 1);
        assert!(block.header.validator_bitfield.is_set(0));
        let decoded: Vec<Signature> = borsh::from_slice(&block.header.aggregated_signature).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(crypto::verify(&keypair.public, &decoded[0], &payload));
    }

    #[test]
    fn a_signature_from_a_non_active_validator_is_rejected() {
        use crate::crypto::KeyPair;

        let keypair = KeyPair::generate();
        let coordinator = LedgerCoordinator::new(genesis(), 1000, 1008, 4, 100, true);
        let bogus_key = ([7u8; 32], 0u32);
        let sig = crypto::sign(&keypair.secret, b"whatever").unwrap();
        let result = coordinator.submit_block_signature(
            1,
            coordinator.block_at(0).unwrap().hash(),
            crate::blocks::merkle_root(&[]),
            bogus_key,
            borsh::to_vec(&sig).unwrap(),
        );
        assert!(matches!(result, Err(CoordinatorError::NotAnActiveValidator(_))));
    }
}
