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

//! Builder-style fixtures for the cross-component scenario tests.

#![allow(dead_code)]

use chrono::Utc;
use concord_ledger::{
    blocks::{Block, BlockHeader},
    crypto::{Hash, KeyPair, PrivateKey, PublicKey},
    enrollment::{Enrollment, PreImageChain},
    transactions::{OutputLock, Transaction, TransactionOutput, TransactionTag, TxHash, Witness},
    utxo::UtxoKey,
};

/// One simulated validator: its staking identity, its own private pre-image chain, and the
/// genesis utxo that stakes it. Consensus externalisation is driven externally by the test (the
/// FBA library's role, out of this crate's scope) — each `TestValidator` only models the
/// node-local state a real validator would keep to itself, independent of any particular
/// coordinator's committed validator set.
pub struct TestValidator {
    pub keypair: KeyPair,
    pub utxo_key: UtxoKey,
    cycle_length: u64,
    chain: Option<PreImageChain>,
    enrolled_height: Option<u64>,
}

impl TestValidator {
    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    pub fn secret_key(&self) -> &PrivateKey {
        &self.keypair.secret
    }

    /// Generate a fresh enrollment bid committing to a new pre-image chain.
    pub fn generate_enrollment(&mut self) -> Enrollment {
        let chain = PreImageChain::generate(self.cycle_length);
        let commitment = chain.commitment();
        let unsigned = Enrollment::new(self.utxo_key, commitment, self.cycle_length, Vec::new());
        let signature = concord_ledger::crypto::sign(&self.keypair.secret, &unsigned.signing_bytes())
            .expect("signing always succeeds");
        self.chain = Some(chain);
        self.enrolled_height = None;
        Enrollment::new(self.utxo_key, commitment, self.cycle_length, borsh::to_vec(&signature).unwrap())
    }

    /// Record that the coordinator admitted (or renewed) this validator's bid at `height`, the
    /// enrolled-height the reveal distance is measured from.
    pub fn note_enrolled(&mut self, height: u64) {
        self.enrolled_height = Some(height);
    }

    /// The pre-image this validator owes at `height`, given its most recently generated chain and
    /// its last known enrolled height.
    pub fn reveal_at(&self, height: u64) -> [u8; 64] {
        let enrolled_height = self.enrolled_height.expect("validator must be marked enrolled before revealing");
        let distance = height.saturating_sub(enrolled_height + 1);
        let chain = self.chain.as_ref().expect("chain generated before revealing");
        chain.reveal_at_distance(distance).expect("chain covers this height")
    }

    /// Sign the candidate block header named by `previous_hash`/`height`/`merkle_root`, as this
    /// validator's node would before gossiping its block signature for collection.
    pub fn sign_block_header(&self, previous_hash: TxHash, height: u64, merkle_root: Hash) -> Vec<u8> {
        let payload = BlockHeader::signing_payload(&previous_hash, height, &merkle_root);
        let signature = concord_ledger::crypto::sign(&self.keypair.secret, &payload).expect("signing always succeeds");
        borsh::to_vec(&signature).expect("signature borsh encoding is infallible")
    }
}

/// Builds genesis Freeze stakes for a set of validators and produces the `TestValidator` handles
/// that stake them.
pub struct TestValidatorFactory {
    cycle_length: u64,
    stake: u64,
}

impl TestValidatorFactory {
    pub fn new(cycle_length: u64, stake: u64) -> Self {
        Self { cycle_length, stake }
    }

    /// Produce `count` validators plus the genesis block that stakes every one of them with a
    /// single Freeze transaction.
    pub fn spawn(&self, count: usize) -> (Block, Vec<TestValidator>) {
        let (genesis, validators, _) = self.spawn_with_payment_pool(count, 0, 0);
        (genesis, validators)
    }

    /// As [`Self::spawn`], but the genesis block also carries a Payment transaction with
    /// `num_payments` Key-locked outputs of `payment_amount` owned by validator 0, for tests that
    /// need spendable funds alongside the validators' stakes.
    pub fn spawn_with_payment_pool(
        &self,
        count: usize,
        num_payments: usize,
        payment_amount: u64,
    ) -> (Block, Vec<TestValidator>, Vec<UtxoKey>) {
        let keypairs: Vec<KeyPair> = (0..count).map(|_| KeyPair::generate()).collect();
        let outputs: Vec<TransactionOutput> =
            keypairs.iter().map(|kp| TransactionOutput { amount: self.stake, lock: OutputLock::key(&kp.public) }).collect();
        let freeze_tx = Transaction::new(TransactionTag::Freeze, vec![], outputs, 0);
        let freeze_hash = freeze_tx.hash();

        let mut transactions = vec![freeze_tx];
        let mut payment_keys = Vec::new();
        if num_payments > 0 {
            let payee = keypairs.first().expect("need at least one validator to own the payment pool");
            let payment_outputs: Vec<TransactionOutput> = (0..num_payments)
                .map(|_| TransactionOutput { amount: payment_amount, lock: OutputLock::key(&payee.public) })
                .collect();
            let payment_tx = Transaction::new(TransactionTag::Payment, vec![], payment_outputs, 0);
            let payment_hash = payment_tx.hash();
            payment_keys = (0..num_payments as u32).map(|i| (payment_hash, i)).collect();
            transactions.push(payment_tx);
        }
        let genesis = Block::genesis(Utc::now(), transactions);

        let validators = keypairs
            .into_iter()
            .enumerate()
            .map(|(i, keypair)| TestValidator {
                keypair,
                utxo_key: (freeze_hash, i as u32),
                cycle_length: self.cycle_length,
                chain: None,
                enrolled_height: None,
            })
            .collect();
        (genesis, validators, payment_keys)
    }
}

/// A signed Payment transaction spending `input_key` (a `Key`-locked output owned by `spender`)
/// into a single fresh Key-locked output of `amount`.
pub fn payment_spending(spender: &TestValidator, input_key: UtxoKey, amount: u64, fee: u64) -> Transaction {
    use concord_ledger::transactions::TransactionInput;

    let mut tx = Transaction::new(
        TransactionTag::Payment,
        vec![TransactionInput {
            previous_tx_hash: input_key.0,
            previous_output_index: input_key.1,
            witness: Witness::Key { signature: vec![] },
        }],
        vec![TransactionOutput { amount, lock: OutputLock::key(spender.public_key()) }],
        fee,
    );
    let message = tx.signing_hash();
    let signature = concord_ledger::crypto::sign(spender.secret_key(), &message).expect("signing always succeeds");
    tx.inputs[0].witness = Witness::Key { signature: borsh::to_vec(&signature).expect("signature borsh encoding is infallible") };
    tx
}

pub fn tx_hashes(txs: &[Transaction]) -> Vec<TxHash> {
    txs.iter().map(Transaction::hash).collect()
}
