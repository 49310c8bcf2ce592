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

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::{
    mempool::error::MempoolError,
    transactions::{ScriptEngine, Transaction, TxHash},
    utxo::{UtxoKey, UtxoSet},
};

const LOG_TARGET: &str = "concord::mempool";

/// The holding area for accepted, not-yet-externalised transactions. Keyed by tx-hash, but
/// `order` preserves insertion order so nomination can offer transactions fairly.
#[derive(Debug, Default)]
pub struct TransactionPool {
    entries: HashMap<TxHash, Transaction>,
    order: Vec<TxHash>,
    /// Union of every input any pooled transaction currently references, to reject cross-tx
    /// double spends within the pool in O(1).
    reserved_inputs: HashSet<UtxoKey>,
    /// Hashes that were ever admitted, kept indefinitely for gossip suppression.
    ever_accepted: HashSet<TxHash>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn was_ever_accepted(&self, hash: &TxHash) -> bool {
        self.ever_accepted.contains(hash)
    }

    /// Transactions in admission order, for nomination candidate-value assembly.
    pub fn ordered(&self) -> Vec<&Transaction> {
        self.order.iter().filter_map(|h| self.entries.get(h)).collect()
    }

    /// Validate `tx` against `utxo_set` at `height` and admit it if every input is currently
    /// spendable, the witness checks out, and no input is already reserved by another pooled
    /// transaction.
    pub fn add(
        &mut self,
        tx: Transaction,
        utxo_set: &UtxoSet,
        height: u64,
        engine: &ScriptEngine,
    ) -> Result<TxHash, MempoolError> {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(MempoolError::AlreadyPresent(hash));
        }
        for input in &tx.inputs {
            let key = (input.previous_tx_hash, input.previous_output_index);
            if self.reserved_inputs.contains(&key) {
                return Err(MempoolError::DoubleSpendInPool(hash));
            }
            let utxo = utxo_set.find_spendable(&key, height)?;
            engine
                .evaluate(&utxo.lock, &input.witness, &tx)
                .map_err(|e| crate::utxo::UtxoError::ScriptFailed(e.to_string()))?;
        }

        for input in &tx.inputs {
            self.reserved_inputs.insert((input.previous_tx_hash, input.previous_output_index));
        }
        self.order.push(hash);
        self.entries.insert(hash, tx);
        self.ever_accepted.insert(hash);
        debug!(target: LOG_TARGET, "admitted transaction {}", hex::encode(hash));
        Ok(hash)
    }

    /// Drop `hash` from the pool, typically because it has just externalised in a block.
    pub fn remove(&mut self, hash: &TxHash) -> Option<Transaction> {
        let tx = self.entries.remove(hash)?;
        self.order.retain(|h| h != hash);
        for input in &tx.inputs {
            self.reserved_inputs.remove(&(input.previous_tx_hash, input.previous_output_index));
        }
        trace!(target: LOG_TARGET, "removed transaction {}", hex::encode(hash));
        Some(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::{OutputLock, TransactionOutput, TransactionTag};

    fn engine() -> ScriptEngine {
        ScriptEngine::new(Default::default())
    }

    fn funded_utxo_set() -> (UtxoSet, Transaction, crate::crypto::KeyPair) {
        let keypair = crate::crypto::KeyPair::generate();
        let mut set = UtxoSet::new(100);
        let cb = Transaction::new(
            TransactionTag::Coinbase,
            vec![],
            vec![TransactionOutput { amount: 500, lock: OutputLock::key(&keypair.public) }],
            0,
        );
        set.apply(&[cb.clone()], 0, &engine()).unwrap();
        (set, cb, keypair)
    }

    fn spend(cb: &Transaction, keypair: &crate::crypto::KeyPair) -> Transaction {
        use crate::transactions::{TransactionInput, Witness};
        let unsigned = Transaction::new(
            TransactionTag::Payment,
            vec![TransactionInput {
                previous_tx_hash: cb.hash(),
                previous_output_index: 0,
                witness: Witness::Key { signature: vec![] },
            }],
            vec![],
            0,
        );
        let signature = crate::crypto::sign(&keypair.secret, &unsigned.signing_hash()).unwrap();
        let input = TransactionInput {
            previous_tx_hash: cb.hash(),
            previous_output_index: 0,
            witness: Witness::Key { signature: borsh::to_vec(&signature).unwrap() },
        };
        Transaction::new(TransactionTag::Payment, vec![input], vec![], 0)
    }

    #[test]
    fn add_then_duplicate_is_rejected() {
        let (set, cb, keypair) = funded_utxo_set();
        let mut pool = TransactionPool::new();
        let tx = spend(&cb, &keypair);
        pool.add(tx.clone(), &set, 1, &engine()).unwrap();
        assert!(pool.contains(&tx.hash()));
        assert_eq!(pool.add(tx.clone(), &set, 1, &engine()), Err(MempoolError::AlreadyPresent(tx.hash())));
    }

    #[test]
    fn remove_frees_reserved_inputs() {
        let mut pool = TransactionPool::new();
        let hash = [7u8; 32];
        pool.entries.insert(hash, Transaction::new(TransactionTag::Payment, vec![], vec![], 0));
        pool.order.push(hash);
        assert!(pool.remove(&hash).is_some());
        assert!(!pool.contains(&hash));
    }

    #[test]
    fn double_spend_within_pool_is_rejected() {
        let (set, cb, keypair) = funded_utxo_set();
        let mut pool = TransactionPool::new();
        pool.reserved_inputs.insert((cb.hash(), 0));
        let tx = spend(&cb, &keypair);
        let result = pool.add(tx.clone(), &set, 1, &engine());
        assert_eq!(result, Err(MempoolError::DoubleSpendInPool(tx.hash())));
    }
}
