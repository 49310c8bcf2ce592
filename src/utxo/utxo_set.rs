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

use std::collections::HashMap;

use log::debug;

use crate::{
    transactions::{OutputIndex, ScriptEngine, Transaction, TransactionTag, TxHash},
    utxo::error::UtxoError,
};

const LOG_TARGET: &str = "concord::utxo";

pub type UtxoKey = (TxHash, OutputIndex);

/// An unspent output: amount, lock, the height it unlocks at, and its originating tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub amount: u64,
    pub lock: crate::transactions::OutputLock,
    pub unlock_height: u64,
    pub tag: TransactionTag,
}

/// The authoritative map of unspent outputs (component C2).
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<UtxoKey, Utxo>,
    min_stake: u64,
}

impl UtxoSet {
    pub fn new(min_stake: u64) -> Self {
        Self { entries: HashMap::new(), min_stake }
    }

    pub fn peek(&self, key: &UtxoKey) -> Option<&Utxo> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the utxo at `key` only if it exists and is spendable at `at_height` (i.e. not
    /// still within its `unlock_height` lock).
    pub fn find_spendable(&self, key: &UtxoKey, at_height: u64) -> Result<&Utxo, UtxoError> {
        let utxo = self.entries.get(key).ok_or(UtxoError::MissingUtxo(key.0, key.1))?;
        if at_height < utxo.unlock_height {
            return Err(UtxoError::StillLocked(key.0, key.1, utxo.unlock_height));
        }
        Ok(utxo)
    }

    /// Insert a brand-new output created by a transaction that externalised at `height`.
    /// Freeze outputs below `min_stake` are rejected.
    fn insert_output(
        &mut self,
        key: UtxoKey,
        amount: u64,
        lock: crate::transactions::OutputLock,
        tag: TransactionTag,
        height: u64,
    ) -> Result<(), UtxoError> {
        if tag == TransactionTag::Freeze && amount < self.min_stake {
            return Err(UtxoError::BelowMinStake(amount, self.min_stake));
        }
        self.entries.insert(key, Utxo { amount, lock, unlock_height: height, tag });
        Ok(())
    }

    /// Atomically remove every input referenced by `txs` and insert every output, validating
    /// unlock heights, in-block double spends and witness scripts against an unmodified snapshot
    /// first. On any failure the whole batch is rejected and `self` is left untouched.
    pub fn apply(&mut self, txs: &[Transaction], height: u64, engine: &ScriptEngine) -> Result<(), UtxoError> {
        let mut spent_in_block: std::collections::HashSet<UtxoKey> = std::collections::HashSet::new();
        // Dry run against an immutable view first so a failure never mutates `self`.
        for tx in txs {
            if tx.has_internal_double_spend() {
                let (h, i) = (tx.inputs[0].previous_tx_hash, tx.inputs[0].previous_output_index);
                return Err(UtxoError::DoubleSpendInBlock(h, i));
            }
            for input in &tx.inputs {
                let key = (input.previous_tx_hash, input.previous_output_index);
                if !spent_in_block.insert(key) {
                    return Err(UtxoError::DoubleSpendInBlock(key.0, key.1));
                }
                if tx.tag == TransactionTag::Coinbase {
                    continue;
                }
                let utxo = self.find_spendable(&key, height)?;
                engine
                    .evaluate(&utxo.lock, &input.witness, tx)
                    .map_err(|e| UtxoError::ScriptFailed(e.to_string()))?;
            }
        }

        // All checks passed; commit. Validate the min-stake rule on Freeze outputs before any
        // mutation so a late rejection still leaves `self` untouched.
        for tx in txs {
            if tx.tag == TransactionTag::Freeze {
                for output in &tx.outputs {
                    if output.amount < self.min_stake {
                        return Err(UtxoError::BelowMinStake(output.amount, self.min_stake));
                    }
                }
            }
        }

        for tx in txs {
            let hash = tx.hash();
            for input in &tx.inputs {
                if tx.tag == TransactionTag::Coinbase {
                    continue;
                }
                self.entries.remove(&(input.previous_tx_hash, input.previous_output_index));
            }
            for (index, output) in tx.outputs.iter().enumerate() {
                let key = (hash, index as u32);
                self.insert_output(key, output.amount, output.lock.clone(), tx.tag, height)?;
            }
        }
        debug!(target: LOG_TARGET, "applied {} transaction(s) at height {}", txs.len(), height);
        Ok(())
    }

    /// Called by the enrollment manager once a Freeze output is admitted: extends its unlock
    /// height to `enroll_height + 2 * cycle_length`.
    pub fn lock_freeze_for_enrollment(
        &mut self,
        key: &UtxoKey,
        enroll_height: u64,
        cycle_length: u64,
    ) -> Result<(), UtxoError> {
        let utxo = self.entries.get_mut(key).ok_or(UtxoError::MissingUtxo(key.0, key.1))?;
        utxo.unlock_height = enroll_height + cycle_length * 2;
        Ok(())
    }

    /// Deduct a slashing penalty from a validator's frozen stake output, saturating at zero.
    pub fn slash(&mut self, key: &UtxoKey, amount: u64) -> Result<(), UtxoError> {
        let utxo = self.entries.get_mut(key).ok_or(UtxoError::MissingUtxo(key.0, key.1))?;
        utxo.amount = utxo.amount.saturating_sub(amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::{OutputLock, TransactionInput, TransactionOutput, Witness};

    fn engine() -> ScriptEngine {
        ScriptEngine::new(Default::default())
    }

    fn coinbase(amount: u64) -> Transaction {
        Transaction::new(
            TransactionTag::Coinbase,
            vec![],
            vec![TransactionOutput { amount, lock: OutputLock::Key([9u8; 32]) }],
            0,
        )
    }

    #[test]
    fn apply_adds_outputs_and_removes_spent_inputs() {
        let mut set = UtxoSet::new(100);
        let cb = coinbase(500);
        set.apply(&[cb.clone()], 0, &engine()).unwrap();
        let key = (cb.hash(), 0);
        assert!(set.peek(&key).is_some());
    }

    #[test]
    fn apply_rolls_back_entirely_on_missing_input() {
        let mut set = UtxoSet::new(100);
        let cb = coinbase(500);
        set.apply(&[cb.clone()], 0, &engine()).unwrap();

        let bogus_input = TransactionInput {
            previous_tx_hash: [0xffu8; 32],
            previous_output_index: 7,
            witness: Witness::Key { signature: vec![] },
        };
        let bad_tx = Transaction::new(TransactionTag::Payment, vec![bogus_input], vec![], 0);
        let before = set.clone();
        let result = set.apply(&[bad_tx], 1, &engine());
        assert!(result.is_err());
        assert_eq!(set.entries, before.entries, "utxo set must be unchanged after a failed apply");
    }

    #[test]
    fn freeze_output_below_min_stake_is_rejected() {
        let mut set = UtxoSet::new(1_000);
        let tx = Transaction::new(
            TransactionTag::Freeze,
            vec![],
            vec![TransactionOutput { amount: 10, lock: OutputLock::Key([1u8; 32]) }],
            0,
        );
        assert_eq!(set.apply(&[tx], 0, &engine()), Err(UtxoError::BelowMinStake(10, 1_000)));
    }

    #[test]
    fn freeze_lock_extends_to_two_cycles_on_enrollment() {
        let mut set = UtxoSet::new(100);
        let tx = Transaction::new(
            TransactionTag::Freeze,
            vec![],
            vec![TransactionOutput { amount: 1_000, lock: OutputLock::Key([1u8; 32]) }],
            0,
        );
        let key = (tx.hash(), 0);
        set.apply(&[tx], 10, &engine()).unwrap();
        set.lock_freeze_for_enrollment(&key, 10, 20).unwrap();
        assert_eq!(set.peek(&key).unwrap().unlock_height, 50);
        assert!(set.find_spendable(&key, 49).is_err());
        assert!(set.find_spendable(&key, 50).is_ok());
    }
}
