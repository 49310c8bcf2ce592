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

//! The script engine interface consumed by the UTXO validator. The engine itself is a pure
//! function of `(lock, unlock, tx)` — out of scope beyond this contract.

use thiserror::Error;

use crate::{
    crypto,
    transactions::{
        lock::{OutputLock, Witness},
        transaction::Transaction,
    },
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("witness tag does not match lock tag")]
    TagMismatch,
    #[error("signature did not verify against the locked key")]
    BadSignature,
    #[error("key hash did not match the locked hash")]
    KeyHashMismatch,
    #[error("redeem script hash did not match the locked hash")]
    RedeemHashMismatch,
    #[error("script execution exceeded its stack budget")]
    StackBudgetExceeded,
    #[error("unsupported or malformed script payload")]
    Malformed,
}

/// Resource limits applied while evaluating a `Script` or `Redeem` lock.
#[derive(Debug, Clone, Copy)]
pub struct StackBudget {
    pub max_total_stack: usize,
    pub max_item_size: usize,
}

impl Default for StackBudget {
    fn default() -> Self {
        Self { max_total_stack: 128, max_item_size: 4096 }
    }
}

/// A pure function of its inputs: given `(lock, unlock, tx)` it returns `Ok` or a reason string.
/// Implemented here for the four lock kinds; `Script`/`Redeem` payloads are evaluated against
/// [`StackBudget`] but the opcode set itself is out of scope — only the interface contract
/// (budget enforcement, tag/hash checks) lives here.
pub struct ScriptEngine {
    budget: StackBudget,
}

impl ScriptEngine {
    pub fn new(budget: StackBudget) -> Self {
        Self { budget }
    }

    /// Evaluate `witness` against `lock` in the context of `tx` (used for signature messages
    /// that must bind to the spending transaction). Returns `Ok(())` or a [`ScriptError`] naming
    /// the reason.
    pub fn evaluate(
        &self,
        lock: &OutputLock,
        witness: &Witness,
        tx: &Transaction,
    ) -> Result<(), ScriptError> {
        if !witness.matches_lock(lock) {
            return Err(ScriptError::TagMismatch);
        }
        let message = tx.signing_hash();
        match (lock, witness) {
            (OutputLock::Key(key_bytes), Witness::Key { signature }) => {
                self.verify_signature_bytes(key_bytes, signature, &message)
            },
            (OutputLock::KeyHash(locked_hash), Witness::KeyHash { public_key, signature }) => {
                let hash = crypto::merkle_hash_leaf(public_key);
                if &hash[..] != &locked_hash[..] {
                    return Err(ScriptError::KeyHashMismatch);
                }
                self.verify_signature_bytes(public_key, signature, &message)
            },
            (OutputLock::Script(script), Witness::Script { stack }) => self.check_budget(script, stack),
            (OutputLock::Redeem(locked_hash), Witness::Redeem { redeem_script, stack }) => {
                let hash = crypto::merkle_hash_leaf(redeem_script);
                if &hash[..] != &locked_hash[..] {
                    return Err(ScriptError::RedeemHashMismatch);
                }
                self.check_budget(redeem_script, stack)
            },
            _ => Err(ScriptError::TagMismatch),
        }
    }

    fn verify_signature_bytes(&self, public_key_bytes: &[u8], signature: &[u8], message: &[u8]) -> Result<(), ScriptError> {
        use tari_utilities::ByteArray;
        let public_key = crypto::PublicKey::from_bytes(public_key_bytes).map_err(|_| ScriptError::Malformed)?;
        let signature = borsh::from_slice::<crypto::Signature>(signature).map_err(|_| ScriptError::Malformed)?;
        if crypto::verify(&public_key, &signature, message) {
            Ok(())
        } else {
            Err(ScriptError::BadSignature)
        }
    }

    fn check_budget(&self, script: &[u8], stack: &[u8]) -> Result<(), ScriptError> {
        if script.len() > self.budget.max_item_size || stack.len() > self.budget.max_item_size {
            return Err(ScriptError::StackBudgetExceeded);
        }
        if script.len() + stack.len() > self.budget.max_total_stack * self.budget.max_item_size {
            return Err(ScriptError::StackBudgetExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::transaction::{TransactionOutput, TransactionTag};

    #[test]
    fn tag_mismatch_is_rejected_before_evaluation() {
        let engine = ScriptEngine::new(StackBudget::default());
        let lock = OutputLock::Key([0u8; 32]);
        let witness = Witness::Script { stack: vec![] };
        let tx = Transaction::new(TransactionTag::Payment, vec![], vec![], 0);
        assert_eq!(engine.evaluate(&lock, &witness, &tx), Err(ScriptError::TagMismatch));
    }

    #[test]
    fn key_signature_round_trips() {
        let engine = ScriptEngine::new(StackBudget::default());
        let keypair = crypto::KeyPair::generate();
        let outputs = vec![TransactionOutput { amount: 5, lock: OutputLock::key(&keypair.public) }];
        let tx = Transaction::new(TransactionTag::Payment, vec![], outputs, 0);
        let message = tx.signing_hash();
        let signature = crypto::sign(&keypair.secret, &message).unwrap();
        let witness = Witness::Key { signature: borsh::to_vec(&signature).unwrap() };
        let lock = OutputLock::key(&keypair.public);
        assert!(engine.evaluate(&lock, &witness, &tx).is_ok());
    }

    #[test]
    fn oversized_script_exceeds_budget() {
        let engine = ScriptEngine::new(StackBudget { max_total_stack: 1, max_item_size: 4 });
        let lock = OutputLock::Script(vec![0u8; 5]);
        let witness = Witness::Script { stack: vec![] };
        let tx = Transaction::new(TransactionTag::Payment, vec![], vec![], 0);
        assert_eq!(engine.evaluate(&lock, &witness, &tx), Err(ScriptError::StackBudgetExceeded));
    }
}
