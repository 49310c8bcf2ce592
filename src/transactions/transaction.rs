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

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{merkle_hash_leaf, Hash},
    transactions::lock::{OutputLock, Witness},
};

/// 32-byte canonical transaction fingerprint. Kept distinct from [`crate::crypto::Hash`] (64
/// bytes), which backs the pre-image chain and Merkle tree.
pub type TxHash = [u8; 32];
pub type OutputIndex = u32;

/// The tag on a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TransactionTag {
    Payment,
    Freeze,
    Coinbase,
}

/// A reference to a previous output, plus the witness data that unlocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionInput {
    pub previous_tx_hash: TxHash,
    pub previous_output_index: OutputIndex,
    pub witness: Witness,
}

/// A newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TransactionOutput {
    pub amount: u64,
    pub lock: OutputLock,
}

/// A tagged record of input references and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub tag: TransactionTag,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Fee paid in addition to outputs, subtracted implicitly from the sum of inputs.
    pub fee: u64,
}

impl Transaction {
    pub fn new(tag: TransactionTag, inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>, fee: u64) -> Self {
        Self { tag, inputs, outputs, fee }
    }

    /// Canonical binary form used for hashing: length-prefixed fields, little-endian integers,
    /// identical on every node. Borsh encoding already satisfies this.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("Transaction borsh encoding is infallible")
    }

    /// The canonical 32-byte fingerprint of this transaction, including witness data. Used as the
    /// pool/storage identity key.
    pub fn hash(&self) -> TxHash {
        let full = merkle_hash_leaf(&self.canonical_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&full[..32]);
        out
    }

    /// The message a witness signs over: every field except the witnesses themselves, so that
    /// attaching a signature to an input never changes the value that signature was made over.
    pub fn signing_hash(&self) -> TxHash {
        let unwitnessed: Vec<_> = self
            .inputs
            .iter()
            .map(|i| (i.previous_tx_hash, i.previous_output_index))
            .collect();
        let payload = (self.tag, unwitnessed, self.outputs.clone(), self.fee);
        let bytes = borsh::to_vec(&payload).expect("signing payload borsh encoding is infallible");
        let full = merkle_hash_leaf(&bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&full[..32]);
        out
    }

    /// True if any input is referenced more than once within this single transaction.
    pub fn has_internal_double_spend(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        for input in &self.inputs {
            if !seen.insert((input.previous_tx_hash, input.previous_output_index)) {
                return true;
            }
        }
        false
    }

    pub fn output_sum(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}
