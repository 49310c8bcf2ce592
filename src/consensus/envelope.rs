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
use tari_utilities::ByteArray;

use crate::{
    consensus::error::ConsensusError,
    crypto::{self, merkle_hash_leaf},
    transactions::{Transaction, TxHash},
};

/// The wire envelope carried between nodes. `statement` is the opaque, library-defined FBA
/// statement (nomination or ballot message) this driver never inspects beyond routing it to the
/// consensus library; the ledger only needs to move it, sign it and verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Envelope {
    pub slot: u64,
    pub sender: Vec<u8>,
    pub statement: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Envelope {
    fn signing_payload(slot: u64, sender: &[u8], statement: &[u8]) -> Vec<u8> {
        borsh::to_vec(&(slot, sender, statement)).expect("envelope signing payload borsh encoding is infallible")
    }

    pub fn signing_bytes(&self) -> Vec<u8> {
        Self::signing_payload(self.slot, &self.sender, &self.statement)
    }

    pub fn new_signed(slot: u64, sender: &crypto::PublicKey, statement: Vec<u8>, secret: &crypto::PrivateKey) -> Result<Self, ConsensusError> {
        let sender_bytes = sender.as_bytes().to_vec();
        let payload = Self::signing_payload(slot, &sender_bytes, &statement);
        let signature = crypto::sign(secret, &payload).map_err(|_| ConsensusError::InvalidSignature)?;
        let signature = borsh::to_vec(&signature).expect("signature borsh encoding is infallible");
        Ok(Self { slot, sender: sender_bytes, statement, signature })
    }

    pub fn verify(&self) -> Result<(), ConsensusError> {
        let sender = crypto::PublicKey::from_bytes(&self.sender).map_err(|_| ConsensusError::MalformedEnvelope)?;
        let signature = borsh::from_slice::<crypto::Signature>(&self.signature).map_err(|_| ConsensusError::MalformedEnvelope)?;
        if crypto::verify(&sender, &signature, &self.signing_bytes()) {
            Ok(())
        } else {
            Err(ConsensusError::InvalidSignature)
        }
    }
}

/// A candidate nomination value: the set of transactions one node proposes for a slot. Candidates
/// are ordered by fingerprint alone during `combine_candidates`, after invalid ones are discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CandidateValue {
    pub transactions: Vec<Transaction>,
}

impl CandidateValue {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn encode(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("candidate value borsh encoding is infallible")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ConsensusError> {
        borsh::from_slice(bytes).map_err(|_| ConsensusError::MalformedValue)
    }

    /// A 32-byte fingerprint over the transaction id set, used to pick a deterministic winner
    /// among equally-sized candidates during combination.
    pub fn fingerprint(&self) -> TxHash {
        let hashes: Vec<TxHash> = self.transactions.iter().map(Transaction::hash).collect();
        let encoded = borsh::to_vec(&hashes).expect("tx hash list borsh encoding is infallible");
        let full = merkle_hash_leaf(&encoded);
        let mut out = [0u8; 32];
        out.copy_from_slice(&full[..32]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_envelope_verifies_and_tamper_fails() {
        let pair = crypto::KeyPair::generate();
        let mut envelope = Envelope::new_signed(1, &pair.public, vec![1, 2, 3], &pair.secret).unwrap();
        assert!(envelope.verify().is_ok());
        envelope.statement = vec![9, 9, 9];
        assert!(envelope.verify().is_err());
    }

    #[test]
    fn identical_candidate_values_share_a_fingerprint() {
        let a = CandidateValue::new(vec![]);
        let b = CandidateValue::new(vec![]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
