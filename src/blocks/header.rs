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
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::merkle::merkle_root,
    crypto::Hash,
    enrollment::Enrollment,
    transactions::{Transaction, TxHash},
};

/// A one-bit-per-validator-slot signature inclusion map. Indexed by each validator's position in
/// the canonical active-validator ordering at the block's height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ValidatorBitfield {
    bytes: Vec<u8>,
}

impl ValidatorBitfield {
    pub fn zeroed(validator_count: usize) -> Self {
        Self { bytes: vec![0u8; validator_count.div_ceil(8)] }
    }

    pub fn set(&mut self, index: usize) {
        self.bytes[index / 8] |= 1 << (index % 8);
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.bytes.get(index / 8).map(|b| b & (1 << (index % 8)) != 0).unwrap_or(false)
    }

    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }
}

/// Header fields: previous hash, monotonic height, tx-hash Merkle root, timestamp, validator
/// signature-inclusion bitfield, aggregated Schnorr signature, and enrollments added at this
/// height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub previous_hash: TxHash,
    pub height: u64,
    pub merkle_root: Hash,
    pub timestamp: DateTime<Utc>,
    pub validator_bitfield: ValidatorBitfield,
    pub aggregated_signature: Vec<u8>,
    pub enrollments: Vec<Enrollment>,
}

impl BlockHeader {
    /// The fields a validator signs off on before the bitfield and aggregated signature are
    /// known: `previous_hash`, `height` and `merkle_root`. Timestamp and enrollments are
    /// deliberately excluded so every validator signing the same candidate block produces the
    /// same payload regardless of local clock or enrollment-admission ordering.
    pub fn signing_payload(previous_hash: &TxHash, height: u64, merkle_root: &Hash) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 8 + 32);
        buf.extend_from_slice(previous_hash);
        buf.extend_from_slice(&height.to_le_bytes());
        buf.extend_from_slice(merkle_root);
        buf
    }

    /// This header's own signing payload, for verifying a signature collected against it.
    pub fn signing_bytes(&self) -> Vec<u8> {
        Self::signing_payload(&self.previous_hash, self.height, &self.merkle_root)
    }
}

/// A block: header plus its ordered transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Genesis is the unique block with height 0, no predecessor and no enrollments.
    pub fn genesis(timestamp: DateTime<Utc>, transactions: Vec<Transaction>) -> Self {
        let hashes: Vec<TxHash> = transactions.iter().map(Transaction::hash).collect();
        let header = BlockHeader {
            previous_hash: [0u8; 32],
            height: 0,
            merkle_root: merkle_root(&hashes),
            timestamp,
            validator_bitfield: ValidatorBitfield::zeroed(0),
            aggregated_signature: Vec::new(),
            enrollments: Vec::new(),
        };
        Self::new(header, transactions)
    }

    /// Recompute the Merkle root over this block's transactions, for comparison against
    /// `header.merkle_root` during validation.
    pub fn computed_merkle_root(&self) -> Hash {
        let hashes: Vec<TxHash> = self.transactions.iter().map(Transaction::hash).collect();
        merkle_root(&hashes)
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).expect("Block borsh encoding is infallible")
    }

    /// The canonical 32-byte fingerprint of this block's header, used as the next block's
    /// `previous_hash` link. Covers the full header, so the bitfield and aggregated signature must
    /// be finalized before a block is hashed and appended.
    pub fn hash(&self) -> TxHash {
        let header_bytes = borsh::to_vec(&self.header).expect("BlockHeader borsh encoding is infallible");
        let full = crate::crypto::merkle_hash_leaf(&header_bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&full[..32]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitfield_tracks_individual_slots() {
        let mut bitfield = ValidatorBitfield::zeroed(10);
        bitfield.set(0);
        bitfield.set(9);
        assert!(bitfield.is_set(0));
        assert!(bitfield.is_set(9));
        assert!(!bitfield.is_set(1));
        assert_eq!(bitfield.count_ones(), 2);
    }

    #[test]
    fn genesis_has_height_zero_and_matching_root() {
        let genesis = Block::genesis(Utc::now(), vec![]);
        assert_eq!(genesis.header.height, 0);
        assert_eq!(genesis.header.previous_hash, [0u8; 32]);
        assert_eq!(genesis.header.merkle_root, genesis.computed_merkle_root());
    }
}
