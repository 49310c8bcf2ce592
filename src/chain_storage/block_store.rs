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

use log::debug;

use crate::{blocks::Block, chain_storage::error::ChainStorageError};

/// The hard per-call cap on `range`'s `max` argument.
pub const MAX_RANGE_LEN: usize = 1000;

const LOG_TARGET: &str = "concord::chain_storage";

/// An append-only sequence of blocks indexed by height. Genesis is supplied as an explicit
/// constructor argument rather than installed via a process-wide global, so tests can
/// parameterise it directly.
pub struct BlockStore {
    blocks: Vec<Block>,
}

impl BlockStore {
    pub fn new(genesis: Block) -> Self {
        assert_eq!(genesis.header.height, 0, "genesis must be the height-0 block");
        Self { blocks: vec![genesis] }
    }

    pub fn tip_height(&self) -> u64 {
        self.blocks.last().expect("store always holds at least genesis").header.height
    }

    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("store always holds at least genesis")
    }

    pub fn get(&self, height: u64) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    /// Up to `limit` blocks starting at `from`, capped at [`MAX_RANGE_LEN`].
    pub fn range(&self, from: u64, limit: usize) -> Result<&[Block], ChainStorageError> {
        if limit > MAX_RANGE_LEN {
            return Err(ChainStorageError::RangeTooLarge(limit, MAX_RANGE_LEN));
        }
        let start = from as usize;
        if start > self.blocks.len() {
            return Ok(&[]);
        }
        let end = (start + limit).min(self.blocks.len());
        Ok(&self.blocks[start..end])
    }

    /// Append `block` after validating that it chains directly from the current tip and that its
    /// declared Merkle root matches its own transaction list. The caller is responsible for any
    /// further header/body validation (signature, enrollments) before calling this.
    pub fn append(&mut self, block: Block) -> Result<(), ChainStorageError> {
        let tip = self.tip();
        if block.header.height != tip.header.height + 1 {
            return Err(ChainStorageError::NonSequentialHeight(block.header.height, tip.header.height));
        }
        if block.header.previous_hash != tip.hash() {
            return Err(ChainStorageError::PreviousHashMismatch);
        }
        if block.header.merkle_root != block.computed_merkle_root() {
            return Err(ChainStorageError::MerkleRootMismatch);
        }
        debug!(target: LOG_TARGET, "appended block at height {}", block.header.height);
        self.blocks.push(block);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockHeader;
    use chrono::Utc;

    fn child_of(parent: &Block) -> Block {
        let header = BlockHeader {
            previous_hash: parent.hash(),
            height: parent.header.height + 1,
            merkle_root: crate::blocks::merkle_root(&[]),
            timestamp: Utc::now(),
            validator_bitfield: crate::blocks::ValidatorBitfield::zeroed(0),
            aggregated_signature: Vec::new(),
            enrollments: Vec::new(),
        };
        Block::new(header, vec![])
    }

    #[test]
    fn append_rejects_nonsequential_height() {
        let genesis = Block::genesis(Utc::now(), vec![]);
        let mut store = BlockStore::new(genesis.clone());
        let mut bad = child_of(&genesis);
        bad.header.height = 5;
        assert_eq!(store.append(bad), Err(ChainStorageError::NonSequentialHeight(5, 0)));
    }

    #[test]
    fn range_is_capped() {
        let genesis = Block::genesis(Utc::now(), vec![]);
        let store = BlockStore::new(genesis);
        assert_eq!(store.range(0, MAX_RANGE_LEN + 1), Err(ChainStorageError::RangeTooLarge(MAX_RANGE_LEN + 1, MAX_RANGE_LEN)));
    }

    #[test]
    fn valid_child_appends_and_becomes_tip() {
        let genesis = Block::genesis(Utc::now(), vec![]);
        let mut store = BlockStore::new(genesis.clone());
        let child = child_of(&genesis);
        store.append(child).unwrap();
        assert_eq!(store.tip_height(), 1);
    }
}
