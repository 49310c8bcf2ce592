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

use crate::crypto::{merkle_hash_leaf, merkle_hash_pair, Hash};

/// Binary SHA-512 Merkle root over transaction hashes, lone leaves duplicated at each level.
/// Returns the all-zero hash for an empty input, matching an empty block's uncontroversial (and
/// unverifiable) root.
pub fn merkle_root(tx_hashes: &[[u8; 32]]) -> Hash {
    if tx_hashes.is_empty() {
        return [0u8; 64];
    }
    let mut level: Vec<Hash> = tx_hashes.iter().map(|h| merkle_hash_leaf(h)).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level.chunks(2).map(|pair| merkle_hash_pair(&pair[0], &pair[1])).collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_root() {
        assert_eq!(merkle_root(&[]), [0u8; 64]);
    }

    #[test]
    fn single_leaf_root_matches_leaf_hash() {
        let h = [1u8; 32];
        assert_eq!(merkle_root(&[h]), merkle_hash_leaf(&h));
    }

    #[test]
    fn odd_leaf_count_duplicates_last_leaf() {
        let three = merkle_root(&[[1u8; 32], [2u8; 32], [3u8; 32]]);
        let four = merkle_root(&[[1u8; 32], [2u8; 32], [3u8; 32], [3u8; 32]]);
        assert_eq!(three, four);
    }

    #[test]
    fn root_is_order_sensitive() {
        let a = merkle_root(&[[1u8; 32], [2u8; 32]]);
        let b = merkle_root(&[[2u8; 32], [1u8; 32]]);
        assert_ne!(a, b);
    }
}
