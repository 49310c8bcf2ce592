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

use sha2::{Digest, Sha512};

/// The digest width used for the pre-image chain and the block Merkle tree: a binary SHA-512
/// tree of transaction hashes.
pub const HASH_LENGTH: usize = 64;

/// The data type used to store the results of the hash function.
pub type Hash = [u8; HASH_LENGTH];

fn sha512(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&digest);
    out
}

/// One step of the pre-image hash chain: `h[i] = H(h[i-1])`.
pub fn hash_chain_step(previous: &Hash) -> Hash {
    sha512(&[b"concord-preimage", previous])
}

/// Hash a single Merkle leaf (a transaction hash), domain-separated from inner-node hashing so a
/// leaf can never be mistaken for an inner node by an attacker re-arranging the tree.
pub fn merkle_hash_leaf(tx_hash: &[u8]) -> Hash {
    sha512(&[b"concord-merkle-leaf", tx_hash])
}

/// Hash two Merkle children into their parent.
pub fn merkle_hash_pair(left: &Hash, right: &Hash) -> Hash {
    sha512(&[b"concord-merkle-node", left, right])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_step_is_deterministic() {
        let seed = [7u8; HASH_LENGTH];
        assert_eq!(hash_chain_step(&seed), hash_chain_step(&seed));
    }

    #[test]
    fn chain_round_trip() {
        // c = h[N-1] obtained by iterating hash_chain_step N-1 times from a seed's first hash.
        let seed = [3u8; HASH_LENGTH];
        let h0 = merkle_hash_leaf(&seed); // stand-in "h[0] = H(s)"
        let n = 20usize;
        let mut chain = vec![h0];
        for i in 1..n {
            chain.push(hash_chain_step(&chain[i - 1]));
        }
        let commitment = chain[n - 1];
        // revealed = h[N-1-k]; hash^k(revealed) == commitment
        for k in 0..n {
            let revealed = chain[n - 1 - k];
            let mut acc = revealed;
            for _ in 0..k {
                acc = hash_chain_step(&acc);
            }
            assert_eq!(acc, commitment, "hash^{k} round trip failed");
        }
    }

    #[test]
    fn leaf_and_node_domains_differ() {
        let a = [1u8; HASH_LENGTH];
        let b = [2u8; HASH_LENGTH];
        assert_ne!(merkle_hash_leaf(&a), merkle_hash_pair(&a, &b));
    }
}
