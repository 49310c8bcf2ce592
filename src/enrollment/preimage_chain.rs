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

use rand::{rngs::OsRng, RngCore};

use crate::crypto::{hash_chain_step, merkle_hash_leaf, Hash};

/// A validator's pre-image hash chain: `h[0] = H(s)`, `h[i] = H(h[i-1])`, committing to `h[N-1]`.
/// The full table is persisted so a crash never forces reusing a seed — the enrollment manager
/// separately rejects a commitment already bound to another utxo-key.
#[derive(Debug, Clone)]
pub struct PreImageChain {
    seed: [u8; 32],
    table: Vec<Hash>,
}

impl PreImageChain {
    /// Generate a fresh chain of length `cycle_length` from a random seed.
    pub fn generate(cycle_length: u64) -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed, cycle_length)
    }

    /// Build deterministically from an existing seed, e.g. when restoring persisted state.
    pub fn from_seed(seed: [u8; 32], cycle_length: u64) -> Self {
        let n = cycle_length as usize;
        assert!(n > 0, "cycle length must be positive");
        let mut table = Vec::with_capacity(n);
        table.push(merkle_hash_leaf(&seed));
        for i in 1..n {
            table.push(hash_chain_step(&table[i - 1]));
        }
        Self { seed, table }
    }

    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    pub fn cycle_length(&self) -> u64 {
        self.table.len() as u64
    }

    /// `commitment = h[N-1]`, the value an [`Enrollment`](crate::enrollment::Enrollment) commits to.
    pub fn commitment(&self) -> Hash {
        *self.table.last().expect("chain always has at least one entry")
    }

    /// `h[N-1-k]`, the pre-image that must be revealed at age `k` (block `enroll_height + k`).
    pub fn reveal_at_distance(&self, k: u64) -> Option<Hash> {
        let n = self.table.len() as u64;
        if k >= n {
            return None;
        }
        Some(self.table[(n - 1 - k) as usize])
    }

    /// Verify `hash^k(revealed) == commitment`.
    pub fn verify(revealed: &Hash, distance: u64, commitment: &Hash) -> bool {
        let mut current = *revealed;
        for _ in 0..distance {
            current = hash_chain_step(&current);
        }
        &current == commitment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reveal_verifies_against_the_commitment() {
        let chain = PreImageChain::generate(20);
        let commitment = chain.commitment();
        for k in 0..20 {
            let revealed = chain.reveal_at_distance(k).unwrap();
            assert!(PreImageChain::verify(&revealed, k, &commitment), "distance {k} failed to verify");
        }
    }

    #[test]
    fn out_of_range_distance_returns_none() {
        let chain = PreImageChain::generate(5);
        assert!(chain.reveal_at_distance(5).is_none());
    }

    #[test]
    fn wrong_distance_fails_verification() {
        let chain = PreImageChain::generate(20);
        let commitment = chain.commitment();
        let revealed = chain.reveal_at_distance(5).unwrap();
        assert!(!PreImageChain::verify(&revealed, 6, &commitment));
    }

    #[test]
    fn same_seed_reproduces_the_same_chain() {
        let seed = [42u8; 32];
        let a = PreImageChain::from_seed(seed, 10);
        let b = PreImageChain::from_seed(seed, 10);
        assert_eq!(a.commitment(), b.commitment());
    }
}
