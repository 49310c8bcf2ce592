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

use crate::{crypto::Hash, utxo::UtxoKey};

/// A validator's bid to join the active set, bound to the Freeze UTXO staking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Enrollment {
    pub utxo_key: UtxoKey,
    /// Final pre-image of the hash chain, `h[N-1]`.
    pub commitment: Hash,
    pub cycle_length: u64,
    /// Binds the enrollment to the staker's key and a one-time nonce.
    pub signature: Vec<u8>,
}

impl Enrollment {
    pub fn new(utxo_key: UtxoKey, commitment: Hash, cycle_length: u64, signature: Vec<u8>) -> Self {
        Self { utxo_key, commitment, cycle_length, signature }
    }

    /// The bytes an enrollment's signature is made over: everything except the signature itself.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let payload = (self.utxo_key, self.commitment, self.cycle_length);
        borsh::to_vec(&payload).expect("enrollment signing payload borsh encoding is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_bytes_excludes_signature() {
        let a = Enrollment::new(([1u8; 32], 0), [2u8; 64], 20, vec![1, 2, 3]);
        let b = Enrollment::new(([1u8; 32], 0), [2u8; 64], 20, vec![9, 9]);
        assert_eq!(a.signing_bytes(), b.signing_bytes());
    }
}
