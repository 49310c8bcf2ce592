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

use crate::crypto::PublicKey;

/// A tagged union describing how an output may be spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum OutputLock {
    /// Spendable by a single known public key.
    Key([u8; 32]),
    /// Spendable by revealing a public key whose hash matches, plus a signature from it.
    KeyHash([u8; 64]),
    /// Spendable by satisfying an embedded script via the [`crate::transactions::ScriptEngine`].
    Script(Vec<u8>),
    /// Spendable by revealing a redeem script whose hash matches, plus a satisfying witness.
    Redeem([u8; 64]),
}

impl OutputLock {
    pub fn key(public_key: &PublicKey) -> Self {
        let mut bytes = [0u8; 32];
        let encoded = public_key.as_bytes();
        bytes.copy_from_slice(&encoded[..32.min(encoded.len())]);
        OutputLock::Key(bytes)
    }

    /// The lock tag, used to match a witness to its lock kind without inspecting the payload.
    pub fn tag(&self) -> &'static str {
        match self {
            OutputLock::Key(_) => "Key",
            OutputLock::KeyHash(_) => "KeyHash",
            OutputLock::Script(_) => "Script",
            OutputLock::Redeem(_) => "Redeem",
        }
    }
}

/// The witness data supplied by a spender. Must match the tag of the lock it unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Witness {
    Key { signature: Vec<u8> },
    KeyHash { public_key: [u8; 32], signature: Vec<u8> },
    Script { stack: Vec<u8> },
    Redeem { redeem_script: Vec<u8>, stack: Vec<u8> },
}

impl Witness {
    pub fn tag(&self) -> &'static str {
        match self {
            Witness::Key { .. } => "Key",
            Witness::KeyHash { .. } => "KeyHash",
            Witness::Script { .. } => "Script",
            Witness::Redeem { .. } => "Redeem",
        }
    }

    /// True when this witness's tag matches the lock it is being used to spend.
    pub fn matches_lock(&self, lock: &OutputLock) -> bool {
        self.tag() == lock.tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn witness_tag_must_match_lock_tag() {
        let lock = OutputLock::Key([0u8; 32]);
        let good = Witness::Key { signature: vec![1, 2, 3] };
        let bad = Witness::Script { stack: vec![] };
        assert!(good.matches_lock(&lock));
        assert!(!bad.matches_lock(&lock));
    }
}
