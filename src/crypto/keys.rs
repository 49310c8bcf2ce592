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

use rand::rngs::OsRng;
use tari_crypto::{
    keys::{PublicKey as PublicKeyTrait, SecretKey as SecretKeyTrait},
    ristretto::{RistrettoPublicKey, RistrettoSchnorr, RistrettoSecretKey},
};

/// Define the explicit secret key implementation used throughout the ledger engine. A different
/// signature scheme can be employed by redefining this type, as the rest of the crate only relies
/// on the `PublicKeyTrait`/`SecretKeyTrait` contracts.
pub type PrivateKey = RistrettoSecretKey;
/// Define the explicit public key implementation for the ledger engine.
pub type PublicKey = RistrettoPublicKey;
/// Define the explicit Schnorr signature implementation used to bind enrollments, envelopes and
/// aggregated block signatures to validator keys.
pub type Signature = RistrettoSchnorr;

/// A convenience (secret, public) keypair, e.g. for a validator's staking identity.
#[derive(Clone)]
pub struct KeyPair {
    pub secret: PrivateKey,
    pub public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let (secret, public) = PublicKey::random_keypair(&mut OsRng);
        Self { secret, public }
    }
}

/// Schnorr-sign `message` with `secret_key`, generating a fresh random nonce.
///
/// The nonce is drawn internally rather than threaded through by the caller, since the ledger
/// engine never needs to commit to a nonce ahead of signing.
pub fn sign(secret_key: &PrivateKey, message: &[u8]) -> Result<Signature, String> {
    let nonce = PrivateKey::random(&mut OsRng);
    Signature::sign_raw_uniform(secret_key, nonce, message).map_err(|e| e.to_string())
}

/// Verify a Schnorr signature against `public_key` over `message`.
pub fn verify(public_key: &PublicKey, signature: &Signature, message: &[u8]) -> bool {
    signature.verify(public_key, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let pair = KeyPair::generate();
        let msg = b"enroll:utxo-key-bytes";
        let sig = sign(&pair.secret, msg).unwrap();
        assert!(verify(&pair.public, &sig, msg));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let pair = KeyPair::generate();
        let sig = sign(&pair.secret, b"original").unwrap();
        assert!(!verify(&pair.public, &sig, b"tampered"));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();
        let sig = sign(&pair.secret, b"msg").unwrap();
        assert!(!verify(&other.public, &sig, b"msg"));
    }
}
