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

use thiserror::Error;

use crate::utxo::UtxoKey;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("enrollment signature does not verify against the staker's key")]
    InvalidSignature,
    #[error("utxo {0:?} is not a freeze output")]
    NotFreezeOutput(UtxoKey),
    #[error("staker utxo {0:?} is already active")]
    AlreadyActive(UtxoKey),
    #[error("cycle length {0} does not match the protocol value {1}")]
    CycleLengthMismatch(u64, u64),
    #[error("utxo {0:?} referenced by enrollment does not exist")]
    UnknownUtxo(UtxoKey),
    #[error("no enrollment on file for validator {0:?}")]
    NotEnrolled(UtxoKey),
    #[error("revealed pre-image does not hash to the recorded commitment after the claimed distance")]
    PreImageMismatch,
    #[error("commitment is already bound to another staker utxo")]
    DuplicateCommitment,
}
