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

use crate::{
    chain_storage::ChainStorageError, enrollment::EnrollmentError, mempool::MempoolError, utxo::UtxoError,
    utxo::UtxoKey,
};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    ChainStorage(#[from] ChainStorageError),
    #[error(transparent)]
    Utxo(#[from] UtxoError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("{0:?} is not an active validator at this height")]
    NotAnActiveValidator(UtxoKey),
    #[error("block signature from {0:?} does not verify against its staked key")]
    InvalidBlockSignature(UtxoKey),
    #[error("block signature submitted for a candidate that no longer matches height {0}")]
    StaleBlockSignature(u64),
    #[error("collected signature count {0} does not match the bitfield's {1} set bits")]
    SignatureCountMismatch(u32, u32),
    #[error("block header's aggregated signature at height {0} does not decode")]
    CorruptAggregatedSignature(u64),
}
