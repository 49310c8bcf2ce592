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
    chain_storage::ChainStorageError, consensus::ConsensusError, coordinator::CoordinatorError,
    enrollment::EnrollmentError, mempool::MempoolError, quorum::QuorumError, rpc::RpcError, utxo::UtxoError,
};

/// Aggregates every component error for public API boundaries, mirroring how
/// `CommsInterfaceError` folds together `ChainStorageError`, `MempoolError` and friends.
///
/// Local-recovery variants (`Utxo`, `Mempool`, `Enrollment`, `Consensus`, `Rpc`) are expected to
/// be logged and dropped by callers; `ChainStorage` and `Quorum` carry the append-invariant and
/// own-quorum-sanity failures that are fatal and should abort the node.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Utxo(#[from] UtxoError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    #[error(transparent)]
    ChainStorage(#[from] ChainStorageError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Quorum(#[from] QuorumError),
    #[error(transparent)]
    Consensus(#[from] ConsensusError),
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
