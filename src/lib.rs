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

//! The Concord Ledger Engine: a federated byzantine-agreement blockchain node's CORE —
//! a Stellar-style nomination/ballot consensus driver, a stake-based validator enrollment
//! manager with pre-image reveal chains, a quorum-set constructor, and UTXO-based ledger state.

pub mod blocks;
pub mod chain_storage;
pub mod consensus;
pub mod coordinator;
pub mod crypto;
pub mod enrollment;
pub mod mempool;
pub mod quorum;
pub mod transactions;
pub mod utxo;

mod backoff;
mod config;
mod error;
mod rpc;
mod shutdown;

pub use backoff::BackOff;
pub use config::{LedgerConfig, RelayTxConfig};
pub use error::LedgerError;
pub use rpc::{Identity, NodeInfo, NodeState, PeerRpc, RpcError};
pub use shutdown::{Shutdown, ShutdownSignal};
