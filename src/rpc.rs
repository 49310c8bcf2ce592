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

//! The peer RPC surface. Transport (HTTP, a comms stack, an in-process registry for tests) is
//! out of scope; this is the method contract every transport must implement.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    blocks::Block,
    consensus::Envelope,
    crypto::Hash,
    enrollment::Enrollment,
    transactions::{Transaction, TxHash},
    utxo::UtxoKey,
};

/// Response to `get_public_key`: the peer's staking identity plus proof of possession. Keys
/// travel as raw bytes (`tari_utilities::ByteArray::as_bytes`/`from_bytes`), the same convention
/// used for envelopes and locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub public_key: Vec<u8>,
    pub proof: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Incomplete,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub state: NodeState,
    pub peers: Vec<Vec<u8>>,
}

/// Every peer RPC call either returns or throws; local-recovery failures (timeout, unreachable
/// peer) are represented here rather than panicking.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("peer request timed out")]
    Timeout,
    #[error("peer unreachable")]
    PeerUnreachable,
    #[error("peer returned a malformed response")]
    MalformedResponse,
}

/// The peer RPC surface a transport implements. `get_blocks_from`'s `max` is capped at 1000 by
/// the callee, mirroring [`crate::chain_storage::MAX_RANGE_LEN`].
#[async_trait]
pub trait PeerRpc: Send + Sync {
    async fn get_public_key(&self) -> Result<Identity, RpcError>;
    async fn get_node_info(&self) -> Result<NodeInfo, RpcError>;
    async fn put_transaction(&self, tx: Transaction) -> Result<(), RpcError>;
    async fn receive_envelope(&self, envelope: Envelope) -> Result<(), RpcError>;
    async fn send_enrollment(&self, enrollment: Enrollment) -> Result<(), RpcError>;
    async fn send_preimage(&self, utxo_key: UtxoKey, preimage: Hash) -> Result<(), RpcError>;
    async fn get_block_height(&self) -> Result<u64, RpcError>;
    async fn get_blocks_from(&self, height: u64, max: usize) -> Result<Vec<Block>, RpcError>;
    async fn get_preimage(&self, utxo_key: UtxoKey) -> Result<Hash, RpcError>;
    async fn get_enrollment(&self, utxo_key: UtxoKey) -> Result<Option<Enrollment>, RpcError>;
    async fn has_transaction_hash(&self, hash: TxHash) -> Result<bool, RpcError>;
}
