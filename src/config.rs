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

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Gossip pacing for transaction relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayTxConfig {
    /// Maximum number of transaction hashes advertised to a peer per interval.
    pub max_num: usize,
    /// How often a relay batch is flushed.
    pub interval: Duration,
    /// Transactions below this fee are never relayed, independent of `min_fee` below.
    pub min_fee: u64,
    /// How long a relayed hash is remembered to suppress re-advertising it to the same peer.
    pub cache_exp: Duration,
}

impl Default for RelayTxConfig {
    fn default() -> Self {
        Self {
            max_num: 500,
            interval: Duration::from_secs(5),
            min_fee: 0,
            cache_exp: Duration::from_secs(60 * 60),
        }
    }
}

/// The recognised configuration surface of the ledger engine. Loading this from YAML/CLI is
/// explicitly out of scope; the struct and its production-grade [`Default`] are not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Target seconds between blocks.
    pub block_interval_sec: u64,
    /// Hard cap on tx-set size offered to a single nomination round (0 = unlimited).
    pub txs_to_nominate: usize,
    /// `N`, the pre-image chain length.
    pub validator_cycle: u64,
    /// Upper bound on a single quorum-set partition's member count.
    pub max_quorum_nodes: usize,
    /// Threshold percentage applied when deriving quorum sets.
    pub quorum_threshold: u32,
    /// How many heights pass between quorum-set re-derivations.
    pub quorum_shuffle_interval: u64,
    /// Amount deducted from a Freeze output when its validator misses a cycle-end reveal.
    pub slash_penalty_amount: u64,
    /// Minimum fee a transaction must pay to be admitted to the pool.
    pub min_fee: u64,
    /// Height interval between validator reward payouts.
    pub payout_period: u64,
    /// Fraction of transaction fees routed to the block's validator set.
    pub validator_tx_fee_cut: f64,
    /// Auto-renew enrollment at cycle end, rather than only on an emergency shortfall.
    pub recurring_enrollment: bool,
    /// Initial delay between retries of a failed peer RPC call.
    pub retry_delay: Duration,
    /// Maximum retry attempts before a peer RPC call is abandoned.
    pub max_retries: usize,
    /// Per-call peer RPC timeout.
    pub timeout: Duration,
    /// Failures tolerated from a peer before [`crate::coordinator::PeerBanManager`] bans it.
    pub max_failed_requests: usize,
    /// How long a ban lasts once triggered.
    pub ban_duration: Duration,
    pub relay_tx: RelayTxConfig,
}

impl Default for LedgerConfig {
    /// Canonical production values.
    fn default() -> Self {
        Self {
            block_interval_sec: 5,
            txs_to_nominate: 100,
            validator_cycle: 1008,
            max_quorum_nodes: 7,
            quorum_threshold: 67,
            quorum_shuffle_interval: 1008,
            slash_penalty_amount: 1_000_000,
            min_fee: 1,
            payout_period: 1008,
            validator_tx_fee_cut: 0.9,
            recurring_enrollment: true,
            retry_delay: Duration::from_millis(250),
            max_retries: 5,
            timeout: Duration::from_secs(10),
            max_failed_requests: 10,
            ban_duration: Duration::from_secs(30 * 60),
            relay_tx: RelayTxConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_canonical_cycle_length() {
        assert_eq!(LedgerConfig::default().validator_cycle, 1008);
    }
}
