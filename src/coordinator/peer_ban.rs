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

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, Utc};
use log::{debug, warn};

const LOG_TARGET: &str = "concord::coordinator::ban";

/// A peer identified by its staking identity, so bans travel with the validator across network
/// reconnects rather than with an ephemeral transport-level address.
pub type PeerId = crate::quorum::ValidatorId;

/// Tracks misbehaving peers. Mirrors the allow-list-aware ban helper the rest of this codebase
/// uses at the comms layer, adapted so "now" is threaded in explicitly rather than read from the
/// system clock, which keeps it deterministic in tests.
#[derive(Debug, Default)]
pub struct PeerBanManager {
    allow_list: Vec<PeerId>,
    banned_until: HashMap<PeerId, DateTime<Utc>>,
}

impl PeerBanManager {
    pub fn new(allow_list: Vec<PeerId>) -> Self {
        Self { allow_list, banned_until: HashMap::new() }
    }

    pub fn ban_peer_if_required(&mut self, peer: PeerId, reason: &str, ban_duration: Duration, now: DateTime<Utc>) {
        if self.allow_list.contains(&peer) {
            debug!(target: LOG_TARGET, "not banning allow-listed peer {peer:?}: {reason}");
            return;
        }
        let until = now + chrono::Duration::from_std(ban_duration).unwrap_or(chrono::Duration::zero());
        warn!(target: LOG_TARGET, "banning peer {peer:?} until {until}: {reason}");
        self.banned_until.insert(peer, until);
    }

    pub fn is_banned(&self, peer: &PeerId, now: DateTime<Utc>) -> bool {
        self.banned_until.get(peer).is_some_and(|until| *until > now)
    }

    pub fn unban(&mut self, peer: &PeerId) {
        self.banned_until.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> PeerId {
        ([b; 32], 0)
    }

    #[test]
    fn banned_peer_is_reported_banned_until_it_expires() {
        let mut manager = PeerBanManager::new(vec![]);
        let now = Utc::now();
        manager.ban_peer_if_required(id(1), "bad enrollment signature", Duration::from_secs(60), now);
        assert!(manager.is_banned(&id(1), now));
        assert!(!manager.is_banned(&id(1), now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn allow_listed_peers_are_never_banned() {
        let mut manager = PeerBanManager::new(vec![id(2)]);
        let now = Utc::now();
        manager.ban_peer_if_required(id(2), "suspicious envelope", Duration::from_secs(60), now);
        assert!(!manager.is_banned(&id(2), now));
    }

    #[test]
    fn unban_clears_an_existing_ban() {
        let mut manager = PeerBanManager::new(vec![]);
        let now = Utc::now();
        manager.ban_peer_if_required(id(3), "double spend", Duration::from_secs(600), now);
        manager.unban(&id(3));
        assert!(!manager.is_banned(&id(3), now));
    }
}
