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

use std::collections::HashMap;

use crate::{crypto::Hash, utxo::UtxoKey};

/// Per-validator lifecycle state: `Candidate → Enrolled(h0) → Active(h0..h0+N)`; each block either
/// `Revealing(k)` advances or `MissedReveal → Slashed → Ejected`. Terminal: `CycleEnded → Ejected`
/// unless re-enrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorState {
    Candidate,
    Enrolled,
    Active,
    Revealing(u64),
    MissedReveal,
    Slashed,
    CycleEnded,
    Ejected,
}

/// Events driving [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorEvent {
    Admit,
    Reveal(u64),
    MissReveal,
    Slash,
    CycleEnd,
    ReEnroll,
    Eject,
}

/// Pure state transition function, mirroring the ledger's event-driven transition pattern: given
/// the current state and an event, return the next state. Unhandled `(state, event)` pairs are
/// self-loops — the state is simply unaffected by an event that doesn't apply to it.
pub fn transition(state: ValidatorState, event: ValidatorEvent) -> ValidatorState {
    use ValidatorEvent::*;
    use ValidatorState::*;
    match (state, event) {
        (Candidate, Admit) => Enrolled,
        (Enrolled, Reveal(k)) => Revealing(k),
        (Enrolled, MissReveal) => MissedReveal,
        (Revealing(_), Reveal(k)) => Revealing(k),
        (Revealing(_), MissReveal) => MissedReveal,
        (Revealing(_), CycleEnd) => CycleEnded,
        (MissedReveal, Slash) => Slashed,
        (MissedReveal, Reveal(k)) => Revealing(k),
        (Slashed, Eject) => Ejected,
        (CycleEnded, ReEnroll) => Enrolled,
        (CycleEnded, Eject) => Ejected,
        (other, _) => other,
    }
}

/// Tracked state for one enrolled validator: enrolled height, latest revealed pre-image and its
/// distance, and the lifecycle state those reveals drive.
#[derive(Debug, Clone)]
pub struct ValidatorEntry {
    pub enrolled_height: u64,
    pub cycle_length: u64,
    pub commitment: Hash,
    pub latest_revealed_preimage: Option<Hash>,
    pub latest_revealed_distance: Option<u64>,
    pub state: ValidatorState,
}

impl ValidatorEntry {
    pub fn new(enrolled_height: u64, cycle_length: u64, commitment: Hash) -> Self {
        Self {
            enrolled_height,
            cycle_length,
            commitment,
            latest_revealed_preimage: None,
            latest_revealed_distance: None,
            state: ValidatorState::Enrolled,
        }
    }

    /// Active at height `h` iff `enrolled_height < h <= enrolled_height + N` and the validator has
    /// revealed a pre-image at distance `>= h - enrolled_height - 1`.
    pub fn is_active_at(&self, height: u64) -> bool {
        if !(height > self.enrolled_height && height <= self.enrolled_height + self.cycle_length) {
            return false;
        }
        let required_distance = height - self.enrolled_height - 1;
        self.latest_revealed_distance.map(|d| d >= required_distance).unwrap_or(false)
    }

    pub fn cycle_ends_at(&self) -> u64 {
        self.enrolled_height + self.cycle_length
    }
}

/// A mapping from enrolled UTXO-key to validator entry.
#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    entries: HashMap<UtxoKey, ValidatorEntry>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &UtxoKey) -> Option<&ValidatorEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: UtxoKey, entry: ValidatorEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &UtxoKey) -> Option<ValidatorEntry> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &UtxoKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether any entry, under any utxo-key, already commits to `commitment`.
    pub fn contains_commitment(&self, commitment: &Hash) -> bool {
        self.entries.values().any(|e| &e.commitment == commitment)
    }

    /// Total enrolled validators, regardless of current reveal-derived activity.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All validator keys active at `height`, in ascending utxo-key order for deterministic quorum
    /// derivation downstream.
    pub fn active_validators(&self, height: u64) -> Vec<UtxoKey> {
        let mut active: Vec<UtxoKey> =
            self.entries.iter().filter(|(_, e)| e.is_active_at(height)).map(|(k, _)| *k).collect();
        active.sort();
        active
    }

    /// Record a reveal and advance the entry's state machine.
    pub fn record_reveal(&mut self, key: &UtxoKey, preimage: Hash, distance: u64) -> Option<()> {
        let entry = self.entries.get_mut(key)?;
        entry.latest_revealed_preimage = Some(preimage);
        entry.latest_revealed_distance = Some(distance);
        entry.state = transition(entry.state, ValidatorEvent::Reveal(distance));
        Some(())
    }

    pub fn apply_event(&mut self, key: &UtxoKey, event: ValidatorEvent) -> Option<()> {
        let entry = self.entries.get_mut(key)?;
        entry.state = transition(entry.state, event);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_active_within_its_cycle_window_with_a_fresh_reveal() {
        let mut entry = ValidatorEntry::new(10, 20, [0u8; 64]);
        entry.latest_revealed_distance = Some(0);
        assert!(entry.is_active_at(11));
        entry.latest_revealed_distance = Some(4);
        assert!(entry.is_active_at(15));
        assert!(!entry.is_active_at(15 + 1) || entry.latest_revealed_distance.unwrap() < 15);
    }

    #[test]
    fn entry_inactive_before_enrollment_or_past_cycle_end() {
        let entry = ValidatorEntry::new(10, 20, [0u8; 64]);
        assert!(!entry.is_active_at(10));
        assert!(!entry.is_active_at(31));
    }

    #[test]
    fn entry_inactive_without_a_sufficiently_recent_reveal() {
        let mut entry = ValidatorEntry::new(10, 20, [0u8; 64]);
        entry.latest_revealed_distance = Some(0);
        // at height 20, required distance is 20 - 10 - 1 = 9, but only 0 was revealed.
        assert!(!entry.is_active_at(20));
    }

    #[test]
    fn missed_reveal_then_slash_then_eject_follows_the_terminal_chain() {
        let mut state = ValidatorState::Enrolled;
        state = transition(state, ValidatorEvent::MissReveal);
        assert_eq!(state, ValidatorState::MissedReveal);
        state = transition(state, ValidatorEvent::Slash);
        assert_eq!(state, ValidatorState::Slashed);
        state = transition(state, ValidatorEvent::Eject);
        assert_eq!(state, ValidatorState::Ejected);
    }

    #[test]
    fn active_validators_are_returned_in_ascending_key_order() {
        let mut set = ValidatorSet::new();
        for (i, key_byte) in [3u8, 1u8, 2u8].into_iter().enumerate() {
            let mut entry = ValidatorEntry::new(0, 20, [0u8; 64]);
            entry.latest_revealed_distance = Some(0);
            set.insert(([key_byte; 32], i as u32), entry);
        }
        let active = set.active_validators(1);
        assert_eq!(active.len(), 3);
        assert!(active.windows(2).all(|w| w[0] < w[1]));
    }
}
