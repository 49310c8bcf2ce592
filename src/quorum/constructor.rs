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

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::quorum::{
    error::QuorumError,
    quorum_set::{QuorumSet, ValidatorId},
};

fn ceil_pct(count: usize, pct: u32) -> u32 {
    (((count as u64) * (pct as u64) + 99) / 100) as u32
}

fn group_quorum(group: &[ValidatorId], threshold_pct: u32) -> QuorumSet {
    let threshold = ceil_pct(group.len(), threshold_pct).max(1);
    QuorumSet::new(threshold, group.to_vec(), vec![])
}

/// Derive every active validator's quorum set for a given height. Deterministic for a given
/// `(seed, active, max_quorum_nodes, threshold_pct)`.
///
/// Validators are shuffled with a seed-keyed stream, partitioned into groups of at most
/// `max_quorum_nodes`. A single group's quorum is shared by every member. With more than one
/// group, each validator's own group becomes its direct validator list and every other group is
/// nested as an inner quorum set, with the top-level threshold recomputed over the resulting
/// entry count.
pub fn construct_quorum_sets(
    active: &[ValidatorId],
    seed: [u8; 32],
    max_quorum_nodes: usize,
    threshold_pct: u32,
    strict_sanity: bool,
) -> Result<HashMap<ValidatorId, QuorumSet>, QuorumError> {
    let mut shuffled = active.to_vec();
    let mut rng = StdRng::from_seed(seed);
    shuffled.shuffle(&mut rng);

    let groups: Vec<Vec<ValidatorId>> =
        shuffled.chunks(max_quorum_nodes.max(1)).map(|c| c.to_vec()).collect();

    let mut result = HashMap::with_capacity(active.len());

    if groups.len() <= 1 {
        let quorum = groups.first().map(|g| group_quorum(g, threshold_pct)).unwrap_or_else(|| QuorumSet::new(1, vec![], vec![]));
        for validator in active {
            let normalised = quorum.clone().normalise(None);
            normalised.sanity_check(strict_sanity)?;
            result.insert(*validator, normalised);
        }
        return Ok(result);
    }

    for (idx, own_group) in groups.iter().enumerate() {
        let other_inner: Vec<QuorumSet> =
            groups.iter().enumerate().filter(|(j, _)| *j != idx).map(|(_, g)| group_quorum(g, threshold_pct)).collect();
        let entries = own_group.len() + other_inner.len();
        let top_threshold = ceil_pct(entries, threshold_pct).max(1);
        let personal = QuorumSet::new(top_threshold, own_group.clone(), other_inner);
        let normalised = personal.normalise(None);
        normalised.sanity_check(strict_sanity)?;
        for validator in own_group {
            result.insert(*validator, normalised.clone());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> ValidatorId {
        ([b; 32], 0)
    }

    #[test]
    fn same_seed_and_set_produce_identical_quorums() {
        let active: Vec<ValidatorId> = (0..6).map(id).collect();
        let a = construct_quorum_sets(&active, [9u8; 32], 4, 67, false).unwrap();
        let b = construct_quorum_sets(&active, [9u8; 32], 4, 67, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_can_produce_different_quorums() {
        let active: Vec<ValidatorId> = (0..6).map(id).collect();
        let a = construct_quorum_sets(&active, [1u8; 32], 4, 67, false).unwrap();
        let b = construct_quorum_sets(&active, [2u8; 32], 4, 67, false).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn every_produced_quorum_passes_its_own_sanity_check() {
        let active: Vec<ValidatorId> = (0..10).map(id).collect();
        let quorums = construct_quorum_sets(&active, [3u8; 32], 3, 67, false).unwrap();
        for quorum in quorums.values() {
            assert!(quorum.sanity_check(false).is_ok());
        }
    }

    #[test]
    fn single_group_shares_one_quorum_set_across_all_members() {
        let active: Vec<ValidatorId> = (0..5).map(id).collect();
        let quorums = construct_quorum_sets(&active, [4u8; 32], 10, 80, false).unwrap();
        let sets: Vec<&QuorumSet> = quorums.values().collect();
        assert!(sets.windows(2).all(|w| w[0] == w[1]));
    }
}
