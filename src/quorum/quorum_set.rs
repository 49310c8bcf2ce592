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

use std::{cmp::Ordering, collections::HashSet};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{quorum::error::QuorumError, utxo::UtxoKey};

pub const MAX_DEPTH: usize = 2;
pub const MAX_LEAVES: usize = 1000;

/// A validator's identity for quorum purposes: the utxo-key staking it.
pub type ValidatorId = UtxoKey;

/// A tree (max depth 2) of {threshold, validator leaves, inner quorum sets}. An inner singleton
/// `{t=1, [v]}` is equivalent to `v`; an outer `{t=1, no validators, one inner}` collapses to the
/// inner — both handled by [`QuorumSet::normalise`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct QuorumSet {
    pub threshold: u32,
    pub validators: Vec<ValidatorId>,
    pub inner: Vec<QuorumSet>,
}

impl QuorumSet {
    pub fn new(threshold: u32, validators: Vec<ValidatorId>, inner: Vec<QuorumSet>) -> Self {
        Self { threshold, validators, inner }
    }

    pub fn leaf(validator: ValidatorId) -> Self {
        Self { threshold: 1, validators: vec![validator], inner: vec![] }
    }

    pub fn entries(&self) -> usize {
        self.validators.len() + self.inner.len()
    }

    /// 1 for a leaf-only set, 2 for one level of inner sets; inner sets themselves must be depth 1
    /// (no further nesting) to respect the max-depth-2 rule.
    pub fn depth(&self) -> usize {
        if self.inner.is_empty() {
            1
        } else {
            1 + self.inner.iter().map(QuorumSet::depth).max().unwrap_or(0)
        }
    }

    /// All validator leaves anywhere in the tree.
    pub fn all_leaves(&self) -> Vec<ValidatorId> {
        let mut leaves = self.validators.clone();
        for inner in &self.inner {
            leaves.extend(inner.all_leaves());
        }
        leaves
    }

    /// The sanity pass: depth <= 2, threshold in [1, entries], no duplicate leaves, total leaves
    /// <= 1000. `strict` additionally enforces the blocking-set requirement
    /// `threshold >= entries - threshold + 1`.
    pub fn sanity_check(&self, strict: bool) -> Result<(), QuorumError> {
        if self.depth() > MAX_DEPTH {
            return Err(QuorumError::DepthExceeded);
        }
        let entries = self.entries() as u32;
        if self.threshold == 0 || self.threshold > entries {
            return Err(QuorumError::ThresholdOutOfRange(self.threshold, entries));
        }
        for inner in &self.inner {
            inner.sanity_check(strict)?;
        }
        let leaves = self.all_leaves();
        let mut seen = HashSet::new();
        for leaf in &leaves {
            if !seen.insert(*leaf) {
                return Err(QuorumError::DuplicateLeaf);
            }
        }
        if leaves.len() > MAX_LEAVES {
            return Err(QuorumError::TooManyLeaves(leaves.len(), MAX_LEAVES));
        }
        if strict {
            let required = entries - self.threshold + 1;
            if self.threshold < required {
                return Err(QuorumError::NotBlockingSafe(self.threshold, required));
            }
        }
        Ok(())
    }

    /// The normalise pass: optionally self-filter a node, collapse singleton inner sets into
    /// their parent, sort validators ascending and inner sets by (validators, inner-sets,
    /// threshold).
    pub fn normalise(mut self, self_filter: Option<&ValidatorId>) -> Self {
        if let Some(me) = self_filter {
            self.validators.retain(|v| v != me);
        }

        let mut collapsed_validators = Vec::new();
        let mut collapsed_inner = Vec::new();
        for child in self.inner {
            let child = child.normalise(self_filter);
            if child.threshold == 1 && child.validators.len() == 1 && child.inner.is_empty() {
                collapsed_validators.push(child.validators[0]);
            } else {
                collapsed_inner.push(child);
            }
        }
        self.validators.extend(collapsed_validators);
        self.inner = collapsed_inner;

        self.validators.sort();
        self.inner.sort();

        // Outer {t=1, no validators, one inner} collapses to the inner.
        if self.threshold == 1 && self.validators.is_empty() && self.inner.len() == 1 {
            return self.inner.into_iter().next().unwrap();
        }
        self
    }
}

impl PartialOrd for QuorumSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lexicographic by (validators, inner-sets, threshold), matching the normalise pass's ordering
/// rule.
impl Ord for QuorumSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.validators
            .cmp(&other.validators)
            .then_with(|| self.inner.cmp(&other.inner))
            .then_with(|| self.threshold.cmp(&other.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> ValidatorId {
        ([b; 32], 0)
    }

    #[test]
    fn depth_counts_one_level_of_inner_sets() {
        let leafset = QuorumSet::leaf(id(1));
        let nested = QuorumSet::new(1, vec![], vec![leafset]);
        assert_eq!(nested.depth(), 2);
    }

    #[test]
    fn sanity_check_rejects_out_of_range_threshold() {
        let q = QuorumSet::new(0, vec![id(1)], vec![]);
        assert!(q.sanity_check(false).is_err());
        let q = QuorumSet::new(2, vec![id(1)], vec![]);
        assert!(q.sanity_check(false).is_err());
    }

    #[test]
    fn sanity_check_rejects_duplicate_leaves_across_branches() {
        let a = QuorumSet::leaf(id(1));
        let b = QuorumSet::leaf(id(1));
        let q = QuorumSet::new(2, vec![], vec![a, b]);
        assert_eq!(q.sanity_check(false), Err(QuorumError::DuplicateLeaf));
    }

    #[test]
    fn normalise_collapses_inner_singleton_into_parent_leaf() {
        let q = QuorumSet::new(2, vec![id(1)], vec![QuorumSet::leaf(id(2))]);
        let normalised = q.normalise(None);
        assert_eq!(normalised.validators, vec![id(1), id(2)]);
        assert!(normalised.inner.is_empty());
    }

    #[test]
    fn normalise_collapses_outer_singleton_to_its_inner() {
        let inner = QuorumSet::new(2, vec![id(1), id(2)], vec![]);
        let q = QuorumSet::new(1, vec![], vec![inner.clone()]);
        assert_eq!(q.normalise(None), inner);
    }

    #[test]
    fn normalise_applies_self_filter() {
        let q = QuorumSet::new(2, vec![id(1), id(2), id(3)], vec![]);
        let normalised = q.normalise(Some(&id(2)));
        assert_eq!(normalised.validators, vec![id(1), id(3)]);
    }
}
