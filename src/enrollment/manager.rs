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

use log::{info, warn};
use tari_utilities::ByteArray;

use crate::{
    crypto::{self, Hash, PrivateKey, PublicKey},
    enrollment::{
        enrollment::Enrollment,
        error::EnrollmentError,
        preimage_chain::PreImageChain,
        validator_set::{ValidatorEntry, ValidatorEvent, ValidatorSet},
    },
    transactions::{OutputLock, TransactionTag},
    utxo::{Utxo, UtxoKey},
};

const LOG_TARGET: &str = "concord::enrollment";

/// Owns the validator lifecycle end to end (component C5): chain generation, admission of
/// enrollment bids, per-block reveal tracking, and re-enrollment bookkeeping.
pub struct EnrollmentManager {
    validator_set: ValidatorSet,
    /// Bids accepted by [`Self::add_enrollment`] but not yet folded into a block header, kept
    /// ordered by utxo-key ascending.
    pending_enrollments: Vec<Enrollment>,
    /// Renewal bids accepted by [`Self::submit_renewal`] for validators still active but due for
    /// re-enrollment, folded into the next header alongside fresh admissions.
    pending_renewals: Vec<Enrollment>,
    /// Pre-image chains this node generated for its own staked outputs, keyed by the utxo that
    /// stakes them so a crash never forces reusing a seed.
    own_chains: HashMap<UtxoKey, PreImageChain>,
    cycle_length: u64,
    /// Whether a validator should be nudged toward a renewal bid as soon as it becomes due. When
    /// `false`, [`Self::due_for_reenrollment`] stays empty unless the active set has shrunk below
    /// every currently enrolled validator — the emergency override that still forces re-enrollment
    /// even with automatic renewal turned off.
    recurring_enrollment: bool,
}

impl EnrollmentManager {
    pub fn new(cycle_length: u64, recurring_enrollment: bool) -> Self {
        Self {
            validator_set: ValidatorSet::new(),
            pending_enrollments: Vec::new(),
            pending_renewals: Vec::new(),
            own_chains: HashMap::new(),
            cycle_length,
            recurring_enrollment,
        }
    }

    pub fn validator_set(&self) -> &ValidatorSet {
        &self.validator_set
    }

    pub fn cycle_length(&self) -> u64 {
        self.cycle_length
    }

    /// True once the active set at `height` no longer covers every validator still on file — the
    /// "NotEnoughValidators" signal that forces re-enrollment regardless of `recurring_enrollment`.
    fn emergency_reenrollment_needed(&self, height: u64) -> bool {
        self.validator_set.active_validators(height).len() < self.validator_set.len()
    }

    /// Reject a commitment that any other entry, pending or enrolled, already commits to.
    fn commitment_in_use(&self, commitment: &Hash) -> bool {
        self.pending_enrollments.iter().any(|e| &e.commitment == commitment)
            || self.pending_renewals.iter().any(|e| &e.commitment == commitment)
            || self.validator_set.contains_commitment(commitment)
    }

    /// Generate a fresh pre-image chain for `utxo_key` and produce the enrollment that commits to
    /// it, signed with `secret_key`.
    pub fn generate_enrollment(
        &mut self,
        utxo_key: UtxoKey,
        secret_key: &PrivateKey,
    ) -> Result<Enrollment, EnrollmentError> {
        let chain = PreImageChain::generate(self.cycle_length);
        let commitment = chain.commitment();
        let unsigned = Enrollment::new(utxo_key, commitment, self.cycle_length, Vec::new());
        let signature =
            crypto::sign(secret_key, &unsigned.signing_bytes()).map_err(|_| EnrollmentError::InvalidSignature)?;
        self.own_chains.insert(utxo_key, chain);
        Ok(Enrollment::new(utxo_key, commitment, self.cycle_length, borsh::to_vec(&signature).unwrap()))
    }

    /// Admit a peer's (or our own) enrollment bid into the pending pool. `utxo` must be the
    /// Freeze output named by `enroll.utxo_key`.
    pub fn add_enrollment(
        &mut self,
        enroll: Enrollment,
        utxo: &Utxo,
        expected_cycle_length: u64,
    ) -> Result<(), EnrollmentError> {
        if utxo.tag != TransactionTag::Freeze {
            return Err(EnrollmentError::NotFreezeOutput(enroll.utxo_key));
        }
        if enroll.cycle_length != expected_cycle_length {
            return Err(EnrollmentError::CycleLengthMismatch(enroll.cycle_length, expected_cycle_length));
        }
        if self.validator_set.contains(&enroll.utxo_key) {
            return Err(EnrollmentError::AlreadyActive(enroll.utxo_key));
        }
        if self.commitment_in_use(&enroll.commitment) {
            return Err(EnrollmentError::DuplicateCommitment);
        }
        let staker_key = match &utxo.lock {
            OutputLock::Key(bytes) => {
                PublicKey::from_bytes(bytes).map_err(|_| EnrollmentError::InvalidSignature)?
            },
            _ => return Err(EnrollmentError::InvalidSignature),
        };
        let signature =
            borsh::from_slice::<crypto::Signature>(&enroll.signature).map_err(|_| EnrollmentError::InvalidSignature)?;
        if !crypto::verify(&staker_key, &signature, &enroll.signing_bytes()) {
            return Err(EnrollmentError::InvalidSignature);
        }

        let position = self.pending_enrollments.partition_point(|e| e.utxo_key < enroll.utxo_key);
        if self.pending_enrollments.get(position).map(|e| e.utxo_key) == Some(enroll.utxo_key) {
            return Err(EnrollmentError::AlreadyActive(enroll.utxo_key));
        }
        info!(target: LOG_TARGET, "admitted enrollment for utxo {:?}", enroll.utxo_key);
        self.pending_enrollments.insert(position, enroll);
        Ok(())
    }

    /// Queue a renewal bid for a validator still active but named by
    /// [`Self::due_for_reenrollment`] at `height`, to be folded into the validator set by the next
    /// [`Self::admit_pending`] without the gap `add_enrollment`'s `AlreadyActive` guard would force.
    pub fn submit_renewal(
        &mut self,
        enroll: Enrollment,
        utxo: &Utxo,
        expected_cycle_length: u64,
        height: u64,
    ) -> Result<(), EnrollmentError> {
        if utxo.tag != TransactionTag::Freeze {
            return Err(EnrollmentError::NotFreezeOutput(enroll.utxo_key));
        }
        if enroll.cycle_length != expected_cycle_length {
            return Err(EnrollmentError::CycleLengthMismatch(enroll.cycle_length, expected_cycle_length));
        }
        if !self.due_for_reenrollment(height).contains(&enroll.utxo_key) {
            return Err(EnrollmentError::NotEnrolled(enroll.utxo_key));
        }
        if self.commitment_in_use(&enroll.commitment) {
            return Err(EnrollmentError::DuplicateCommitment);
        }
        let staker_key = match &utxo.lock {
            OutputLock::Key(bytes) => {
                PublicKey::from_bytes(bytes).map_err(|_| EnrollmentError::InvalidSignature)?
            },
            _ => return Err(EnrollmentError::InvalidSignature),
        };
        let signature =
            borsh::from_slice::<crypto::Signature>(&enroll.signature).map_err(|_| EnrollmentError::InvalidSignature)?;
        if !crypto::verify(&staker_key, &signature, &enroll.signing_bytes()) {
            return Err(EnrollmentError::InvalidSignature);
        }

        self.pending_renewals.retain(|e| e.utxo_key != enroll.utxo_key);
        info!(target: LOG_TARGET, "queued renewal for utxo {:?}", enroll.utxo_key);
        self.pending_renewals.push(enroll);
        Ok(())
    }

    /// Enrollment bids not yet folded into a header, in strictly increasing utxo-key order.
    pub fn get_unregistered_enrollments(&self) -> &[Enrollment] {
        &self.pending_enrollments
    }

    /// Pop up to `max_per_block` pending enrollments (the social-distancing cap) plus every
    /// queued renewal, and fold them into the validator set as of `height`. Renewals are not
    /// subject to the social-distancing cap: they keep an already-active validator active, rather
    /// than growing the set.
    pub fn admit_pending(&mut self, height: u64, max_per_block: usize) -> Vec<Enrollment> {
        let take = max_per_block.min(self.pending_enrollments.len());
        let mut admitted: Vec<Enrollment> = self.pending_enrollments.drain(0..take).collect();
        for enroll in &admitted {
            self.validator_set.insert(
                enroll.utxo_key,
                ValidatorEntry::new(height, enroll.cycle_length, enroll.commitment),
            );
        }

        let renewed: Vec<Enrollment> = self.pending_renewals.drain(..).collect();
        for enroll in &renewed {
            self.validator_set.apply_event(&enroll.utxo_key, ValidatorEvent::CycleEnd);
            self.validator_set.apply_event(&enroll.utxo_key, ValidatorEvent::ReEnroll);
            self.validator_set.insert(
                enroll.utxo_key,
                ValidatorEntry::new(height, enroll.cycle_length, enroll.commitment),
            );
        }
        admitted.extend(renewed);
        admitted
    }

    /// Fold an enrollment already committed to a synced block header straight into the validator
    /// set, bypassing the admission checks `add_enrollment`/`submit_renewal` already ran before the
    /// block was produced.
    pub fn replay_enrollment(&mut self, enroll: &Enrollment, height: u64) {
        self.validator_set.insert(
            enroll.utxo_key,
            ValidatorEntry::new(height, enroll.cycle_length, enroll.commitment),
        );
    }

    /// Record a reveal of `preimage` at `height` for validator `key`, verifying it against the
    /// recorded commitment before advancing the entry's state.
    pub fn record_reveal(&mut self, key: &UtxoKey, preimage: Hash, height: u64) -> Result<(), EnrollmentError> {
        let entry = self.validator_set.get(key).ok_or(EnrollmentError::NotEnrolled(*key))?;
        let distance = height.saturating_sub(entry.enrolled_height + 1);
        if !PreImageChain::verify(&preimage, distance, &entry.commitment) {
            return Err(EnrollmentError::PreImageMismatch);
        }
        self.validator_set.record_reveal(key, preimage, distance);
        Ok(())
    }

    /// Reveal owed by our own chain at `height`, if we hold one for `key`.
    pub fn own_reveal_at(&self, key: &UtxoKey, height: u64) -> Option<Hash> {
        let entry = self.validator_set.get(key)?;
        let distance = height.saturating_sub(entry.enrolled_height + 1);
        self.own_chains.get(key)?.reveal_at_distance(distance)
    }

    /// Mark every currently-active validator that did not reveal by `height` as `MissedReveal`,
    /// returning the keys so the caller can apply `slash_penalty_amount` to their frozen stake.
    pub fn apply_missed_reveals(&mut self, height: u64) -> Vec<UtxoKey> {
        let mut missed = Vec::new();
        let candidates: Vec<UtxoKey> = self
            .validator_set
            .active_validators(height.saturating_sub(1))
            .into_iter()
            .filter(|k| !self.validator_set.get(k).map(|e| e.is_active_at(height)).unwrap_or(false))
            .collect();
        for key in candidates {
            self.validator_set.apply_event(&key, ValidatorEvent::MissReveal);
            self.validator_set.apply_event(&key, ValidatorEvent::Slash);
            warn!(target: LOG_TARGET, "validator {key:?} missed its reveal at height {height}");
            missed.push(key);
        }
        missed
    }

    /// Validators whose cycle ends at `height - 1`: at `height >= enroll_height + N - 1` they must
    /// produce a fresh enrollment. When `recurring_enrollment` is disabled this only fires once the
    /// active set has dropped below the full enrolled set — an emergency, forced re-enrollment
    /// rather than the routine cycling this flag otherwise drives.
    pub fn due_for_reenrollment(&self, height: u64) -> Vec<UtxoKey> {
        if !self.recurring_enrollment && !self.emergency_reenrollment_needed(height.saturating_sub(1)) {
            return Vec::new();
        }
        let mut due: Vec<UtxoKey> = self
            .validator_set
            .active_validators(height.saturating_sub(1))
            .into_iter()
            .filter(|k| {
                self.validator_set.get(k).map(|e| height >= e.enrolled_height + e.cycle_length - 1).unwrap_or(false)
            })
            .collect();
        due.sort();
        due
    }

    /// Eject validators whose cycle has fully ended without a fresh enrollment by `height`.
    pub fn eject_expired(&mut self, height: u64) -> Vec<UtxoKey> {
        let expired: Vec<UtxoKey> = self
            .due_for_reenrollment(height)
            .into_iter()
            .filter(|k| self.validator_set.get(k).map(|e| height > e.cycle_ends_at()).unwrap_or(false))
            .collect();
        for key in &expired {
            self.validator_set.apply_event(key, ValidatorEvent::CycleEnd);
            self.validator_set.apply_event(key, ValidatorEvent::Eject);
            self.validator_set.remove(key);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn freeze_utxo(lock: OutputLock) -> Utxo {
        Utxo { amount: 1_000, lock, unlock_height: 0, tag: TransactionTag::Freeze }
    }

    #[test]
    fn generated_enrollment_is_admitted_and_ordered() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair = KeyPair::generate();
        let utxo_key = ([5u8; 32], 0u32);
        let enroll = manager.generate_enrollment(utxo_key, &keypair.secret).unwrap();
        let utxo = freeze_utxo(OutputLock::key(&keypair.public));
        manager.add_enrollment(enroll, &utxo, 20).unwrap();
        assert_eq!(manager.get_unregistered_enrollments().len(), 1);
    }

    #[test]
    fn enrollment_with_wrong_cycle_length_is_rejected() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair = KeyPair::generate();
        let utxo_key = ([5u8; 32], 0u32);
        let enroll = manager.generate_enrollment(utxo_key, &keypair.secret).unwrap();
        let utxo = freeze_utxo(OutputLock::key(&keypair.public));
        let result = manager.add_enrollment(enroll, &utxo, 1008);
        assert_eq!(result, Err(EnrollmentError::CycleLengthMismatch(20, 1008)));
    }

    #[test]
    fn reveal_tracking_rejects_a_mismatched_preimage() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair = KeyPair::generate();
        let utxo_key = ([5u8; 32], 0u32);
        let enroll = manager.generate_enrollment(utxo_key, &keypair.secret).unwrap();
        let utxo = freeze_utxo(OutputLock::key(&keypair.public));
        manager.add_enrollment(enroll, &utxo, 20).unwrap();
        manager.admit_pending(0, 10);

        let bogus = [0xffu8; 64];
        assert_eq!(manager.record_reveal(&utxo_key, bogus, 1), Err(EnrollmentError::PreImageMismatch));

        let genuine = manager.own_reveal_at(&utxo_key, 1).unwrap();
        assert!(manager.record_reveal(&utxo_key, genuine, 1).is_ok());
    }

    #[test]
    fn due_for_reenrollment_fires_at_cycle_minus_one() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair = KeyPair::generate();
        let utxo_key = ([5u8; 32], 0u32);
        let enroll = manager.generate_enrollment(utxo_key, &keypair.secret).unwrap();
        let utxo = freeze_utxo(OutputLock::key(&keypair.public));
        manager.add_enrollment(enroll, &utxo, 20).unwrap();
        manager.admit_pending(0, 10);
        for h in 1..=19 {
            let preimage = manager.own_reveal_at(&utxo_key, h).unwrap();
            manager.record_reveal(&utxo_key, preimage, h).unwrap();
        }
        assert_eq!(manager.due_for_reenrollment(19), vec![utxo_key]);
    }

    #[test]
    fn a_commitment_already_bound_to_another_utxo_is_rejected() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair_a = KeyPair::generate();
        let utxo_a = ([1u8; 32], 0u32);
        let enroll_a = manager.generate_enrollment(utxo_a, &keypair_a.secret).unwrap();
        let commitment = enroll_a.commitment;
        manager.add_enrollment(enroll_a, &freeze_utxo(OutputLock::key(&keypair_a.public)), 20).unwrap();

        let keypair_b = KeyPair::generate();
        let utxo_b = ([2u8; 32], 0u32);
        let mut enroll_b = manager.generate_enrollment(utxo_b, &keypair_b.secret).unwrap();
        enroll_b.commitment = commitment;
        let signature = crypto::sign(&keypair_b.secret, &enroll_b.signing_bytes()).unwrap();
        enroll_b.signature = borsh::to_vec(&signature).unwrap();

        let result = manager.add_enrollment(enroll_b, &freeze_utxo(OutputLock::key(&keypair_b.public)), 20);
        assert_eq!(result, Err(EnrollmentError::DuplicateCommitment));
    }

    #[test]
    fn re_enrolling_with_the_same_commitment_is_rejected() {
        let mut manager = EnrollmentManager::new(20, true);
        let keypair = KeyPair::generate();
        let utxo_key = ([5u8; 32], 0u32);
        let enroll = manager.generate_enrollment(utxo_key, &keypair.secret).unwrap();
        let commitment = enroll.commitment;
        let utxo = freeze_utxo(OutputLock::key(&keypair.public));
        manager.add_enrollment(enroll, &utxo, 20).unwrap();
        manager.admit_pending(0, 10);
        for h in 1..=19 {
            let preimage = manager.own_reveal_at(&utxo_key, h).unwrap();
            manager.record_reveal(&utxo_key, preimage, h).unwrap();
        }

        let mut stale_renewal = Enrollment::new(utxo_key, commitment, 20, Vec::new());
        let signature = crypto::sign(&keypair.secret, &stale_renewal.signing_bytes()).unwrap();
        stale_renewal.signature = borsh::to_vec(&signature).unwrap();
        let result = manager.submit_renewal(stale_renewal, &utxo, 20, 19);
        assert_eq!(result, Err(EnrollmentError::DuplicateCommitment));
    }

    #[test]
    fn disabling_recurring_enrollment_still_forces_reenrollment_once_the_active_set_shrinks() {
        let mut manager = EnrollmentManager::new(20, false);
        let keypair_a = KeyPair::generate();
        let utxo_a = ([1u8; 32], 0u32);
        let enroll_a = manager.generate_enrollment(utxo_a, &keypair_a.secret).unwrap();
        manager.add_enrollment(enroll_a, &freeze_utxo(OutputLock::key(&keypair_a.public)), 20).unwrap();

        let keypair_b = KeyPair::generate();
        let utxo_b = ([2u8; 32], 0u32);
        let enroll_b = manager.generate_enrollment(utxo_b, &keypair_b.secret).unwrap();
        manager.add_enrollment(enroll_b, &freeze_utxo(OutputLock::key(&keypair_b.public)), 20).unwrap();
        manager.admit_pending(0, 10);

        for h in 1..=19 {
            let preimage = manager.own_reveal_at(&utxo_a, h).unwrap();
            manager.record_reveal(&utxo_a, preimage, h).unwrap();
        }
        // utxo_b never reveals: the active set at height 19 shrinks to just utxo_a, well below
        // the two validators still on file, so re-enrollment is forced despite recurring_enrollment
        // being off.
        assert_eq!(manager.due_for_reenrollment(19), vec![utxo_a]);
    }
}
