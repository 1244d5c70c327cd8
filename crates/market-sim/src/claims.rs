//! Targeting tracker.
//!
//! The claim table registers which profitable transaction is already being
//! attacked, so no target is attacked more than once per claim window. It is
//! explicit per-run state injected into the selection engine, never a
//! process-wide global; the reset granularity differs across the modeled
//! source variants and is therefore configuration.

use std::collections::HashMap;

use market_types::config::ClaimReset;
use market_types::TxId;

#[derive(Clone, Debug)]
pub struct ClaimTable {
    claimed: HashMap<TxId, TxId>,
    reset: ClaimReset,
}

impl ClaimTable {
    pub fn new(reset: ClaimReset) -> Self {
        Self {
            claimed: HashMap::new(),
            reset,
        }
    }

    /// Register `attack` against `target`. The first claim wins; returns
    /// false when the target is already taken.
    pub fn claim(&mut self, target: TxId, attack: TxId) -> bool {
        match self.claimed.entry(target) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(attack);
                true
            }
        }
    }

    pub fn is_claimed(&self, target: TxId) -> bool {
        self.claimed.contains_key(&target)
    }

    /// The attack currently holding the claim on `target`.
    pub fn claimant(&self, target: TxId) -> Option<TxId> {
        self.claimed.get(&target).copied()
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    /// End-of-block hook; clears claims only under per-block granularity.
    pub fn end_of_block(&mut self) {
        if self.reset == ClaimReset::PerBlock {
            self.claimed.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_wins() {
        let mut claims = ClaimTable::new(ClaimReset::PerRun);
        assert!(claims.claim(5, 100));
        assert!(!claims.claim(5, 101), "second claim on the same target loses");
        assert_eq!(claims.claimant(5), Some(100));
    }

    #[test]
    fn per_block_reset_clears_claims() {
        let mut claims = ClaimTable::new(ClaimReset::PerBlock);
        claims.claim(5, 100);
        claims.end_of_block();
        assert!(!claims.is_claimed(5));
        assert!(claims.claim(5, 200));
    }

    #[test]
    fn per_run_claims_survive_block_boundaries() {
        let mut claims = ClaimTable::new(ClaimReset::PerRun);
        claims.claim(5, 100);
        claims.end_of_block();
        assert!(claims.is_claimed(5));
    }
}
