//! Stake ledger and proposer selection.
//!
//! Capital accumulates continuously; active stake jumps only in whole
//! threshold increments. Proposer selection draws uniformly over the
//! flattened validator-slot list, which is equivalent to stake-weighted
//! sampling. The positive feedback loop (more stake → more slots → more
//! profit) is the object of study, not a defect; the concentration metrics in
//! market-analysis measure it.

use market_types::ParticipantId;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// History lists are trimmed to the last [`HISTORY_TRIM_TO`] entries once
/// they exceed this many.
pub const HISTORY_HARD_CAP: usize = 1000;
pub const HISTORY_TRIM_TO: usize = 500;

/// One participant's capital and quantized stake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Staker {
    /// Cumulative capital in Gwei; monotone non-decreasing, no withdrawal.
    pub capital: u64,
    /// Threshold-quantized stake: always a multiple of the threshold and
    /// never above capital.
    pub active_stake: u64,
    /// Fraction of profit compounded into capital.
    pub reinvestment_factor: f64,
    /// Per-update profits, bounded.
    pub profit_history: Vec<u64>,
    /// Active stake after each update, bounded.
    pub stake_history: Vec<u64>,
    threshold: u64,
}

impl Staker {
    pub fn new(capital: u64, threshold: u64, reinvestment_factor: f64) -> Self {
        let mut staker = Self {
            capital,
            active_stake: 0,
            reinvestment_factor,
            profit_history: Vec::new(),
            stake_history: Vec::new(),
            threshold,
        };
        staker.requantize();
        staker
    }

    /// Validator slots contributed by this staker.
    pub fn slots(&self) -> u64 {
        if self.threshold == 0 {
            return 0;
        }
        self.active_stake / self.threshold
    }

    /// Credit a block profit. Zero profit is a no-op; otherwise the
    /// reinvested share compounds into capital and active stake requantizes
    /// to the highest threshold multiple at or below capital.
    pub fn update_stake(&mut self, profit: u64) {
        if profit == 0 {
            return;
        }

        let reinvested = (profit as f64 * self.reinvestment_factor).floor() as u64;
        self.capital = self.capital.saturating_add(reinvested);
        self.requantize();

        self.profit_history.push(profit);
        self.stake_history.push(self.active_stake);
        trim_history(&mut self.profit_history);
        trim_history(&mut self.stake_history);
    }

    fn requantize(&mut self) {
        if self.threshold == 0 {
            self.active_stake = 0;
            return;
        }
        self.active_stake = self.threshold * (self.capital / self.threshold);
    }
}

fn trim_history(history: &mut Vec<u64>) {
    if history.len() > HISTORY_HARD_CAP {
        let drop = history.len() - HISTORY_TRIM_TO;
        history.drain(..drop);
    }
}

/// Flatten stakers into the validator-slot list used for the proposer draw.
/// Each entry appears once per whole threshold of active stake.
pub fn validator_slots(stakers: &[(ParticipantId, &Staker)]) -> Vec<ParticipantId> {
    let mut slots = Vec::new();
    for (id, staker) in stakers {
        for _ in 0..staker.slots() {
            slots.push(*id);
        }
    }
    slots
}

/// Uniform draw over the flattened slot list, equivalent to stake-weighted
/// proposer sampling. `None` when no slots qualify.
pub fn stake_weighted_draw<R: Rng>(slots: &[ParticipantId], rng: &mut R) -> Option<ParticipantId> {
    if slots.is_empty() {
        return None;
    }
    Some(slots[rng.gen_range(0..slots.len())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const THRESHOLD: u64 = 32_000_000_000;

    /// Capital 31e9 under a 32e9 threshold gains 2e9 profit,
    /// crossing exactly one threshold and gaining one slot from zero.
    #[test]
    fn threshold_crossing_grants_one_slot() {
        let mut staker = Staker::new(31_000_000_000, THRESHOLD, 1.0);
        assert_eq!(staker.active_stake, 0);
        assert_eq!(staker.slots(), 0);

        staker.update_stake(2_000_000_000);
        assert_eq!(staker.capital, 33_000_000_000);
        assert_eq!(staker.active_stake, 32_000_000_000);
        assert_eq!(staker.slots(), 1);
    }

    #[test]
    fn zero_profit_is_a_no_op() {
        let mut staker = Staker::new(40_000_000_000, THRESHOLD, 1.0);
        let before = staker.clone();
        staker.update_stake(0);
        assert_eq!(staker, before);
    }

    #[test]
    fn active_stake_is_always_a_threshold_multiple_and_at_most_capital() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut staker = Staker::new(5_000_000_000, THRESHOLD, 0.9);
        for _ in 0..200 {
            staker.update_stake(rng.gen_range(0..3_000_000_000));
            assert_eq!(staker.active_stake % THRESHOLD, 0);
            assert!(staker.active_stake <= staker.capital);
        }
    }

    #[test]
    fn capital_is_monotone_non_decreasing() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let mut staker = Staker::new(0, THRESHOLD, 1.0);
        let mut previous = staker.capital;
        for _ in 0..100 {
            staker.update_stake(rng.gen_range(0..2_000_000_000));
            assert!(staker.capital >= previous);
            previous = staker.capital;
        }
    }

    #[test]
    fn zero_reinvestment_never_compounds() {
        let mut staker = Staker::new(31_000_000_000, THRESHOLD, 0.0);
        staker.update_stake(50_000_000_000);
        assert_eq!(staker.capital, 31_000_000_000);
        assert_eq!(staker.slots(), 0);
    }

    #[test]
    fn histories_trim_to_five_hundred_past_the_cap() {
        let mut staker = Staker::new(0, THRESHOLD, 1.0);
        for _ in 0..=HISTORY_HARD_CAP {
            staker.update_stake(1);
        }
        assert_eq!(staker.profit_history.len(), HISTORY_TRIM_TO);
        assert_eq!(staker.stake_history.len(), HISTORY_TRIM_TO);
    }

    #[test]
    fn slot_list_flattens_whole_thresholds() {
        let a = Staker::new(2 * THRESHOLD, THRESHOLD, 1.0);
        let b = Staker::new(THRESHOLD - 1, THRESHOLD, 1.0);
        let c = Staker::new(THRESHOLD, THRESHOLD, 1.0);

        let slots = validator_slots(&[(0, &a), (1, &b), (2, &c)]);
        assert_eq!(slots, vec![0, 0, 2]);
    }

    #[test]
    fn draw_is_stake_weighted() {
        let whale = Staker::new(9 * THRESHOLD, THRESHOLD, 1.0);
        let minnow = Staker::new(THRESHOLD, THRESHOLD, 1.0);
        let slots = validator_slots(&[(0, &whale), (1, &minnow)]);

        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let mut whale_wins = 0;
        const DRAWS: usize = 10_000;
        for _ in 0..DRAWS {
            if stake_weighted_draw(&slots, &mut rng) == Some(0) {
                whale_wins += 1;
            }
        }
        let share = whale_wins as f64 / DRAWS as f64;
        assert!((share - 0.9).abs() < 0.02, "whale share {share} far from 0.9");
    }

    #[test]
    fn empty_slot_list_draws_nobody() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        assert_eq!(stake_weighted_draw(&[], &mut rng), None);
    }
}
