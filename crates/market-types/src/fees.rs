//! Fee and MEV sample sources.
//!
//! External collaborators supply Gwei-scale gas fees and MEV potentials. A
//! source may return fewer samples than requested, or none at all; the engine
//! tolerates short reads mid-run, while an exhausted source at setup is a
//! fatal configuration error. Gwei conversion happens at the source boundary;
//! everything downstream is integer arithmetic.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, LogNormal};
use serde::{Deserialize, Serialize};

/// One sampled transaction economics pair, in Gwei.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSample {
    /// Gas fee in Gwei.
    pub gas_fee: u64,
    /// MEV potential in Gwei (0 for most transactions).
    pub mev_potential: u64,
}

/// Source of fee/MEV samples for transaction creation.
pub trait FeeSource {
    /// Draw up to `n` samples. Returning fewer than `n` is allowed and means
    /// the source is running short.
    fn sample(&mut self, n: usize) -> Vec<FeeSample>;

    /// True once the source cannot produce any further samples.
    fn is_exhausted(&self) -> bool;
}

/// Log-normally distributed synthetic fees with an independent RNG stream.
pub struct SyntheticFeeSource {
    rng: ChaCha20Rng,
    gas: LogNormal<f64>,
    mev: LogNormal<f64>,
    /// Fraction of transactions carrying MEV potential.
    mev_rate: f64,
}

impl SyntheticFeeSource {
    /// Default shape: median gas fee around 20 Gwei, MEV on 15% of
    /// transactions with a heavier tail.
    pub fn new(seed: u64) -> Self {
        // ln(20) and ln(100): medians of the two lognormals.
        Self::with_params(seed, 3.0, 0.8, 4.6, 1.0, 0.15)
    }

    /// Fully parameterized constructor. `gas_mu`/`gas_sigma` and
    /// `mev_mu`/`mev_sigma` are the lognormal parameters of ln-Gwei values;
    /// sigmas are clamped to be finite and non-negative.
    pub fn with_params(
        seed: u64,
        gas_mu: f64,
        gas_sigma: f64,
        mev_mu: f64,
        mev_sigma: f64,
        mev_rate: f64,
    ) -> Self {
        let gas_sigma = if gas_sigma.is_finite() && gas_sigma >= 0.0 {
            gas_sigma
        } else {
            0.0
        };
        let mev_sigma = if mev_sigma.is_finite() && mev_sigma >= 0.0 {
            mev_sigma
        } else {
            0.0
        };
        // Sigmas are sanitized above, so construction cannot fail.
        let gas = LogNormal::new(gas_mu, gas_sigma).unwrap_or_else(|_| {
            LogNormal::new(0.0, 0.0).expect("zero-sigma lognormal is valid")
        });
        let mev = LogNormal::new(mev_mu, mev_sigma).unwrap_or_else(|_| {
            LogNormal::new(0.0, 0.0).expect("zero-sigma lognormal is valid")
        });

        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            gas,
            mev,
            mev_rate: mev_rate.clamp(0.0, 1.0),
        }
    }
}

impl FeeSource for SyntheticFeeSource {
    fn sample(&mut self, n: usize) -> Vec<FeeSample> {
        (0..n)
            .map(|_| {
                let gas_fee = self.gas.sample(&mut self.rng).max(1.0) as u64;
                let mev_potential = if self.rng.gen::<f64>() < self.mev_rate {
                    self.mev.sample(&mut self.rng).max(1.0) as u64
                } else {
                    0
                };
                FeeSample {
                    gas_fee,
                    mev_potential,
                }
            })
            .collect()
    }

    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Replays a fixed sequence of externally supplied samples, then runs dry.
pub struct ReplayFeeSource {
    samples: Vec<FeeSample>,
    cursor: usize,
}

impl ReplayFeeSource {
    pub fn new(samples: Vec<FeeSample>) -> Self {
        Self { samples, cursor: 0 }
    }

    /// Samples remaining before the source runs dry.
    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.cursor)
    }
}

impl FeeSource for ReplayFeeSource {
    fn sample(&mut self, n: usize) -> Vec<FeeSample> {
        let take = n.min(self.remaining());
        let out = self.samples[self.cursor..self.cursor + take].to_vec();
        self.cursor += take;
        out
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
