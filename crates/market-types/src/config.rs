//! Run configuration and fatal setup validation.
//!
//! All tunables are plain data. `SimConfig::validate` performs the setup
//! checks that must abort a run before it starts; everything downstream can
//! assume a validated configuration.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

/// Consensus design under simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusKind {
    /// Proposer-builder separation: builders bid, the proposer sells the slot.
    Pbs,
    /// Pure proof-of-stake: proposers drawn proportional to active stake.
    Pos,
}

/// Transaction-selection policy for non-attacking participants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Highest gas fee first.
    Greedy,
    /// Seeded shuffle.
    Random,
    /// Creation order (first come, first served).
    Fcfs,
}

/// Neighbor choice when gossiping a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Every neighbor receives the transaction.
    All,
    /// A random fraction of neighbors, in (0, 1]. The source variants use
    /// 0.5 and 0.8.
    Sample(f64),
}

/// Who funds a back-run attack's gas fee. The source variants diverge here,
/// so both models are configuration rather than a single assumed semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackRewardModel {
    /// Back-runs carry a zero gas fee; the builder donates the slot.
    BuilderDonates,
    /// Back-runs pay the target's fee minus one Gwei.
    UserPays,
}

/// When the claim table forgets registered targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimReset {
    /// Claims persist for the whole run.
    PerRun,
    /// Claims are cleared after every block.
    PerBlock,
}

/// Gossip network parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Probability of each extra edge beyond the ring backbone.
    pub edge_probability: f64,
    /// Mean edge latency in rounds.
    pub latency_mean: f64,
    /// Latency standard deviation in rounds.
    pub latency_std: f64,
    /// Gossip rounds advanced per block.
    pub rounds_per_block: u64,
    /// Neighbor choice per broadcast.
    pub broadcast: BroadcastMode,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            edge_probability: 0.2,
            latency_mean: 2.0,
            latency_std: 1.0,
            rounds_per_block: 4,
            broadcast: BroadcastMode::All,
        }
    }
}

/// PBS auction parameters. Round limits are hard-bounded to [1, 24].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Lower bound for the adaptive round limit.
    pub min_rounds: u32,
    /// Upper bound for the adaptive round limit.
    pub max_rounds: u32,
    /// Round limit for the first block of the run.
    pub initial_rounds: u32,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            min_rounds: 1,
            max_rounds: 24,
            initial_rounds: 24,
        }
    }
}

/// Stake ledger parameters (PoS / restaking).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StakeConfig {
    /// Active stake is quantized to multiples of this threshold (Gwei).
    pub validator_threshold: u64,
    /// Minimum flattened validator slots required to draw a proposer.
    pub min_validator_nodes: usize,
    /// Starting capital per validator in Gwei.
    pub initial_capital: u64,
    /// Fraction of profit compounded into capital, in [0, 1].
    pub reinvestment_factor: f64,
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            // 32 ETH expressed in Gwei.
            validator_threshold: 32_000_000_000,
            min_validator_nodes: 1,
            initial_capital: 32_000_000_000,
            reinvestment_factor: 1.0,
        }
    }
}

/// Full configuration of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Consensus design.
    pub consensus: ConsensusKind,
    /// Number of block slots to simulate.
    pub blocks: u64,
    /// Maximum transactions per block (targets and attacks count together).
    pub block_cap: usize,
    /// Transaction-creating participants.
    pub num_users: usize,
    /// Block builders (PBS).
    pub num_builders: usize,
    /// Validators (PoS).
    pub num_validators: usize,
    /// How many builders run the attack policy.
    pub attacker_builders: usize,
    /// How many validators run the attack policy.
    pub attacker_validators: usize,
    /// Transactions each user creates per block.
    pub user_txs_per_block: usize,
    /// Ordering policy for non-attacking builders/validators.
    pub policy: SelectionPolicy,
    /// Mempool entries older than this many blocks are purged.
    pub staleness_horizon: u64,
    /// Back-run funding model.
    pub reward_model: AttackRewardModel,
    /// Claim-table reset granularity.
    pub claim_reset: ClaimReset,
    /// Gossip network parameters.
    pub network: NetworkConfig,
    /// PBS auction parameters.
    pub auction: AuctionConfig,
    /// Stake ledger parameters.
    pub stake: StakeConfig,
    /// RNG seed; one stream per run.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            consensus: ConsensusKind::Pbs,
            blocks: 100,
            block_cap: 30,
            num_users: 50,
            num_builders: 10,
            num_validators: 20,
            attacker_builders: 0,
            attacker_validators: 0,
            user_txs_per_block: 2,
            policy: SelectionPolicy::Greedy,
            staleness_horizon: 5,
            reward_model: AttackRewardModel::BuilderDonates,
            claim_reset: ClaimReset::PerRun,
            network: NetworkConfig::default(),
            auction: AuctionConfig::default(),
            stake: StakeConfig::default(),
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Total participants in the run, in id order:
    /// users, then builders + proposer (PBS) or validators (PoS).
    pub fn participant_count(&self) -> usize {
        match self.consensus {
            ConsensusKind::Pbs => self.num_users + self.num_builders + 1,
            ConsensusKind::Pos => self.num_users + self.num_validators,
        }
    }

    /// Validate the configuration. Any error here is fatal at setup; the run
    /// must not start.
    pub fn validate(&self) -> Result<()> {
        if self.blocks == 0 {
            return Err(eyre!("blocks must be positive"));
        }
        if self.block_cap == 0 {
            return Err(eyre!("block_cap must be positive"));
        }
        if self.num_users == 0 {
            return Err(eyre!("at least one user is required to create transactions"));
        }
        match self.consensus {
            ConsensusKind::Pbs => {
                if self.num_builders == 0 {
                    return Err(eyre!("PBS requires at least one builder"));
                }
                if self.attacker_builders > self.num_builders {
                    return Err(eyre!(
                        "attacker_builders {} exceeds num_builders {}",
                        self.attacker_builders,
                        self.num_builders
                    ));
                }
            }
            ConsensusKind::Pos => {
                if self.num_validators == 0 {
                    return Err(eyre!("PoS requires at least one validator"));
                }
                if self.attacker_validators > self.num_validators {
                    return Err(eyre!(
                        "attacker_validators {} exceeds num_validators {}",
                        self.attacker_validators,
                        self.num_validators
                    ));
                }
            }
        }
        if self.user_txs_per_block == 0 {
            return Err(eyre!("user_txs_per_block must be positive"));
        }
        if let BroadcastMode::Sample(fraction) = self.network.broadcast {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(eyre!(
                    "broadcast sample fraction {} must be in (0, 1]",
                    fraction
                ));
            }
        }
        if !(self.network.edge_probability >= 0.0 && self.network.edge_probability <= 1.0) {
            return Err(eyre!(
                "edge_probability {} must be in [0, 1]",
                self.network.edge_probability
            ));
        }
        if self.network.latency_mean <= 0.0 || self.network.latency_std < 0.0 {
            return Err(eyre!(
                "latency parameters must satisfy mean > 0 and std >= 0, got mean {} std {}",
                self.network.latency_mean,
                self.network.latency_std
            ));
        }
        if self.network.rounds_per_block == 0 {
            return Err(eyre!("rounds_per_block must be positive"));
        }
        let auction = &self.auction;
        if auction.min_rounds < 1
            || auction.max_rounds > 24
            || auction.min_rounds > auction.max_rounds
            || auction.initial_rounds < auction.min_rounds
            || auction.initial_rounds > auction.max_rounds
        {
            return Err(eyre!(
                "auction rounds must satisfy 1 <= min <= initial <= max <= 24, got min {} initial {} max {}",
                auction.min_rounds,
                auction.initial_rounds,
                auction.max_rounds
            ));
        }
        if self.stake.validator_threshold == 0 {
            return Err(eyre!("validator_threshold must be positive"));
        }
        if !(self.stake.reinvestment_factor >= 0.0 && self.stake.reinvestment_factor <= 1.0) {
            return Err(eyre!(
                "reinvestment_factor {} must be in [0, 1]",
                self.stake.reinvestment_factor
            ));
        }
        Ok(())
    }
}
