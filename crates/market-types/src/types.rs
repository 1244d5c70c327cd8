//! Type definitions for block-market simulation data structures.

use serde::{Deserialize, Serialize};

/// Index of a participant within one run's participant table.
pub type ParticipantId = usize;

/// Transaction id, unique and monotonically increasing within one run.
pub type TxId = u64;

/// Role tag for a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    /// Creates transactions and gossips them; never proposes blocks.
    User,
    /// Assembles candidate blocks and bids in the PBS auction.
    Builder,
    /// Assembles and proposes blocks under PoS, weighted by stake.
    Validator,
    /// Runs the PBS auction and collects the winning bid.
    Proposer,
}

impl std::fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParticipantKind::User => "user",
            ParticipantKind::Builder => "builder",
            ParticipantKind::Validator => "validator",
            ParticipantKind::Proposer => "proposer",
        };
        f.write_str(name)
    }
}

/// Placement of an attack transaction relative to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    /// Inserted immediately before the target, outbidding its gas fee.
    Front,
    /// Inserted immediately after the target.
    Back,
}

/// Lifecycle classification of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Ordinary user transaction.
    Normal,
    /// Synthesized attack transaction holding a live claim on its target.
    Attack,
    /// Attack whose target was already claimed; economics zeroed, still
    /// occupies a block slot if included.
    Failed,
}

/// A transaction observed by the simulated network.
///
/// Value object: immutable after creation except for `included_at` and
/// `position`, which are set exactly once at inclusion time, and `kind`,
/// which may transition `Attack` → `Failed` when a claim race is lost.
/// Payloads are owned by the run's arena; mempools reference them by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Arena-assigned id, unique within the run.
    pub id: TxId,
    /// Gas fee in Gwei.
    pub gas_fee: u64,
    /// Extractable value in Gwei exposed to attackers (0 for most txs).
    pub mev_potential: u64,
    /// Participant that created the transaction.
    pub creator: ParticipantId,
    /// Block index at creation time.
    pub created_at: u64,
    /// Block the transaction was included in (None while pending).
    pub included_at: Option<u64>,
    /// Position within the including block (None while pending).
    pub position: Option<u32>,
    /// Target transaction id for attacks (relation only, not ownership).
    pub target: Option<TxId>,
    /// Front/back placement for attacks, None otherwise.
    pub attack: Option<AttackKind>,
    /// Lifecycle classification.
    pub kind: TxKind,
}

impl Transaction {
    /// True for synthesized attacks, live or failed.
    pub fn is_attack(&self) -> bool {
        self.attack.is_some()
    }

    /// True once the transaction has been included in some block.
    pub fn is_included(&self) -> bool {
        self.included_at.is_some()
    }
}

/// Winner of one block slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    /// Winning participant.
    pub id: ParticipantId,
    /// Role of the winner (Builder under PBS, Validator under PoS).
    pub kind: ParticipantKind,
}

/// Per-slot record emitted by the simulation, immutable once emitted.
///
/// `winner == None` marks a skipped slot (no qualifying validator, or a
/// zero-value auction); the run continues.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block number (slot index).
    pub block_number: u64,
    /// Winning participant, None for skipped slots.
    pub winner: Option<Winner>,
    /// Winning auction bid in Gwei (PBS only).
    pub winning_bid: Option<u64>,
    /// Included transaction snapshots, in block order.
    pub included: Vec<Transaction>,
    /// Sum of included gas fees in Gwei.
    pub total_gas_fee: u64,
    /// Sum of MEV captured by included, non-failed attacks in Gwei.
    pub total_mev_captured: u64,
    /// Wealth snapshot after this block, one entry per block-building
    /// participant in id order: active stake under PoS, cumulative capital
    /// under PBS.
    pub stake_snapshot: Vec<u64>,
}

impl BlockRecord {
    /// Number of included transactions.
    pub fn tx_count(&self) -> usize {
        self.included.len()
    }

    /// True when no winner was recorded for this slot.
    pub fn is_skipped(&self) -> bool {
        self.winner.is_none()
    }
}
