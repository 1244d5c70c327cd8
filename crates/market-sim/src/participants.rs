//! Participants.
//!
//! One struct covers all four roles, dispatched by the closed
//! [`ParticipantKind`] tag: every participant shares an identity, a mempool,
//! the attacker flag, and a stake ledger entry; role-specific behavior lives
//! in the driver.

use market_types::config::SelectionPolicy;
use market_types::{ParticipantId, ParticipantKind};

use crate::mempool::Mempool;
use crate::stake::Staker;

#[derive(Clone, Debug)]
pub struct Participant {
    pub id: ParticipantId,
    pub kind: ParticipantKind,
    pub is_attacker: bool,
    pub policy: SelectionPolicy,
    pub mempool: Mempool,
    pub staker: Staker,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        kind: ParticipantKind,
        is_attacker: bool,
        policy: SelectionPolicy,
        staker: Staker,
    ) -> Self {
        Self {
            id,
            kind,
            is_attacker,
            policy,
            mempool: Mempool::new(),
            staker,
        }
    }

    /// True for roles that assemble candidate blocks.
    pub fn builds_blocks(&self) -> bool {
        matches!(
            self.kind,
            ParticipantKind::Builder | ParticipantKind::Validator
        )
    }
}
