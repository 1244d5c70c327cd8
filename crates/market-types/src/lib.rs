//! market-types crate

pub mod config;
pub mod fees;
pub mod types;

pub use config::SimConfig;
pub use types::{
    AttackKind, BlockRecord, ParticipantId, ParticipantKind, Transaction, TxId, TxKind, Winner,
};
