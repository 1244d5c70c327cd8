//! market-sim: discrete-event simulation of block-building markets.
//!
//! Gossips transactions over a latency-weighted network into per-participant
//! mempools, runs the selection & attack engine per builder, and resolves each
//! slot through either a multi-round PBS auction or a stake-weighted PoS draw.

pub mod arena;
pub mod auction;
pub mod claims;
pub mod mempool;
pub mod network;
pub mod participants;
pub mod selection;
pub mod sim;
pub mod stake;

pub use arena::TxArena;
pub use sim::{RunOutput, Simulation};
