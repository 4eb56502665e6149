//! Consensus constants, per-network parameters, and name rules.

pub mod bugs;
pub mod money;
pub mod params;

pub use bugs::{BugType, HistoricBugs};
pub use money::{money_range, Amount, CENT, COIN, MAX_MONEY};
pub use params::{consensus_params, hash256_from_hex, ConsensusParams, Network};

pub type Hash256 = [u8; 32];

/// All-zero hash; the "unknown" sentinel for best-block tracking.
pub const NULL_HASH: Hash256 = [0u8; 32];
