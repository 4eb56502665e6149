//! Consensus parameter definitions.

use crate::money::{Amount, COIN};
use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

#[derive(Clone, Debug)]
pub struct ConsensusParams {
    pub network: Network,
    pub hash_genesis_block: Hash256,
    pub subsidy_halving_interval: i32,
    /// Used to check majorities for block version upgrades.
    pub majority_enforce_block_upgrade: i32,
    pub majority_reject_block_outdated: i32,
    pub majority_window: i32,
    pub pow_limit: Hash256,
    pub pow_allow_min_difficulty_blocks: bool,
    pub min_difficulty_since: i64,
    pub pow_target_spacing: i64,
    pub pow_target_timespan: i64,
    pub auxpow_chain_id: i32,
    pub auxpow_start_height: i32,
    pub strict_chain_id: bool,
    /// Height below which legacy (non-auxpow) block versions are accepted;
    /// negative means "always".
    pub legacy_blocks_before: i32,
}

impl ConsensusParams {
    pub fn difficulty_adjustment_interval(&self) -> i64 {
        self.pow_target_timespan / self.pow_target_spacing
    }

    /// Whether a minimum-difficulty block with the given timestamp is
    /// acceptable on this network.
    pub fn allow_min_difficulty_blocks(&self, block_time: i64) -> bool {
        if !self.pow_allow_min_difficulty_blocks {
            return false;
        }
        block_time > self.min_difficulty_since
    }

    pub fn allow_legacy_blocks(&self, height: u32) -> bool {
        if self.legacy_blocks_before < 0 {
            return true;
        }
        (height as i64) < self.legacy_blocks_before as i64
    }

    /// Expiration depth for names updated at `height`.
    ///
    /// Expiration processing assumes `h - depth(h)` never decreases; it is
    /// the update height up to which names expire at height `h`.
    pub fn name_expiration_depth(&self, height: u32) -> u32 {
        match self.network {
            Network::Mainnet | Network::Testnet => {
                if height < 24_000 {
                    12_000
                } else if height < 48_000 {
                    height - 12_000
                } else {
                    36_000
                }
            }
            Network::Regtest => 30,
        }
    }

    /// Minimum amount locked in a name output at the given height.
    pub fn min_name_coin_amount(&self, height: u32) -> Amount {
        match self.network {
            Network::Mainnet => {
                if height < 212_500 {
                    0
                } else {
                    COIN / 100
                }
            }
            Network::Testnet | Network::Regtest => COIN / 100,
        }
    }
}

#[derive(Debug)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

/// Parse a 64-digit big-endian hex string into the internal little-endian
/// hash layout.
pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let hex = input.trim();
    if hex.len() != 64 {
        return Err(HexError::InvalidLength);
    }

    let mut bytes = [0u8; 32];
    for (i, byte_out) in bytes.iter_mut().enumerate() {
        let start = i * 2;
        *byte_out =
            u8::from_str_radix(&hex[start..start + 2], 16).map_err(|_| HexError::InvalidHex)?;
    }
    bytes.reverse();

    Ok(bytes)
}

pub fn consensus_params(network: Network) -> ConsensusParams {
    match network {
        Network::Mainnet => mainnet_params(),
        Network::Testnet => testnet_params(),
        Network::Regtest => regtest_params(),
    }
}

fn mainnet_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Mainnet,
        hash_genesis_block: hash256_from_hex(
            "000000000062b72c5e2ceb45fbc8587e807c155b0da735e6483dfba2f0a9c770",
        )
        .expect("mainnet genesis hash"),
        subsidy_halving_interval: 210_000,
        majority_enforce_block_upgrade: 750,
        majority_reject_block_outdated: 950,
        majority_window: 1_000,
        pow_limit: hash256_from_hex(
            "00000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .expect("mainnet pow limit"),
        pow_allow_min_difficulty_blocks: false,
        min_difficulty_since: 0,
        pow_target_spacing: 10 * 60,
        pow_target_timespan: 14 * 24 * 60 * 60,
        auxpow_chain_id: 1,
        auxpow_start_height: 19_200,
        strict_chain_id: true,
        legacy_blocks_before: 19_200,
    }
}

fn testnet_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Testnet,
        hash_genesis_block: hash256_from_hex(
            "00000007199508e34a9ff81e6ec0c477a4cccff2a4767a8eee39c11db367b008",
        )
        .expect("testnet genesis hash"),
        subsidy_halving_interval: 210_000,
        majority_enforce_block_upgrade: 51,
        majority_reject_block_outdated: 75,
        majority_window: 100,
        pow_limit: hash256_from_hex(
            "0000000fffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .expect("testnet pow limit"),
        pow_allow_min_difficulty_blocks: true,
        // Minimum-difficulty blocks only after the March 2014 fork time.
        min_difficulty_since: 1_394_838_000,
        pow_target_spacing: 10 * 60,
        pow_target_timespan: 14 * 24 * 60 * 60,
        auxpow_chain_id: 1,
        auxpow_start_height: 0,
        strict_chain_id: false,
        legacy_blocks_before: -1,
    }
}

fn regtest_params() -> ConsensusParams {
    ConsensusParams {
        network: Network::Regtest,
        hash_genesis_block: hash256_from_hex(
            "5287b3809b71433729402429b7d909a853cfac5ed40f09117b242c275e6b2d63",
        )
        .expect("regtest genesis hash"),
        subsidy_halving_interval: 150,
        majority_enforce_block_upgrade: 750,
        majority_reject_block_outdated: 950,
        majority_window: 1_000,
        pow_limit: hash256_from_hex(
            "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
        )
        .expect("regtest pow limit"),
        pow_allow_min_difficulty_blocks: true,
        min_difficulty_since: 0,
        pow_target_spacing: 10 * 60,
        pow_target_timespan: 14 * 24 * 60 * 60,
        auxpow_chain_id: 1,
        auxpow_start_height: 0,
        strict_chain_id: true,
        legacy_blocks_before: 0,
    }
}
