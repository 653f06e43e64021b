//! Engine configuration. Immutable once the engine is built.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vnc_types::{Address, Amount, BASE_TX_GAS};

pub const DEFAULT_CHAIN_ID: u64 = 20250;
pub const DEFAULT_BLOCK_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_MAX_VALIDATORS: usize = 101;
pub const DEFAULT_MIN_VALIDATOR_STAKE_TOKENS: u64 = 100_000;
pub const DEFAULT_FINALITY_BLOCKS: u64 = 2;
pub const DEFAULT_MAX_TRANSACTIONS_PER_BLOCK: usize = 1_000;
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 30_000_000;
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 10_000;
pub const DEFAULT_MEMPOOL_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("block interval must be greater than zero")]
    ZeroBlockInterval,
    #[error("round timeout must be greater than zero")]
    ZeroRoundTimeout,
    #[error("quorum denominator must be greater than zero")]
    ZeroQuorumDenominator,
    #[error("quorum fraction {numerator}/{denominator} is below 2/3")]
    QuorumBelowTwoThirds { numerator: u64, denominator: u64 },
    #[error("quorum fraction {numerator}/{denominator} must be below 1")]
    QuorumNotBelowOne { numerator: u64, denominator: u64 },
    #[error("max_validators must be greater than zero")]
    ZeroMaxValidators,
    #[error("max_transactions_per_block must be greater than zero")]
    ZeroTransactionLimit,
    #[error("block gas limit {0} cannot fit a single transaction")]
    GasLimitTooLow(u64),
    #[error("mempool capacity must be greater than zero")]
    ZeroMempoolCapacity,
}

/// Proposer selection policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposerPolicy {
    #[default]
    RoundRobin,
    StakeWeighted,
}

/// Consensus parameters shared by every validator of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub chain_id: u64,
    pub block_interval_ms: u64,
    /// Falls back to the block interval when unset.
    pub round_timeout_ms: Option<u64>,
    pub max_validators: usize,
    pub min_validator_stake: Amount,
    pub finality_blocks: u64,
    pub quorum_numerator: u64,
    pub quorum_denominator: u64,
    pub max_transactions_per_block: usize,
    pub block_gas_limit: u64,
    pub mempool_capacity: usize,
    pub mempool_ttl_secs: u64,
    pub proposer_policy: ProposerPolicy,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
            round_timeout_ms: None,
            max_validators: DEFAULT_MAX_VALIDATORS,
            min_validator_stake: Amount::from_tokens(DEFAULT_MIN_VALIDATOR_STAKE_TOKENS),
            finality_blocks: DEFAULT_FINALITY_BLOCKS,
            quorum_numerator: 2,
            quorum_denominator: 3,
            max_transactions_per_block: DEFAULT_MAX_TRANSACTIONS_PER_BLOCK,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            mempool_capacity: DEFAULT_MEMPOOL_CAPACITY,
            mempool_ttl_secs: DEFAULT_MEMPOOL_TTL_SECS,
            proposer_policy: ProposerPolicy::RoundRobin,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_interval_ms == 0 {
            return Err(ConfigError::ZeroBlockInterval);
        }
        if self.round_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroRoundTimeout);
        }
        if self.quorum_denominator == 0 {
            return Err(ConfigError::ZeroQuorumDenominator);
        }
        let (numerator, denominator) = (self.quorum_numerator, self.quorum_denominator);
        if u128::from(numerator) * 3 < u128::from(denominator) * 2 {
            return Err(ConfigError::QuorumBelowTwoThirds {
                numerator,
                denominator,
            });
        }
        if numerator >= denominator {
            return Err(ConfigError::QuorumNotBelowOne {
                numerator,
                denominator,
            });
        }
        if self.max_validators == 0 {
            return Err(ConfigError::ZeroMaxValidators);
        }
        if self.max_transactions_per_block == 0 {
            return Err(ConfigError::ZeroTransactionLimit);
        }
        if self.block_gas_limit < BASE_TX_GAS {
            return Err(ConfigError::GasLimitTooLow(self.block_gas_limit));
        }
        if self.mempool_capacity == 0 {
            return Err(ConfigError::ZeroMempoolCapacity);
        }
        Ok(())
    }

    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    pub fn round_timeout_ms(&self) -> u64 {
        self.round_timeout_ms.unwrap_or(self.block_interval_ms)
    }

    pub fn mempool_ttl(&self) -> Duration {
        Duration::from_secs(self.mempool_ttl_secs)
    }

    /// `floor(numerator * n / denominator) + 1` approvals out of `n` active validators.
    pub fn quorum_size(&self, active: usize) -> usize {
        quorum_size(active, self.quorum_numerator, self.quorum_denominator)
    }
}

/// Byzantine quorum for `active` validators.
pub fn quorum_size(active: usize, numerator: u64, denominator: u64) -> usize {
    if denominator == 0 {
        return active;
    }
    let scaled = (active as u128 * u128::from(numerator)) / u128::from(denominator);
    scaled as usize + 1
}

/// Initial balances and validators applied when storage is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub timestamp_ms: u64,
    pub allocations: Vec<GenesisAllocation>,
    pub validators: Vec<GenesisValidator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: Address,
    pub balance: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: Address,
    pub stake: Amount,
    #[serde(default)]
    pub commission_bps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_chain_parameters() {
        let config = ConsensusConfig::default();
        assert_eq!(config.chain_id, 20250);
        assert_eq!(config.block_interval(), Duration::from_secs(2));
        assert_eq!(config.round_timeout_ms(), 2_000);
        assert_eq!(config.max_validators, 101);
        assert_eq!(config.finality_blocks, 2);
        assert_eq!(config.min_validator_stake, Amount::from_tokens(100_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn quorum_is_floor_two_thirds_plus_one() {
        let expected = [(1, 1), (2, 2), (3, 3), (4, 3), (5, 4), (6, 5), (7, 5), (100, 67), (101, 68)];
        for (n, q) in expected {
            assert_eq!(quorum_size(n, 2, 3), q, "n = {n}");
        }
    }

    #[test]
    fn quorum_fraction_is_bounded() {
        let mut config = ConsensusConfig {
            quorum_numerator: 1,
            quorum_denominator: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::QuorumBelowTwoThirds { .. })
        ));

        config.quorum_numerator = 3;
        config.quorum_denominator = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::QuorumNotBelowOne { .. })
        ));

        config.quorum_numerator = 3;
        config.quorum_denominator = 4;
        assert!(config.validate().is_ok());
        assert_eq!(config.quorum_size(4), 4);
    }

    #[test]
    fn rejects_degenerate_values() {
        let zero_interval = ConsensusConfig {
            block_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(zero_interval.validate(), Err(ConfigError::ZeroBlockInterval));

        let tiny_gas = ConsensusConfig {
            block_gas_limit: 20_999,
            ..Default::default()
        };
        assert_eq!(tiny_gas.validate(), Err(ConfigError::GasLimitTooLow(20_999)));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ConsensusConfig = serde_json::from_str(
            r#"{ "chain_id": 7, "proposer_policy": "stake_weighted", "min_validator_stake": "1000" }"#,
        )
        .unwrap();
        assert_eq!(config.chain_id, 7);
        assert_eq!(config.proposer_policy, ProposerPolicy::StakeWeighted);
        assert_eq!(config.min_validator_stake, Amount::from(1000));
        assert_eq!(config.block_gas_limit, DEFAULT_BLOCK_GAS_LIMIT);
    }
}
