use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Base fee of the first EIP-1559 block (1 gwei).
pub const INITIAL_BASE_FEE: u64 = 1_000_000_000;

/// Chain-level parameters of the execution environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,

    // Fork activation
    pub berlin_block: Option<u64>,         // access lists
    pub london_block: Option<u64>,         // EIP-1559
    pub shanghai_time: Option<u64>,        // warm coinbase

    // Fee market
    pub base_fee_change_denominator: u64,  // 8
    pub elasticity_multiplier: u64,        // 2
    pub initial_base_fee: U256,            // 1 gwei

    /// Block gas cap used when the host sets no explicit block limit
    pub consensus_max_gas: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            berlin_block: Some(0),
            london_block: Some(0),
            shanghai_time: Some(0),
            base_fee_change_denominator: 8,
            elasticity_multiplier: 2,
            initial_base_fee: U256::from(INITIAL_BASE_FEE),
            consensus_max_gas: 30_000_000,
        }
    }
}

impl ChainConfig {
    pub fn is_berlin(&self, number: u64) -> bool {
        self.berlin_block.is_some_and(|b| number >= b)
    }

    pub fn is_london(&self, number: u64) -> bool {
        self.london_block.is_some_and(|b| number >= b)
    }

    pub fn is_shanghai(&self, timestamp: u64) -> bool {
        self.shanghai_time.is_some_and(|t| timestamp >= t)
    }

    /// Fork rules active at the given block.
    pub fn rules(&self, number: u64, timestamp: u64) -> Rules {
        Rules {
            chain_id: self.chain_id,
            is_berlin: self.is_berlin(number),
            is_london: self.is_london(number),
            is_shanghai: self.is_shanghai(timestamp),
        }
    }

    /// Validate parameters that would otherwise cause division by zero.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.base_fee_change_denominator == 0 {
            return Err(TypesError::InvalidConfig(
                "base fee change denominator cannot be 0".to_string(),
            ));
        }
        if self.elasticity_multiplier == 0 {
            return Err(TypesError::InvalidConfig(
                "elasticity multiplier cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Flattened fork flags for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rules {
    pub chain_id: u64,
    pub is_berlin: bool,
    pub is_london: bool,
    pub is_shanghai: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_all_active() {
        let rules = ChainConfig::default().rules(0, 0);
        assert!(rules.is_berlin && rules.is_london && rules.is_shanghai);
    }

    #[test]
    fn test_fork_activation() {
        let config = ChainConfig {
            london_block: Some(10),
            shanghai_time: None,
            ..Default::default()
        };
        assert!(!config.is_london(9));
        assert!(config.is_london(10));
        assert!(!config.rules(100, u64::MAX).is_shanghai);
    }

    #[test]
    fn test_validate() {
        assert!(ChainConfig::default().validate().is_ok());
        let bad = ChainConfig {
            elasticity_multiplier: 0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(TypesError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml() {
        let config: ChainConfig = toml::from_str("chain_id = 80085\nlondon_block = 5").unwrap();
        assert_eq!(config.chain_id, 80085);
        assert_eq!(config.london_block, Some(5));
        assert_eq!(config.elasticity_multiplier, 2);
    }
}
