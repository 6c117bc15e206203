//! Engine parameters and privileged roles.
//!
//! ## Defaults
//!
//! | Parameter | Default |
//! |-----------|---------|
//! | expected daily return | 0.001 ether (1e15 wei) |
//! | minimum duration | 30 days |
//! | maximum discount | 1500 basis points |
//! | default reputation | 1 |
//! | bond (non-whitelisted operators) | 1 ether |
//!
//! Parameter changes apply to bids placed or updated afterwards; scores
//! already in the trees are not recomputed.

use thiserror::Error;

use crate::score::BASIS_POINTS;
use crate::types::units::ether_to_wei;
use crate::types::{Address, Wei};

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max discount rate {0} exceeds 10000 basis points")]
    DiscountRateOutOfRange(u16),

    #[error("default reputation must be at least 1")]
    ZeroReputation,

    #[error("invalid ether amount: {0}")]
    InvalidEtherAmount(String),
}

/// Tunable auction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionConfig {
    /// Expected validator return per day, in wei
    pub expected_daily_return: Wei,

    /// Shortest accepted bid duration, in days
    pub min_duration_days: u32,

    /// Highest accepted discount rate, in basis points
    pub max_discount_rate: u16,

    /// Reputation of operators the owner never rated
    pub default_reputation: u32,

    /// Bond escrowed with every bid of a non-whitelisted operator.
    /// Zero restricts bidding to whitelisted operators.
    pub bond_amount: Wei,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            expected_daily_return: 1_000_000_000_000_000,
            min_duration_days: 30,
            max_discount_rate: 1_500,
            default_reputation: 1,
            bond_amount: 1_000_000_000_000_000_000,
        }
    }
}

impl AuctionConfig {
    /// Defaults with the daily return given as a decimal ether string.
    ///
    /// # Example
    ///
    /// ```
    /// use dv_auction::config::AuctionConfig;
    ///
    /// let config = AuctionConfig::with_daily_return_ether("0.002").unwrap();
    /// assert_eq!(config.expected_daily_return, 2_000_000_000_000_000);
    /// ```
    pub fn with_daily_return_ether(amount: &str) -> Result<Self, ConfigError> {
        let expected_daily_return = ether_to_wei(amount)
            .ok_or_else(|| ConfigError::InvalidEtherAmount(amount.to_string()))?;

        let config = Self {
            expected_daily_return,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every parameter is usable by the score calculator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_discount_rate > BASIS_POINTS {
            return Err(ConfigError::DiscountRateOutOfRange(self.max_discount_rate));
        }
        if self.default_reputation == 0 {
            return Err(ConfigError::ZeroReputation);
        }
        Ok(())
    }
}

/// Addresses allowed to call privileged operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    /// Parameter setters and whitelist
    pub owner: Address,

    /// Registers vaults and may draw clusters
    pub vault_manager: Address,

    /// Reports consumed validation credits
    pub rewards: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_are_valid() {
        let config = AuctionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.expected_daily_return, 1_000_000_000_000_000);
        assert_eq!(config.min_duration_days, 30);
        assert_eq!(config.max_discount_rate, 1_500);
    }

    #[test]
    fn test_config_rejects_discount_above_basis_points() {
        let config = AuctionConfig {
            max_discount_rate: 10_001,
            ..AuctionConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::DiscountRateOutOfRange(10_001))
        );
    }

    #[test]
    fn test_config_rejects_zero_reputation() {
        let config = AuctionConfig {
            default_reputation: 0,
            ..AuctionConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroReputation));
    }

    #[test]
    fn test_config_daily_return_from_ether() {
        let config = AuctionConfig::with_daily_return_ether("0.001").unwrap();
        assert_eq!(config, AuctionConfig::default());

        assert!(matches!(
            AuctionConfig::with_daily_return_ether("abc"),
            Err(ConfigError::InvalidEtherAmount(_))
        ));
        assert!(AuctionConfig::with_daily_return_ether("-1").is_err());
    }
}
