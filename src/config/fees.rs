//! Runtime engine configuration: fee rates, threshold policy and roles.
//!
//! Held by value inside the engine state; every mutation goes through the
//! admin-gated setters on `FeeEngine`.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{Address, Amount, BPS_DENOMINATOR, DEFAULT_THRESHOLD_DIVISOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfiguration {
    pub buy_fee_bps: u32,
    pub sell_fee_bps: u32,
}

impl FeeConfiguration {
    pub fn new(buy_fee_bps: u32, sell_fee_bps: u32) -> EngineResult<Self> {
        validate_bps(buy_fee_bps)?;
        validate_bps(sell_fee_bps)?;
        Ok(Self {
            buy_fee_bps,
            sell_fee_bps,
        })
    }
}

impl Default for FeeConfiguration {
    fn default() -> Self {
        Self {
            buy_fee_bps: 500,
            sell_fee_bps: 500,
        }
    }
}

pub fn validate_bps(bps: u32) -> EngineResult<()> {
    if bps as u128 > BPS_DENOMINATOR {
        return Err(EngineError::InvalidFeeRate { bps });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub auto_process_enabled: bool,
    pub threshold_divisor: u128,
    /// Fixed swap amount; when set, replaces the supply-derived threshold.
    #[serde(default)]
    pub swap_amount_override: Option<Amount>,
}

impl ThresholdPolicy {
    /// Override if set, else `total_supply / threshold_divisor`.
    pub fn effective_threshold(&self, total_supply: Amount) -> Amount {
        match self.swap_amount_override {
            Some(amount) => amount,
            None => total_supply / self.threshold_divisor.max(1),
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            auto_process_enabled: true,
            threshold_divisor: DEFAULT_THRESHOLD_DIVISOR,
            swap_amount_override: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub owner: Address,
    pub liquidity_owner: Address,
    pub fee_receiver: Address,
    pub fees: FeeConfiguration,
    pub threshold: ThresholdPolicy,
}

impl EngineConfig {
    pub fn new(owner: Address, fee_receiver: Address) -> Self {
        Self {
            liquidity_owner: owner.clone(),
            owner,
            fee_receiver,
            fees: FeeConfiguration::default(),
            threshold: ThresholdPolicy::default(),
        }
    }

    pub fn ensure_admin(&self, caller: &Address) -> EngineResult<()> {
        if caller != &self.owner {
            return Err(EngineError::Unauthorized {
                caller: caller.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_rates_are_bounded() {
        assert!(FeeConfiguration::new(0, 10_000).is_ok());
        assert_eq!(
            FeeConfiguration::new(10_001, 0).unwrap_err(),
            EngineError::InvalidFeeRate { bps: 10_001 }
        );
    }

    #[test]
    fn override_takes_precedence_over_supply_threshold() {
        let supply = 1_000_000_000 * 10u128.pow(9);
        let mut policy = ThresholdPolicy::default();
        assert_eq!(policy.effective_threshold(supply), 100_000 * 10u128.pow(9));
        policy.swap_amount_override = Some(10_000 * 10u128.pow(9));
        assert_eq!(policy.effective_threshold(supply), 10_000 * 10u128.pow(9));
    }

    #[test]
    fn only_owner_is_admin() {
        let cfg = EngineConfig::new(Address::new("0xowner"), Address::new("0xfees"));
        assert!(cfg.ensure_admin(&Address::new("0xOWNER")).is_ok());
        assert!(matches!(
            cfg.ensure_admin(&Address::new("0xmallory")),
            Err(EngineError::Unauthorized { .. })
        ));
    }
}
