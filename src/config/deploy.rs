//! Deployment configuration loaded from TOML.
//!
//! Covers what a deployment fixes up front (initial supply, fee receiver,
//! router, collectors and shares) plus the fee and threshold settings an
//! operator may change later through the admin surface.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use super::ThresholdPolicy;
use crate::engine::EngineParams;
use crate::types::{
    parse_units, Address, Amount, BPS_DENOMINATOR, COLLECTOR_WEIGHT_TOTAL, DEFAULT_DECIMALS,
    DEFAULT_EVENT_CAPACITY, DEFAULT_THRESHOLD_DIVISOR,
};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenSection {
    pub address: String,
    /// Whole tokens, decimal string (e.g. "1000000000")
    pub total_supply: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    pub owner: String,
    pub fee_receiver: String,
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeesSection {
    #[serde(default = "default_fee_bps")]
    pub buy_fee_bps: u32,
    #[serde(default = "default_fee_bps")]
    pub sell_fee_bps: u32,
}

fn default_fee_bps() -> u32 {
    500
}

impl Default for FeesSection {
    fn default() -> Self {
        Self {
            buy_fee_bps: default_fee_bps(),
            sell_fee_bps: default_fee_bps(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThresholdSection {
    #[serde(default = "default_true")]
    pub auto_process: bool,
    #[serde(default = "default_divisor")]
    pub divisor: u64,
    /// Whole tokens; replaces the supply-derived threshold when present
    #[serde(default)]
    pub swap_amount: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_divisor() -> u64 {
    DEFAULT_THRESHOLD_DIVISOR as u64
}

impl Default for ThresholdSection {
    fn default() -> Self {
        Self {
            auto_process: true,
            divisor: default_divisor(),
            swap_amount: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeSection {
    pub router: String,
    pub settlement_asset: String,
    #[serde(default = "default_settlement_decimals")]
    pub settlement_decimals: u32,
    /// Whole tokens moved from the liquidity owner into the pool at init
    #[serde(default)]
    pub token_liquidity: Option<String>,
    /// Settlement units (whole) paired with `token_liquidity`
    #[serde(default)]
    pub settlement_liquidity: Option<String>,
}

fn default_settlement_decimals() -> u32 {
    18
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EventsSection {
    /// Most recent engine events kept in each snapshot
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CollectorEntry {
    pub address: String,
    pub weight: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeploymentConfig {
    pub token: TokenSection,
    #[serde(default)]
    pub fees: FeesSection,
    #[serde(default)]
    pub threshold: ThresholdSection,
    pub exchange: ExchangeSection,
    #[serde(default)]
    pub collectors: Vec<CollectorEntry>,
    #[serde(default)]
    pub events: EventsSection,
}

impl DeploymentConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: DeploymentConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (label, addr) in [
            ("token.address", &self.token.address),
            ("token.owner", &self.token.owner),
            ("token.fee_receiver", &self.token.fee_receiver),
            ("exchange.router", &self.exchange.router),
            ("exchange.settlement_asset", &self.exchange.settlement_asset),
        ] {
            if addr.trim().is_empty() {
                return Err(anyhow!("{} looks invalid/empty", label));
            }
        }

        let supply = self.total_supply()?;
        if supply == 0 {
            return Err(anyhow!("token.total_supply must be non-zero"));
        }

        for (label, bps) in [
            ("fees.buy_fee_bps", self.fees.buy_fee_bps),
            ("fees.sell_fee_bps", self.fees.sell_fee_bps),
        ] {
            if bps as u128 > BPS_DENOMINATOR {
                return Err(anyhow!("{} must be at most 10000 (got {})", label, bps));
            }
        }

        if self.threshold.divisor == 0 {
            return Err(anyhow!("threshold.divisor must be non-zero"));
        }
        self.swap_amount()?;

        if self.events.capacity == 0 {
            return Err(anyhow!("events.capacity must be non-zero"));
        }

        if !self.collectors.is_empty() {
            let total: u128 = self.collectors.iter().map(|c| c.weight as u128).sum();
            if total != COLLECTOR_WEIGHT_TOTAL {
                return Err(anyhow!(
                    "collector weights must sum to {} (got {})",
                    COLLECTOR_WEIGHT_TOTAL,
                    total
                ));
            }
            for c in &self.collectors {
                if c.address.trim().is_empty() {
                    return Err(anyhow!("collector address looks invalid/empty"));
                }
            }
        }

        if let Some((tokens, _)) = self.initial_liquidity()? {
            if tokens > supply {
                return Err(anyhow!("exchange.token_liquidity exceeds total supply"));
            }
        }
        Ok(())
    }

    pub fn total_supply(&self) -> Result<Amount> {
        parse_units(&self.token.total_supply, self.token.decimals)
            .map_err(|e| anyhow!("token.total_supply: {}", e))
    }

    pub fn swap_amount(&self) -> Result<Option<Amount>> {
        self.threshold
            .swap_amount
            .as_deref()
            .map(|s| parse_units(s, self.token.decimals))
            .transpose()
            .map_err(|e| anyhow!("threshold.swap_amount: {}", e))
    }

    /// `(token_units, settlement_units)` when both halves are configured.
    pub fn initial_liquidity(&self) -> Result<Option<(Amount, Amount)>> {
        match (
            &self.exchange.token_liquidity,
            &self.exchange.settlement_liquidity,
        ) {
            (Some(t), Some(s)) => {
                let tokens = parse_units(t, self.token.decimals)
                    .map_err(|e| anyhow!("exchange.token_liquidity: {}", e))?;
                let settlement = parse_units(s, self.exchange.settlement_decimals)
                    .map_err(|e| anyhow!("exchange.settlement_liquidity: {}", e))?;
                Ok(Some((tokens, settlement)))
            }
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "exchange.token_liquidity and exchange.settlement_liquidity must be set together"
            )),
        }
    }

    pub fn token_address(&self) -> Address {
        Address::new(&self.token.address)
    }

    pub fn owner(&self) -> Address {
        Address::new(&self.token.owner)
    }

    pub fn fee_receiver(&self) -> Address {
        Address::new(&self.token.fee_receiver)
    }

    pub fn router(&self) -> Address {
        Address::new(&self.exchange.router)
    }

    pub fn settlement_asset(&self) -> Address {
        Address::new(&self.exchange.settlement_asset)
    }
}

impl DeploymentConfig {
    /// Typed parameters for [`FeeEngine::deploy`](crate::engine::FeeEngine::deploy).
    pub fn engine_params(&self) -> Result<EngineParams> {
        self.validate()?;
        Ok(EngineParams {
            token: self.token_address(),
            decimals: self.token.decimals,
            total_supply: self.total_supply()?,
            owner: self.owner(),
            fee_receiver: self.fee_receiver(),
            settlement_asset: self.settlement_asset(),
            buy_fee_bps: self.fees.buy_fee_bps,
            sell_fee_bps: self.fees.sell_fee_bps,
            threshold: ThresholdPolicy {
                auto_process_enabled: self.threshold.auto_process,
                threshold_divisor: self.threshold.divisor as u128,
                swap_amount_override: self.swap_amount()?,
            },
            collectors: self
                .collectors
                .iter()
                .map(|c| (Address::new(&c.address), c.weight))
                .collect(),
            event_capacity: self.events.capacity,
        })
    }
}

pub fn load_deployment(path: impl AsRef<Path>) -> Result<DeploymentConfig> {
    let p = path.as_ref();
    let raw = fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
    DeploymentConfig::from_toml_str(&raw).with_context(|| format!("parsing {}", p.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[token]
address = "0xcB64a719D7e7749BFD18dc1815f1EF3C28F083E2"
total_supply = "1000000000"
owner = "0xowner"
fee_receiver = "0xf8492afedc885ef3d443f0f51b81b7e70fbcd516"

[fees]
buy_fee_bps = 300
sell_fee_bps = 500

[exchange]
router = "0x1689e7b1f10000ae47ebfe339a4f69decd19f602"
settlement_asset = "0x4200000000000000000000000000000000000006"
token_liquidity = "2000000"
settlement_liquidity = "0.08"

[[collectors]]
address = "0x0fbbddc39cdb1d089779dc770268b1a995bc527a"
weight = 100
"#;

    #[test]
    fn sample_config_parses() {
        let cfg = DeploymentConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.total_supply().unwrap(), 1_000_000_000 * 10u128.pow(9));
        assert_eq!(cfg.fees.buy_fee_bps, 300);
        assert_eq!(cfg.threshold.divisor, 10_000);
        assert!(cfg.threshold.auto_process);
        assert_eq!(
            cfg.initial_liquidity().unwrap(),
            Some((2_000_000 * 10u128.pow(9), 8 * 10u128.pow(16)))
        );
        assert_eq!(cfg.collectors.len(), 1);
    }

    #[test]
    fn engine_params_carry_typed_values() {
        let raw = SAMPLE.replace(
            "[exchange]",
            "[threshold]\nswap_amount = \"250000\"\n\n[exchange]",
        );
        let cfg = DeploymentConfig::from_toml_str(&raw).unwrap();
        let params = cfg.engine_params().unwrap();
        assert_eq!(params.owner, Address::new("0xOWNER"));
        assert_eq!(params.sell_fee_bps, 500);
        assert_eq!(params.threshold.swap_amount_override, Some(250_000 * 10u128.pow(9)));
        assert_eq!(params.collectors.len(), 1);
        assert_eq!(params.collectors[0].1, 100);
        assert_eq!(params.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn event_capacity_is_configurable() {
        let raw = format!("{}\n[events]\ncapacity = 64\n", SAMPLE);
        let cfg = DeploymentConfig::from_toml_str(&raw).unwrap();
        assert_eq!(cfg.engine_params().unwrap().event_capacity, 64);

        let raw = format!("{}\n[events]\ncapacity = 0\n", SAMPLE);
        let err = DeploymentConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("events.capacity"));
    }

    #[test]
    fn rejects_bad_weights() {
        let raw = SAMPLE.replace("weight = 100", "weight = 99");
        let err = DeploymentConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("sum to 100"));
    }

    #[test]
    fn rejects_half_configured_liquidity() {
        let raw = SAMPLE.replace("settlement_liquidity = \"0.08\"", "");
        assert!(DeploymentConfig::from_toml_str(&raw).is_err());
    }
}
