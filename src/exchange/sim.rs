//! Constant-product pool double (x * y = k, 0.3% input fee).
//!
//! Stands in for the third-party pair + router so the engine can be driven
//! end to end without a chain. Token reserves are tracked separately from the
//! pool's ledger balance: tokens sent to the pool count as swap input only
//! once a swap or a liquidity sync accounts for them.

use serde::{Deserialize, Serialize};

use super::{ExchangeRouter, LedgerHandle, Reserves, SwapPath};
use crate::error::RouterError;
use crate::pool_registry::derive_pool_address;
use crate::types::{mul_div_wide, Address, Amount, BPS_DENOMINATOR};

const DEFAULT_POOL_FEE_BPS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedPool {
    router: Address,
    pool: Address,
    token: Address,
    settlement: Address,
    reserves: Reserves,
    fee_bps: u32,
}

impl SimulatedPool {
    pub fn new(router: Address, token: Address, settlement: Address) -> Self {
        let pool = derive_pool_address(&router, &token, &settlement);
        Self {
            router,
            pool,
            token,
            settlement,
            reserves: Reserves::default(),
            fee_bps: DEFAULT_POOL_FEE_BPS,
        }
    }

    pub fn pool_address(&self) -> &Address {
        &self.pool
    }

    pub fn settlement_asset(&self) -> &Address {
        &self.settlement
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Record newly deposited liquidity: the token reserve becomes the pool's
    /// ledger balance and `settlement_added` joins the settlement reserve.
    pub fn sync_liquidity(&mut self, ledger: &dyn LedgerHandle, settlement_added: Amount) {
        self.reserves.token = ledger.balance_of(&self.pool);
        self.reserves.settlement = self.reserves.settlement.saturating_add(settlement_added);
        tracing::debug!(
            pool = %self.pool,
            token_reserve = %self.reserves.token,
            settlement_reserve = %self.reserves.settlement,
            "pool liquidity synced"
        );
    }

    /// Settlement-in side of a buy: returns the gross token amount the pool
    /// releases. The caller moves those tokens out of the pool.
    pub fn swap_settlement_for_tokens(
        &mut self,
        settlement_in: Amount,
        min_tokens_out: Amount,
    ) -> Result<Amount, RouterError> {
        if !self.reserves.is_funded() {
            return Err(RouterError::InsufficientLiquidity);
        }
        let out = amount_out(
            settlement_in,
            self.reserves.settlement,
            self.reserves.token,
            self.fee_bps,
        );
        if out == 0 || out < min_tokens_out {
            return Err(RouterError::InsufficientOutputAmount {
                quoted: out,
                min_out: min_tokens_out,
            });
        }
        self.reserves.settlement += settlement_in;
        self.reserves.token -= out;
        Ok(out)
    }

    /// Token-in side: `amount_in` tokens must already sit in the pool on top
    /// of the token reserve.
    pub fn settle_token_input(
        &mut self,
        ledger: &dyn LedgerHandle,
        amount_in: Amount,
        min_out: Amount,
    ) -> Result<Amount, RouterError> {
        if !self.reserves.is_funded() {
            return Err(RouterError::InsufficientLiquidity);
        }
        let held = ledger.balance_of(&self.pool);
        if held < self.reserves.token.saturating_add(amount_in) {
            return Err(RouterError::InsufficientInputAmount);
        }
        let out = amount_out(
            amount_in,
            self.reserves.token,
            self.reserves.settlement,
            self.fee_bps,
        );
        if out < min_out {
            return Err(RouterError::InsufficientOutputAmount {
                quoted: out,
                min_out,
            });
        }
        self.reserves.token += amount_in;
        self.reserves.settlement -= out;
        Ok(out)
    }

    fn check_path(&self, path: &SwapPath) -> Result<(), RouterError> {
        if path.input != self.token || path.output != self.settlement {
            return Err(RouterError::InvalidPath);
        }
        Ok(())
    }
}

impl ExchangeRouter for SimulatedPool {
    fn address(&self) -> &Address {
        &self.router
    }

    fn get_reserves(&self) -> Reserves {
        self.reserves
    }

    fn get_amounts_out(&self, amount_in: Amount, path: &SwapPath) -> Result<Amount, RouterError> {
        self.check_path(path)?;
        if !self.reserves.is_funded() {
            return Err(RouterError::InsufficientLiquidity);
        }
        Ok(amount_out(
            amount_in,
            self.reserves.token,
            self.reserves.settlement,
            self.fee_bps,
        ))
    }

    fn swap_exact_tokens_for_settlement(
        &mut self,
        ledger: &mut dyn LedgerHandle,
        amount_in: Amount,
        min_out: Amount,
        path: &SwapPath,
        recipient: &Address,
        deadline: u64,
    ) -> Result<Amount, RouterError> {
        let now = ledger.block_time();
        if deadline < now {
            return Err(RouterError::Expired { deadline, now });
        }
        self.check_path(path)?;
        let out = self.settle_token_input(&*ledger, amount_in, min_out)?;
        tracing::debug!(
            router = %self.router,
            recipient = %recipient,
            amount_in = %amount_in,
            amount_out = %out,
            "simulated swap settled"
        );
        Ok(out)
    }
}

/// Constant-product output for `amount_in` with an input fee.
pub fn amount_out(
    amount_in: Amount,
    reserve_in: Amount,
    reserve_out: Amount,
    fee_bps: u32,
) -> Amount {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    let fee_keep = BPS_DENOMINATOR - fee_bps as u128;
    let in_with_fee = match amount_in.checked_mul(fee_keep) {
        Some(v) => v,
        None => return 0,
    };
    let denominator = match reserve_in
        .checked_mul(BPS_DENOMINATOR)
        .and_then(|r| r.checked_add(in_with_fee))
    {
        Some(v) => v,
        None => return 0,
    };
    mul_div_wide(in_with_fee, reserve_out, denominator).unwrap_or(0)
}
