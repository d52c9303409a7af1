//! Seam to the external exchange.
//!
//! The engine only needs a narrow capability from the pool: read reserves,
//! quote an exact-in swap, and perform it with a minimum output. Anything that
//! implements [`ExchangeRouter`] can stand behind the engine; [`sim`] holds an
//! in-process constant-product double used by the CLI and tests.

pub mod sim;

use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, RouterError};
use crate::gate::TransferReceipt;
use crate::types::{Address, Amount};

/// Fixed two-hop route: accrued token in, settlement asset out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPath {
    pub input: Address,
    pub output: Address,
}

impl SwapPath {
    pub fn new(input: Address, output: Address) -> Self {
        Self { input, output }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub token: Amount,
    pub settlement: Amount,
}

impl Reserves {
    pub fn is_funded(&self) -> bool {
        self.token > 0 && self.settlement > 0
    }
}

/// What a router may touch on the token ledger while it settles a swap.
///
/// Transfers made through this handle go through the transfer gate like any
/// other transfer; they can never start a fee processing cycle.
pub trait LedgerHandle {
    fn token(&self) -> &Address;
    fn balance_of(&self, account: &Address) -> Amount;
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> EngineResult<TransferReceipt>;
    fn block_time(&self) -> u64;
}

pub trait ExchangeRouter {
    fn address(&self) -> &Address;

    fn get_reserves(&self) -> Reserves;

    /// Read-only quote for an exact-in swap along `path`.
    fn get_amounts_out(&self, amount_in: Amount, path: &SwapPath) -> Result<Amount, RouterError>;

    /// Swap `amount_in` tokens, already delivered to the pool, for at least
    /// `min_out` settlement units owed to `recipient`; returns the amount out.
    /// Fails without side effects when the output floor or the deadline
    /// cannot be met.
    fn swap_exact_tokens_for_settlement(
        &mut self,
        ledger: &mut dyn LedgerHandle,
        amount_in: Amount,
        min_out: Amount,
        path: &SwapPath,
        recipient: &Address,
        deadline: u64,
    ) -> Result<Amount, RouterError>;
}
