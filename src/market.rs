//! Trading against the simulated pool: liquidity, buys and sells routed
//! through the transfer gate the same way a real pair would route them.

use tracing::{debug, info};

use crate::engine::FeeEngine;
use crate::error::{EngineError, EngineResult, RouterError, SwapFailure};
use crate::events::EngineEvent;
use crate::exchange::sim::SimulatedPool;
use crate::gate::TransferReceipt;
use crate::state::EngineState;
use crate::types::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeReceipt {
    pub transfer: TransferReceipt,
    /// Settlement paid in (buy) or received (sell).
    pub settlement: Amount,
    /// Tokens the trader received (buy) or sent (sell), after tax.
    pub tokens: Amount,
}

fn trade_failed(e: RouterError) -> EngineError {
    EngineError::SwapFailed(SwapFailure::Router(e))
}

impl FeeEngine<SimulatedPool> {
    /// Deposit `tokens` from `provider` into the pool and add `settlement`
    /// to the settlement reserve. The token leg goes through the gate, so a
    /// non-exempt provider pays sell tax on it. The settlement leg arrives
    /// from outside the ledger.
    pub fn add_liquidity(
        &mut self,
        provider: &Address,
        tokens: Amount,
        settlement: Amount,
    ) -> EngineResult<TransferReceipt> {
        if tokens == 0 || settlement == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let pool = self.pool().clone();
        let receipt = self.transfer(provider, &pool, tokens)?;
        let (state, router) = self.parts_mut();
        router.sync_liquidity(&*state, settlement);
        state.record(EngineEvent::LiquidityAdded {
            provider: provider.clone(),
            tokens: receipt.net,
            settlement,
        });
        info!(
            provider = %provider,
            tokens = %receipt.net,
            settlement = %settlement,
            "liquidity added"
        );
        Ok(receipt)
    }

    /// Bring settlement asset from outside the ledger into `account`'s
    /// settlement balance, so it can pay for buys.
    pub fn deposit_settlement(&mut self, account: &Address, amount: Amount) -> EngineResult<()> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let (state, _) = self.parts_mut();
        state.settlement.credit(account, amount);
        state.record(EngineEvent::SettlementDeposited {
            account: account.clone(),
            amount,
        });
        debug!(account = %account, amount = %amount, "settlement deposited");
        Ok(())
    }

    /// Pay `settlement_in` from the trader's settlement balance for tokens.
    /// `min_tokens_out` bounds what the trader ends up holding, after buy
    /// tax; below it nothing happens.
    pub fn buy(
        &mut self,
        trader: &Address,
        settlement_in: Amount,
        min_tokens_out: Amount,
    ) -> EngineResult<TradeReceipt> {
        if settlement_in == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let checkpoint = (self.state().clone(), self.router().clone());
        self.parts_mut().0.settlement.debit(trader, settlement_in)?;
        let gross = match self.router_mut().swap_settlement_for_tokens(settlement_in, 0) {
            Ok(gross) => gross,
            Err(e) => {
                self.restore(checkpoint);
                return Err(trade_failed(e));
            }
        };

        let pool = self.pool().clone();
        let receipt = match self.transfer(&pool, trader, gross) {
            Ok(r) if r.net >= min_tokens_out => r,
            Ok(r) => {
                self.restore(checkpoint);
                return Err(trade_failed(RouterError::InsufficientOutputAmount {
                    quoted: r.net,
                    min_out: min_tokens_out,
                }));
            }
            Err(e) => {
                self.restore(checkpoint);
                return Err(e);
            }
        };
        debug!(
            trader = %trader,
            settlement_in = %settlement_in,
            tokens = %receipt.net,
            "buy filled"
        );
        Ok(TradeReceipt {
            tokens: receipt.net,
            settlement: settlement_in,
            transfer: receipt,
        })
    }

    /// Sell `amount` tokens for at least `min_settlement_out`. If the pool
    /// cannot meet the floor the whole sell is rolled back, including any
    /// cycle it triggered.
    pub fn sell(
        &mut self,
        trader: &Address,
        amount: Amount,
        min_settlement_out: Amount,
    ) -> EngineResult<TradeReceipt> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let checkpoint = (self.state().clone(), self.router().clone());
        let pool = self.pool().clone();
        let receipt = self.transfer(trader, &pool, amount)?;

        let (state, router) = self.parts_mut();
        match router.settle_token_input(&*state, receipt.net, min_settlement_out) {
            Ok(out) => {
                state.settlement.credit(trader, out);
                debug!(
                    trader = %trader,
                    tokens = %receipt.net,
                    settlement_out = %out,
                    "sell filled"
                );
                Ok(TradeReceipt {
                    tokens: receipt.net,
                    settlement: out,
                    transfer: receipt,
                })
            }
            Err(e) => {
                self.restore(checkpoint);
                Err(trade_failed(e))
            }
        }
    }

    fn restore(&mut self, (state, router): (EngineState, SimulatedPool)) {
        *self = FeeEngine::from_parts(state, router);
    }
}
