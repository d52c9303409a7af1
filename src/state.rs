//! Everything the engine owns except the router.
//!
//! Kept apart from the router so a swap can borrow both at once: the router
//! gets `&mut EngineState` as its [`LedgerHandle`](crate::exchange::LedgerHandle)
//! and nothing else.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classification::ClassificationRegistry;
use crate::config::EngineConfig;
use crate::distribution::{distribute, CollectorRegistry, Payout};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventLog, PayoutAsset};
use crate::exchange::SwapPath;
use crate::ledger::{AccountLedger, SettlementBook};
use crate::monitor::ProcessingLock;
use crate::pool_registry::PoolRegistry;
use crate::types::{Address, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// The engine's own address; accrued tax is this account's balance.
    pub(crate) token: Address,
    pub(crate) decimals: u32,
    pub(crate) ledger: AccountLedger,
    pub(crate) settlement: SettlementBook,
    pub(crate) classes: ClassificationRegistry,
    pub(crate) config: EngineConfig,
    pub(crate) pools: PoolRegistry,
    pub(crate) collectors: CollectorRegistry,
    #[serde(skip)]
    pub(crate) lock: ProcessingLock,
    #[serde(default)]
    pub(crate) events: EventLog,
    #[serde(default)]
    pub(crate) block_time: u64,
}

impl EngineState {
    pub fn token(&self) -> &Address {
        &self.token
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn settlement(&self) -> &SettlementBook {
        &self.settlement
    }

    pub fn classes(&self) -> &ClassificationRegistry {
        &self.classes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn lock(&self) -> &ProcessingLock {
        &self.lock
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    /// Token balance held by the engine: the accrued, unprocessed fees.
    pub fn accrued_fees(&self) -> Amount {
        self.ledger.balance_of(&self.token)
    }

    /// Settlement proceeds sitting with the engine, not yet paid out.
    pub fn settlement_held(&self) -> Amount {
        self.settlement.balance_of(&self.token)
    }

    pub fn swap_path(&self) -> SwapPath {
        SwapPath::new(self.token.clone(), self.pools.settlement_asset().clone())
    }

    pub(crate) fn record(&mut self, event: EngineEvent) {
        self.events.record(self.block_time, event);
    }

    /// Pay `amount` of the engine's settlement holdings to the collectors.
    /// The split runs on a snapshot of the registry.
    pub(crate) fn pay_settlement(&mut self, amount: Amount) -> EngineResult<Vec<Payout>> {
        let snapshot = self.collectors.snapshot();
        let payouts = distribute(amount, &snapshot)?;
        let engine = self.token.clone();
        for payout in &payouts {
            self.settlement.transfer(&engine, &payout.collector, payout.amount)?;
            self.record(EngineEvent::CollectorPaid {
                collector: payout.collector.clone(),
                amount: payout.amount,
                asset: PayoutAsset::Settlement,
            });
        }
        info!(amount = %amount, collectors = payouts.len(), "settlement proceeds distributed");
        Ok(payouts)
    }

    /// Like [`pay_settlement`](Self::pay_settlement), but an empty registry
    /// keeps the proceeds with the engine instead of failing. Returns the
    /// payouts and the retained amount.
    pub(crate) fn pay_or_retain(&mut self, amount: Amount) -> EngineResult<(Vec<Payout>, Amount)> {
        match self.pay_settlement(amount) {
            Ok(payouts) => Ok((payouts, 0)),
            Err(EngineError::EmptyRegistry) => {
                warn!(amount = %amount, "no collectors registered, proceeds retained");
                self.record(EngineEvent::ProceedsRetained {
                    amount,
                    reason: EngineError::EmptyRegistry.to_string(),
                });
                Ok((Vec::new(), amount))
            }
            Err(e) => Err(e),
        }
    }

    /// Split `amount` accrued tokens straight to the collectors, no swap.
    pub(crate) fn pay_tokens(&mut self, amount: Amount) -> EngineResult<Vec<Payout>> {
        self.ledger.ensure_balance(&self.token, amount)?;
        let snapshot = self.collectors.snapshot();
        let payouts = distribute(amount, &snapshot)?;
        let engine = self.token.clone();
        for payout in &payouts {
            self.ledger.move_balance(&engine, &payout.collector, payout.amount)?;
            self.record(EngineEvent::CollectorPaid {
                collector: payout.collector.clone(),
                amount: payout.amount,
                asset: PayoutAsset::Token,
            });
        }
        info!(amount = %amount, collectors = payouts.len(), "accrued tokens distributed");
        Ok(payouts)
    }
}
