//! The fee engine: transfer gate, threshold-triggered processing, and the
//! owner's administrative surface, wrapped around one exchange router.

use tracing::{debug, info, warn};

use crate::classification::ClassificationRegistry;
use crate::config::{EngineConfig, FeeConfiguration, ThresholdPolicy};
use crate::distribution::{CollectorRegistry, Payout};
use crate::error::{EngineError, EngineResult};
use crate::events::{CycleTrigger, EngineEvent, EventLog};
use crate::exchange::ExchangeRouter;
use crate::gate::TransferReceipt;
use crate::ledger::{AccountLedger, SettlementBook};
use crate::monitor::{MonitorDecision, ProcessingLock};
use crate::pool_registry::PoolRegistry;
use crate::state::EngineState;
use crate::swap;
use crate::types::{Address, Amount};

/// Everything needed to stand up a fresh engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParams {
    pub token: Address,
    pub decimals: u32,
    pub total_supply: Amount,
    pub owner: Address,
    pub fee_receiver: Address,
    pub settlement_asset: Address,
    pub buy_fee_bps: u32,
    pub sell_fee_bps: u32,
    pub threshold: ThresholdPolicy,
    /// May be empty; proceeds are then retained until collectors are set.
    pub collectors: Vec<(Address, u32)>,
    /// Most recent events kept; older ones are dropped.
    pub event_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub trigger: CycleTrigger,
    pub tokens_in: Amount,
    pub settlement_received: Amount,
    pub payouts: Vec<Payout>,
    /// Proceeds kept by the engine because no collector was registered.
    pub retained: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the lock; nothing happened.
    Skipped,
    /// Swap or payout failed; the lock was released.
    Failed(EngineError),
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed(_))
    }
}

pub struct FeeEngine<R> {
    state: EngineState,
    router: R,
}

impl<R: ExchangeRouter> FeeEngine<R> {
    /// Mint the supply to the owner, exempt the owner, the engine and the fee
    /// receiver, classify the router's pool, and install the collectors.
    pub fn deploy(params: EngineParams, router: R) -> EngineResult<Self> {
        let fees = FeeConfiguration::new(params.buy_fee_bps, params.sell_fee_bps)?;
        if params.threshold.threshold_divisor == 0 {
            return Err(EngineError::InvalidThresholdDivisor);
        }
        let collectors = if params.collectors.is_empty() {
            CollectorRegistry::default()
        } else {
            let (addresses, weights): (Vec<Address>, Vec<u32>) =
                params.collectors.into_iter().unzip();
            CollectorRegistry::new(&addresses, &weights)?
        };

        let pools = PoolRegistry::new(
            router.address().clone(),
            &params.token,
            params.settlement_asset,
        );
        let mut classes = ClassificationRegistry::default();
        classes.set_exempt(&params.owner, true);
        classes.set_exempt(&params.token, true);
        classes.set_exempt(&params.fee_receiver, true);
        classes.set_pool(pools.pool(), true);

        let mut config = EngineConfig::new(params.owner.clone(), params.fee_receiver);
        config.fees = fees;
        config.threshold = params.threshold;

        info!(
            token = %params.token,
            supply = %params.total_supply,
            owner = %params.owner,
            pool = %pools.pool(),
            collectors = collectors.len(),
            "fee engine deployed"
        );

        let state = EngineState {
            ledger: AccountLedger::with_supply(&params.owner, params.total_supply),
            token: params.token,
            decimals: params.decimals,
            settlement: SettlementBook::default(),
            classes,
            config,
            pools,
            collectors,
            lock: ProcessingLock::default(),
            events: EventLog::with_capacity(params.event_capacity),
            block_time: 0,
        };
        Ok(Self { state, router })
    }
}

impl<R> FeeEngine<R> {
    pub fn from_parts(state: EngineState, router: R) -> Self {
        Self { state, router }
    }

    pub fn into_parts(self) -> (EngineState, R) {
        (self.state, self.router)
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut EngineState, &mut R) {
        (&mut self.state, &mut self.router)
    }

    pub fn token(&self) -> &Address {
        self.state.token()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.state.ledger.balance_of(account)
    }

    pub fn settlement_balance_of(&self, account: &Address) -> Amount {
        self.state.settlement.balance_of(account)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.ledger.total_supply()
    }

    pub fn accrued_fees(&self) -> Amount {
        self.state.accrued_fees()
    }

    pub fn effective_threshold(&self) -> Amount {
        self.state
            .config
            .threshold
            .effective_threshold(self.state.ledger.total_supply())
    }

    pub fn pool(&self) -> &Address {
        self.state.pools.pool()
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    /// Advance the logical clock used for swap deadlines.
    pub fn set_block_time(&mut self, now: u64) {
        self.state.block_time = now;
    }

    pub fn is_processing(&self) -> bool {
        self.state.lock.is_held()
    }
}

impl<R: ExchangeRouter> FeeEngine<R> {
    /// Transfer through the gate; a sell that arms the monitor runs a cycle
    /// on the whole accrued balance. The cycle's outcome never fails the
    /// transfer.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> EngineResult<TransferReceipt> {
        let mut receipt = self.state.transfer(from, to, amount)?;
        if let Some(MonitorDecision::Armed { amount }) = receipt.monitor {
            receipt.cycle = Some(self.run_cycle(amount, 0, CycleTrigger::Auto));
        }
        Ok(receipt)
    }

    /// Lock, convert `amount`, pay the collectors, unlock.
    pub(crate) fn run_cycle(
        &mut self,
        amount: Amount,
        min_out: Amount,
        trigger: CycleTrigger,
    ) -> CycleOutcome {
        if !self.state.lock.try_acquire() {
            debug!(amount = %amount, "processing lock held, cycle skipped");
            return CycleOutcome::Skipped;
        }
        info!(
            amount = %amount,
            min_out = %min_out,
            trigger = ?trigger,
            "fee processing cycle started"
        );

        let outcome = match swap::convert(&mut self.state, &mut self.router, amount, min_out) {
            Ok(received) => {
                self.state.record(EngineEvent::FeesSwapped {
                    trigger,
                    amount,
                    settlement_received: received,
                });
                match self.state.pay_or_retain(received) {
                    Ok((payouts, retained)) => CycleOutcome::Completed(CycleReport {
                        trigger,
                        tokens_in: amount,
                        settlement_received: received,
                        payouts,
                        retained,
                    }),
                    Err(e) => CycleOutcome::Failed(e),
                }
            }
            Err(e) => {
                warn!(amount = %amount, error = %e, trigger = ?trigger, "fee conversion failed");
                self.state.record(EngineEvent::SwapFailed {
                    trigger,
                    amount,
                    reason: e.to_string(),
                });
                CycleOutcome::Failed(e)
            }
        };

        self.state.lock.release();
        if let CycleOutcome::Completed(report) = &outcome {
            info!(
                tokens_in = %report.tokens_in,
                received = %report.settlement_received,
                retained = %report.retained,
                "fee processing cycle finished"
            );
        }
        outcome
    }

    /// Owner-driven cycle on `amount` of the accrued balance.
    pub fn process_fees(
        &mut self,
        caller: &Address,
        amount: Amount,
        min_out: Amount,
    ) -> EngineResult<CycleReport> {
        self.state.config.ensure_admin(caller)?;
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        self.state.ledger.ensure_balance(&self.state.token, amount)?;
        match self.run_cycle(amount, min_out, CycleTrigger::Manual) {
            CycleOutcome::Completed(report) => Ok(report),
            CycleOutcome::Skipped => Err(EngineError::ProcessingInFlight),
            CycleOutcome::Failed(e) => Err(e),
        }
    }

    /// Pay `amount` accrued fees to the collectors: as tokens when
    /// `in_token`, otherwise converted first through a manual cycle.
    pub fn distribute_fees(
        &mut self,
        caller: &Address,
        amount: Amount,
        in_token: bool,
    ) -> EngineResult<Vec<Payout>> {
        self.state.config.ensure_admin(caller)?;
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        if self.state.collectors.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }
        self.state.ledger.ensure_balance(&self.state.token, amount)?;
        if !in_token {
            return self.process_fees(caller, amount, 0).map(|report| report.payouts);
        }
        if self.state.lock.is_held() {
            return Err(EngineError::ProcessingInFlight);
        }
        self.state.pay_tokens(amount)
    }

    /// Pay out settlement proceeds a cycle retained for lack of collectors.
    pub fn distribute_retained(&mut self, caller: &Address) -> EngineResult<Vec<Payout>> {
        self.state.config.ensure_admin(caller)?;
        let held = self.state.settlement_held();
        if held == 0 {
            return Err(EngineError::ZeroAmount);
        }
        if self.state.lock.is_held() {
            return Err(EngineError::ProcessingInFlight);
        }
        self.state.pay_settlement(held)
    }

    pub fn set_fees(
        &mut self,
        caller: &Address,
        buy_fee_bps: u32,
        sell_fee_bps: u32,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.config.fees = FeeConfiguration::new(buy_fee_bps, sell_fee_bps)?;
        info!(buy_fee_bps, sell_fee_bps, "fees updated");
        self.state.record(EngineEvent::FeesUpdated {
            buy_fee_bps,
            sell_fee_bps,
        });
        Ok(())
    }

    pub fn set_exempt(
        &mut self,
        caller: &Address,
        address: &Address,
        exempt: bool,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.classes.set_exempt(address, exempt);
        self.record_classification(address);
        Ok(())
    }

    pub fn set_pool(
        &mut self,
        caller: &Address,
        address: &Address,
        pool: bool,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.classes.set_pool(address, pool);
        self.record_classification(address);
        Ok(())
    }

    fn record_classification(&mut self, address: &Address) {
        let entry = self.state.classes.entry(address);
        info!(
            address = %address,
            exempt = entry.exempt,
            pool = entry.pool,
            "classification changed"
        );
        self.state.record(EngineEvent::ClassificationChanged {
            address: address.clone(),
            exempt: entry.exempt,
            pool: entry.pool,
        });
    }

    pub fn set_auto_process(&mut self, caller: &Address, enabled: bool) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.config.threshold.auto_process_enabled = enabled;
        info!(enabled, "auto-process toggled");
        self.state.record(EngineEvent::AutoProcessChanged { enabled });
        Ok(())
    }

    /// Fixed threshold, or `None` to go back to `supply / divisor`.
    pub fn set_swap_threshold(
        &mut self,
        caller: &Address,
        amount: Option<Amount>,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.config.threshold.swap_amount_override = amount;
        self.record_threshold();
        Ok(())
    }

    pub fn set_threshold_divisor(&mut self, caller: &Address, divisor: u128) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        if divisor == 0 {
            return Err(EngineError::InvalidThresholdDivisor);
        }
        self.state.config.threshold.threshold_divisor = divisor;
        self.record_threshold();
        Ok(())
    }

    fn record_threshold(&mut self) {
        let policy = self.state.config.threshold;
        info!(
            divisor = %policy.threshold_divisor,
            swap_amount = ?policy.swap_amount_override,
            threshold = %self.effective_threshold(),
            "threshold updated"
        );
        self.state.record(EngineEvent::ThresholdChanged {
            divisor: policy.threshold_divisor,
            swap_amount_override: policy.swap_amount_override,
        });
    }

    /// Replace the whole collector list; validated first, so a rejected
    /// list leaves the old one in place.
    pub fn set_collectors(
        &mut self,
        caller: &Address,
        addresses: &[Address],
        weights: &[u32],
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.collectors.replace(addresses, weights)?;
        info!(collectors = addresses.len(), "collectors replaced");
        self.state.record(EngineEvent::CollectorsReplaced {
            collectors: self.state.collectors.snapshot(),
        });
        Ok(())
    }

    /// Swap in `new_router` and its pool; returns the router it replaced.
    ///
    /// The new pool is classified as a pool. The old pool keeps whatever
    /// classification it had; clearing it is up to the owner.
    pub fn migrate_router(&mut self, caller: &Address, new_router: R) -> EngineResult<R> {
        self.state.config.ensure_admin(caller)?;
        if self.state.lock.is_held() {
            return Err(EngineError::ProcessingInFlight);
        }
        let next = self
            .state
            .pools
            .migrated(new_router.address().clone(), &self.state.token);
        let old_router = self.state.pools.router().clone();
        let old_pool = self.state.pools.pool().clone();

        self.state.classes.set_pool(next.pool(), true);
        let event = EngineEvent::RouterMigrated {
            old_router: old_router.clone(),
            new_router: next.router().clone(),
            old_pool: old_pool.clone(),
            new_pool: next.pool().clone(),
        };
        info!(
            old_router = %old_router,
            new_router = %next.router(),
            old_pool = %old_pool,
            new_pool = %next.pool(),
            "router migrated"
        );
        self.state.pools = next;
        self.state.record(event);
        Ok(std::mem::replace(&mut self.router, new_router))
    }

    pub fn set_liquidity_owner(
        &mut self,
        caller: &Address,
        liquidity_owner: &Address,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        self.state.config.liquidity_owner = liquidity_owner.clone();
        info!(liquidity_owner = %liquidity_owner, "liquidity owner changed");
        self.state.record(EngineEvent::LiquidityOwnerChanged {
            liquidity_owner: liquidity_owner.clone(),
        });
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: &Address,
    ) -> EngineResult<()> {
        self.state.config.ensure_admin(caller)?;
        let previous = std::mem::replace(&mut self.state.config.owner, new_owner.clone());
        info!(previous = %previous, owner = %new_owner, "ownership transferred");
        self.state.record(EngineEvent::OwnershipTransferred {
            previous,
            owner: new_owner.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::sim::SimulatedPool;

    const DECIMALS: u32 = 9;
    const UNIT: Amount = 1_000_000_000;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn params() -> EngineParams {
        EngineParams {
            token: addr("0xtoken"),
            decimals: DECIMALS,
            total_supply: 1_000_000 * UNIT,
            owner: addr("0xowner"),
            fee_receiver: addr("0xfees"),
            settlement_asset: addr("0xweth"),
            buy_fee_bps: 500,
            sell_fee_bps: 500,
            threshold: ThresholdPolicy::default(),
            collectors: vec![(addr("0xc1"), 70), (addr("0xc2"), 30)],
            event_capacity: 16,
        }
    }

    fn engine() -> FeeEngine<SimulatedPool> {
        let router = SimulatedPool::new(addr("0xrouter"), addr("0xtoken"), addr("0xweth"));
        FeeEngine::deploy(params(), router).unwrap()
    }

    #[test]
    fn deploy_mints_and_classifies() {
        let e = engine();
        assert_eq!(e.balance_of(&addr("0xowner")), 1_000_000 * UNIT);
        let classes = e.state().classes();
        assert!(classes.is_exempt(&addr("0xowner")));
        assert!(classes.is_exempt(&addr("0xtoken")));
        assert!(classes.is_exempt(&addr("0xfees")));
        assert!(classes.is_pool(e.pool()));
        assert_eq!(e.pool(), e.router().pool_address());
        assert_eq!(e.effective_threshold(), 100 * UNIT);
    }

    #[test]
    fn deploy_rejects_bad_weights() {
        let mut p = params();
        p.collectors = vec![(addr("0xc1"), 70)];
        let router = SimulatedPool::new(addr("0xrouter"), addr("0xtoken"), addr("0xweth"));
        assert!(matches!(
            FeeEngine::deploy(p, router),
            Err(EngineError::WeightMismatch { .. })
        ));
    }

    #[test]
    fn admin_surface_is_owner_only() {
        let mut e = engine();
        let stranger = addr("0xstranger");
        assert!(matches!(
            e.set_fees(&stranger, 100, 100),
            Err(EngineError::Unauthorized { .. })
        ));
        assert!(e.set_auto_process(&stranger, false).is_err());
        assert!(e.set_exempt(&stranger, &stranger, true).is_err());
        assert!(!e.state().classes().is_exempt(&stranger));
        assert!(e.process_fees(&stranger, 1, 0).is_err());
    }

    #[test]
    fn fee_rate_and_divisor_are_validated() {
        let mut e = engine();
        let owner = addr("0xowner");
        assert_eq!(
            e.set_fees(&owner, 10_001, 0),
            Err(EngineError::InvalidFeeRate { bps: 10_001 })
        );
        assert_eq!(e.state().config().fees.buy_fee_bps, 500);
        assert_eq!(
            e.set_threshold_divisor(&owner, 0),
            Err(EngineError::InvalidThresholdDivisor)
        );
        e.set_threshold_divisor(&owner, 1_000).unwrap();
        assert_eq!(e.effective_threshold(), 1_000 * UNIT);
        e.set_swap_threshold(&owner, Some(5 * UNIT)).unwrap();
        assert_eq!(e.effective_threshold(), 5 * UNIT);
        e.set_swap_threshold(&owner, None).unwrap();
        assert_eq!(e.effective_threshold(), 1_000 * UNIT);
    }

    #[test]
    fn rejected_collector_list_keeps_the_old_one() {
        let mut e = engine();
        let owner = addr("0xowner");
        let err = e
            .set_collectors(&owner, &[addr("0xa"), addr("0xa")], &[50, 50])
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateCollector(addr("0xa")));
        assert_eq!(e.state().collectors().len(), 2);
    }

    #[test]
    fn process_fees_checks_amount() {
        let mut e = engine();
        let owner = addr("0xowner");
        assert_eq!(e.process_fees(&owner, 0, 0), Err(EngineError::ZeroAmount));
        assert!(matches!(
            e.process_fees(&owner, 1, 0),
            Err(EngineError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn manual_cycle_on_unfunded_pool_restores_balance() {
        let mut e = engine();
        let owner = addr("0xowner");
        e.transfer(&owner, &addr("0xtoken"), 10 * UNIT).unwrap();
        let err = e.process_fees(&owner, 10 * UNIT, 0).unwrap_err();
        assert!(matches!(err, EngineError::SwapFailed(crate::error::SwapFailure::Unfunded)));
        assert_eq!(e.accrued_fees(), 10 * UNIT);
        assert!(!e.is_processing());
    }

    #[test]
    fn ownership_moves_the_admin_gate() {
        let mut e = engine();
        let owner = addr("0xowner");
        let next = addr("0xnext");
        e.transfer_ownership(&owner, &next).unwrap();
        assert!(e.set_auto_process(&owner, false).is_err());
        e.set_auto_process(&next, false).unwrap();
        assert!(!e.state().config().threshold.auto_process_enabled);
        e.set_liquidity_owner(&next, &addr("0xlp")).unwrap();
        assert_eq!(e.state().config().liquidity_owner, addr("0xlp"));
    }
}
