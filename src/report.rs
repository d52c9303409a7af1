//! Point-in-time status of the engine, for the CLI and for operators.

use serde::Serialize;
use std::fmt::Write;

use crate::distribution::Collector;
use crate::engine::FeeEngine;
use crate::exchange::{ExchangeRouter, Reserves};
use crate::monitor::progress_bps;
use crate::types::{format_units, Address, Amount};

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub token: Address,
    pub decimals: u32,
    pub total_supply: Amount,
    pub accrued_fees: Amount,
    pub threshold: Amount,
    pub progress_bps: u128,
    pub threshold_reached: bool,
    pub auto_process: bool,
    pub threshold_divisor: u128,
    pub swap_amount_override: Option<Amount>,
    pub buy_fee_bps: u32,
    pub sell_fee_bps: u32,
    pub owner: Address,
    pub liquidity_owner: Address,
    pub fee_receiver: Address,
    pub router: Address,
    pub pool: Address,
    pub settlement_asset: Address,
    pub reserves: Reserves,
    pub pool_funded: bool,
    pub settlement_held: Amount,
    pub collectors: Vec<Collector>,
    /// Pool-classified addresses other than the current pool, e.g. the pool
    /// of a router that was migrated away from.
    pub other_pools: Vec<Address>,
    pub processing: bool,
    /// Events retained in the bounded log.
    pub events: usize,
    pub events_recorded: u64,
}

impl<R: ExchangeRouter> FeeEngine<R> {
    pub fn status(&self) -> EngineStatus {
        let state = self.state();
        let config = state.config();
        let accrued = state.accrued_fees();
        let threshold = self.effective_threshold();
        let reserves = self.router().get_reserves();
        let pool = state.pools().pool().clone();
        let other_pools = state
            .classes()
            .pools()
            .into_iter()
            .filter(|p| *p != pool)
            .collect();

        EngineStatus {
            token: state.token().clone(),
            decimals: state.decimals(),
            total_supply: state.ledger().total_supply(),
            accrued_fees: accrued,
            threshold,
            progress_bps: progress_bps(accrued, threshold),
            threshold_reached: accrued > 0 && accrued >= threshold,
            auto_process: config.threshold.auto_process_enabled,
            threshold_divisor: config.threshold.threshold_divisor,
            swap_amount_override: config.threshold.swap_amount_override,
            buy_fee_bps: config.fees.buy_fee_bps,
            sell_fee_bps: config.fees.sell_fee_bps,
            owner: config.owner.clone(),
            liquidity_owner: config.liquidity_owner.clone(),
            fee_receiver: config.fee_receiver.clone(),
            router: state.pools().router().clone(),
            pool,
            settlement_asset: state.pools().settlement_asset().clone(),
            pool_funded: reserves.is_funded(),
            reserves,
            settlement_held: state.settlement_held(),
            collectors: state.collectors().snapshot(),
            other_pools,
            processing: state.lock().is_held(),
            events: state.events().len(),
            events_recorded: state.events().total_recorded(),
        }
    }
}

impl EngineStatus {
    /// Human-readable multi-line summary. Settlement amounts are shown in
    /// base units since the engine does not know the asset's decimals.
    pub fn render(&self) -> String {
        let d = self.decimals;
        let mut out = String::new();
        let _ = writeln!(out, "token            {}", self.token);
        let _ = writeln!(out, "total supply     {}", format_units(self.total_supply, d));
        let _ = writeln!(out, "fees (buy/sell)  {} / {} bps", self.buy_fee_bps, self.sell_fee_bps);
        let _ = writeln!(
            out,
            "accrued          {} ({:.2}% of threshold {})",
            format_units(self.accrued_fees, d),
            self.progress_bps as f64 / 100.0,
            format_units(self.threshold, d)
        );
        let _ = writeln!(
            out,
            "auto-process     {}{}",
            if self.auto_process { "enabled" } else { "disabled" },
            if self.threshold_reached { " (threshold reached)" } else { "" }
        );
        match self.swap_amount_override {
            Some(amount) => {
                let _ = writeln!(out, "threshold        fixed at {}", format_units(amount, d));
            }
            None => {
                let _ = writeln!(out, "threshold        supply / {}", self.threshold_divisor);
            }
        }
        let _ = writeln!(out, "owner            {}", self.owner);
        let _ = writeln!(out, "liquidity owner  {}", self.liquidity_owner);
        let _ = writeln!(out, "fee receiver     {}", self.fee_receiver);
        let _ = writeln!(out, "router           {}", self.router);
        let _ = writeln!(out, "pool             {}", self.pool);
        let _ = writeln!(
            out,
            "reserves         {} token / {} settlement{}",
            format_units(self.reserves.token, d),
            self.reserves.settlement,
            if self.pool_funded { "" } else { " (unfunded)" }
        );
        for p in &self.other_pools {
            let _ = writeln!(out, "also a pool      {}", p);
        }
        let _ = writeln!(out, "settlement held  {}", self.settlement_held);
        if self.collectors.is_empty() {
            let _ = writeln!(out, "collectors       none");
        }
        for c in &self.collectors {
            let _ = writeln!(out, "collector        {} ({}%)", c.address, c.weight);
        }
        let _ = writeln!(
            out,
            "events           {} kept, {} recorded",
            self.events, self.events_recorded
        );
        out
    }
}
