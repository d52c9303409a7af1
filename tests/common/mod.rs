//! Shared setup for the integration tests.

#![allow(dead_code)]

use drvn_ledger::{
    Address, Amount, EngineParams, ExchangeRouter, FeeEngine, SimulatedPool, ThresholdPolicy,
    DEFAULT_EVENT_CAPACITY,
};

pub const UNIT: Amount = 1_000_000_000;
pub const SUPPLY: Amount = 1_000_000_000 * UNIT;
/// supply / 10_000
pub const THRESHOLD: Amount = 100_000 * UNIT;
pub const SETTLEMENT_DEPTH: Amount = 1_000 * 10u128.pow(18);

pub fn addr(s: &str) -> Address {
    Address::new(s)
}

pub fn owner() -> Address {
    addr("0xowner")
}

pub fn token() -> Address {
    addr("0xtoken")
}

pub fn weth() -> Address {
    addr("0xweth")
}

pub fn collectors() -> Vec<(Address, u32)> {
    vec![(addr("0xc1"), 60), (addr("0xc2"), 30), (addr("0xc3"), 10)]
}

pub fn params(collectors: Vec<(Address, u32)>) -> EngineParams {
    EngineParams {
        token: token(),
        decimals: 9,
        total_supply: SUPPLY,
        owner: owner(),
        fee_receiver: addr("0xfees"),
        settlement_asset: weth(),
        buy_fee_bps: 500,
        sell_fee_bps: 500,
        threshold: ThresholdPolicy::default(),
        collectors,
        event_capacity: DEFAULT_EVENT_CAPACITY,
    }
}

pub fn sim_router(router: &str) -> SimulatedPool {
    SimulatedPool::new(addr(router), token(), weth())
}

/// Deployed engine with 10% of supply and `SETTLEMENT_DEPTH` in the pool.
pub fn funded_engine(collectors: Vec<(Address, u32)>) -> FeeEngine<SimulatedPool> {
    let mut engine = FeeEngine::deploy(params(collectors), sim_router("0xrouter")).unwrap();
    engine
        .add_liquidity(&owner(), SUPPLY / 10, SETTLEMENT_DEPTH)
        .unwrap();
    engine
}

/// Give `to` settlement asset to buy with.
pub fn fund_settlement(engine: &mut FeeEngine<SimulatedPool>, to: &Address, amount: Amount) {
    engine.deposit_settlement(to, amount).unwrap();
}

/// Hand `amount` tokens from the owner to `to`, untaxed.
pub fn fund<R: ExchangeRouter>(engine: &mut FeeEngine<R>, to: &Address, amount: Amount) {
    engine.transfer(&owner(), to, amount).unwrap();
}
