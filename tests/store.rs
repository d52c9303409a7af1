//! sled persistence round trips.

mod common;

use common::*;
use drvn_ledger::{EngineStore, FeeEngine, SimulatedPool};

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = funded_engine(collectors());
    let alice = addr("0xalice");
    fund(&mut engine, &alice, 5_000_000 * UNIT);
    engine.set_block_time(1_700_000_000);
    engine.sell(&alice, 2_000_000 * UNIT, 0).unwrap();
    engine.set_fees(&owner(), 200, 700).unwrap();
    engine.set_exempt(&owner(), &addr("0xpartner"), true).unwrap();

    {
        let store = EngineStore::open(dir.path()).unwrap();
        assert!(!store.is_initialized().unwrap());
        store.save(&engine).unwrap();
        assert!(store.is_initialized().unwrap());
    }

    let store = EngineStore::open(dir.path()).unwrap();
    let loaded: FeeEngine<SimulatedPool> = store.load().unwrap().expect("saved engine");
    assert_eq!(loaded.state(), engine.state());
    assert_eq!(loaded.router(), engine.router());
    assert_eq!(loaded.balance_of(&alice), engine.balance_of(&alice));
    assert_eq!(loaded.state().config().fees.sell_fee_bps, 700);
    assert!(loaded.state().classes().is_exempt(&addr("0xpartner")));
    assert_eq!(loaded.state().collectors().len(), 3);
    assert_eq!(loaded.events().len(), engine.events().len());
    assert!(!loaded.is_processing());
}

#[test]
fn test_empty_store_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = EngineStore::open(dir.path()).unwrap();
    let loaded: Option<FeeEngine<SimulatedPool>> = store.load().unwrap();
    assert!(loaded.is_none());
}

#[test]
fn test_loaded_engine_keeps_trading() {
    let dir = tempfile::tempdir().unwrap();
    let engine = funded_engine(collectors());
    let store = EngineStore::open(dir.path()).unwrap();
    store.save(&engine).unwrap();

    let mut engine: FeeEngine<SimulatedPool> = store.load().unwrap().unwrap();
    let alice = addr("0xalice");
    fund(&mut engine, &alice, 3_000_000 * UNIT);
    let trade = engine.sell(&alice, 2_000_000 * UNIT, 0).unwrap();
    assert!(trade.transfer.cycle.is_some());
    assert!(engine.settlement_balance_of(&addr("0xc1")) > 0);
}

#[test]
fn test_snapshot_keeps_only_recent_events() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = params(collectors());
    p.event_capacity = 8;
    let mut engine = FeeEngine::deploy(p, sim_router("0xrouter")).unwrap();
    let alice = addr("0xalice");
    for _ in 0..50 {
        fund(&mut engine, &alice, UNIT);
    }
    assert_eq!(engine.events().len(), 8);
    assert_eq!(engine.events().total_recorded(), 50);

    let store = EngineStore::open(dir.path()).unwrap();
    store.save(&engine).unwrap();
    let mut loaded: FeeEngine<SimulatedPool> = store.load().unwrap().unwrap();
    assert_eq!(loaded.events().len(), 8);
    assert_eq!(loaded.events().records()[0].seq, 42);

    fund(&mut loaded, &alice, UNIT);
    assert_eq!(loaded.events().len(), 8);
    assert_eq!(loaded.events().last(1)[0].seq, 50);
}
