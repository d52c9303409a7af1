//! Fee-on-transfer token ledger with threshold-triggered fee processing.
//!
//! Every transfer goes through a gate that classifies both sides. Sells into
//! and buys out of a registered pool are taxed; the tax accrues to the engine's
//! own account. When a sell leaves the accrued balance at or above the
//! threshold, the engine swaps it for the settlement asset through its router
//! and splits the proceeds across weighted collectors.
//!
//! [`FeeEngine`] is the entry point. Routers implement [`ExchangeRouter`];
//! [`SimulatedPool`] is a constant-product stand-in used by the CLI and tests.

pub mod classification;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod events;
pub mod exchange;
pub mod gate;
pub mod ledger;
pub mod market;
pub mod monitor;
pub mod pool_registry;
pub mod report;
pub mod state;
pub mod store;
pub mod swap;
pub mod types;

pub use classification::{Classification, ClassificationRegistry};
pub use config::{
    load_deployment, DeploymentConfig, EngineConfig, FeeConfiguration, ThresholdPolicy,
};
pub use distribution::{distribute, Collector, CollectorRegistry, Payout};
pub use engine::{CycleOutcome, CycleReport, EngineParams, FeeEngine};
pub use error::{EngineError, EngineResult, RouterError, SwapFailure, UnitsError};
pub use events::{CycleTrigger, EngineEvent, EventLog, EventRecord, PayoutAsset};
pub use exchange::sim::SimulatedPool;
pub use exchange::{ExchangeRouter, LedgerHandle, Reserves, SwapPath};
pub use gate::{TransferKind, TransferReceipt};
pub use market::TradeReceipt;
pub use monitor::{MonitorDecision, ProcessingLock};
pub use report::EngineStatus;
pub use state::EngineState;
pub use store::EngineStore;
pub use types::{
    format_units, mul_div_floor, parse_units, Address, Amount, DEFAULT_EVENT_CAPACITY,
};
