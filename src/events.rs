//! Record of what the engine did, for inspection and audits.
//!
//! The log is append-only but bounded: once it holds `capacity` records the
//! oldest are dropped. Sequence numbers keep counting across drops.

use serde::{Deserialize, Serialize};

use crate::distribution::Collector;
use crate::gate::TransferKind;
use crate::types::{Address, Amount, DEFAULT_EVENT_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleTrigger {
    /// Started by a sell that found the accrued balance over the threshold.
    Auto,
    /// Started by the owner through `process_fees` / `distribute_fees`.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutAsset {
    Token,
    Settlement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEvent {
    Transfer {
        from: Address,
        to: Address,
        amount: Amount,
        tax: Amount,
        kind: TransferKind,
    },
    FeesSwapped {
        trigger: CycleTrigger,
        amount: Amount,
        settlement_received: Amount,
    },
    SwapFailed {
        trigger: CycleTrigger,
        amount: Amount,
        reason: String,
    },
    CollectorPaid {
        collector: Address,
        amount: Amount,
        asset: PayoutAsset,
    },
    ProceedsRetained {
        amount: Amount,
        reason: String,
    },
    FeesUpdated {
        buy_fee_bps: u32,
        sell_fee_bps: u32,
    },
    ClassificationChanged {
        address: Address,
        exempt: bool,
        pool: bool,
    },
    AutoProcessChanged {
        enabled: bool,
    },
    ThresholdChanged {
        divisor: u128,
        swap_amount_override: Option<Amount>,
    },
    CollectorsReplaced {
        collectors: Vec<Collector>,
    },
    RouterMigrated {
        old_router: Address,
        new_router: Address,
        old_pool: Address,
        new_pool: Address,
    },
    OwnershipTransferred {
        previous: Address,
        owner: Address,
    },
    LiquidityOwnerChanged {
        liquidity_owner: Address,
    },
    SettlementDeposited {
        account: Address,
        amount: Amount,
    },
    LiquidityAdded {
        provider: Address,
        tokens: Amount,
        settlement: Amount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub block_time: u64,
    pub event: EngineEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    next_seq: u64,
    records: Vec<EventRecord>,
}

fn default_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventLog {
    /// Keep at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_seq: 0,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, block_time: u64, event: EngineEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push(EventRecord {
            seq,
            block_time,
            event,
        });
        if self.records.len() > self.capacity {
            let excess = self.records.len() - self.capacity;
            self.records.drain(..excess);
        }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records currently retained.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records ever written, including the dropped ones.
    pub fn total_recorded(&self) -> u64 {
        self.next_seq
    }

    pub fn last(&self, n: usize) -> &[EventRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }
}
