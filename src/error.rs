use std::num::ParseIntError;

use thiserror::Error;

use crate::types::{Address, Amount};

/// Errors raised by the external exchange router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("swap deadline {deadline} expired at block time {now}")]
    Expired { deadline: u64, now: u64 },
    #[error("swap path does not match the pool pair")]
    InvalidPath,
    #[error("pool has insufficient liquidity")]
    InsufficientLiquidity,
    #[error("pool did not receive the declared input amount")]
    InsufficientInputAmount,
    #[error("output {quoted} below minimum {min_out}")]
    InsufficientOutputAmount { quoted: Amount, min_out: Amount },
}

/// Why a conversion of accrued fees did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapFailure {
    #[error("pool reserves are empty")]
    Unfunded,
    #[error("router rejected swap: {0}")]
    Router(#[from] RouterError),
    #[error("router returned {received}, below floor {min_out}")]
    BelowMinimum { received: Amount, min_out: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("insufficient balance in {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },
    #[error("swap failed: {0}")]
    SwapFailed(#[from] SwapFailure),
    #[error("collector registry is empty")]
    EmptyRegistry,
    #[error("collector weights sum to {actual}, expected {expected}")]
    WeightMismatch { expected: u128, actual: u128 },
    #[error("{addresses} collector addresses but {weights} weights")]
    CollectorLengthMismatch { addresses: usize, weights: usize },
    #[error("collector {0} listed more than once")]
    DuplicateCollector(Address),
    #[error("{caller} is not authorized for this operation")]
    Unauthorized { caller: Address },
    #[error("fee rate {bps} bps exceeds 10000")]
    InvalidFeeRate { bps: u32 },
    #[error("threshold divisor must be non-zero")]
    InvalidThresholdDivisor,
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("a fee processing cycle is already running")]
    ProcessingInFlight,
}

/// Why a decimal amount string could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("too many decimal places in {value} (max {max})")]
    TooManyDecimals { value: String, max: u32 },
    #[error("unsupported decimals {0}")]
    UnsupportedDecimals(u32),
    #[error("invalid amount {value}: {source}")]
    Invalid {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("amount {0} overflows")]
    Overflow(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
