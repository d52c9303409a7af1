//! Shared primitives: addresses, amounts and unit helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::UnitsError;

/// Token and settlement amounts in base units.
pub type Amount = u128;

/// Fee rates are expressed in hundredths of a percent.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Collector weights always add up to this total.
pub const COLLECTOR_WEIGHT_TOTAL: u128 = 100;

/// Supply divided by this yields the auto-process threshold (0.01% of supply).
pub const DEFAULT_THRESHOLD_DIVISOR: u128 = 10_000;

/// Default token decimals (1 token = 1e9 base units)
pub const DEFAULT_DECIMALS: u32 = 9;

/// Engine events kept in memory and in each snapshot.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Window added to the block time when the engine swaps through the router.
pub const SWAP_DEADLINE_SECS: u64 = 300;

/// Account identifier. Normalized to lowercase so "0xAB.." and "0xab.." are
/// the same account.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::new(s)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address::new(s)
    }
}

/// floor(a * b / d) over a 256-bit product; 0 when `d` is zero. Saturates
/// at `u128::MAX` only when the quotient itself does not fit, which cannot
/// happen while `b <= d` (fee rates and collector weights).
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    mul_div_wide(a, b, d).unwrap_or(u128::MAX)
}

/// floor(a * b / d) with a 256-bit intermediate product. `None` when `d` is
/// zero or the quotient does not fit in 128 bits.
pub fn mul_div_wide(a: u128, b: u128, d: u128) -> Option<u128> {
    const MASK: u128 = u64::MAX as u128;
    if d == 0 {
        return None;
    }
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);
    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;
    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (ll & MASK) | (mid << 64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    if hi >= d {
        return None;
    }

    // restoring long division of (hi, lo) by d; rem < d throughout
    let mut rem = hi;
    let mut quot: u128 = 0;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        quot <<= 1;
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1;
        }
    }
    Some(quot)
}

/// Parse a decimal string such as "1000.5" into base units.
pub fn parse_units(value: &str, decimals: u32) -> Result<Amount, UnitsError> {
    let value = value.trim().replace('_', "");
    if value.is_empty() {
        return Err(UnitsError::Empty);
    }
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value.as_str(), ""),
    };
    if frac.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals {
            value: value.clone(),
            max: decimals,
        });
    }
    let scale = 10u128
        .checked_pow(decimals)
        .ok_or(UnitsError::UnsupportedDecimals(decimals))?;
    let invalid = |source| UnitsError::Invalid {
        value: value.clone(),
        source,
    };
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(invalid)?
    };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(invalid)?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(|| UnitsError::Overflow(value.clone()))
}

/// Render base units as a decimal string, trimming trailing zeros.
pub fn format_units(amount: Amount, decimals: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
