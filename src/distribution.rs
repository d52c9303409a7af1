//! Collector registry and the weighted payout split.
//!
//! Each share is floored, and the rounding dust left over goes to the last
//! entry so the whole amount is paid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EngineError, EngineResult};
use crate::types::{mul_div_floor, Address, Amount, COLLECTOR_WEIGHT_TOTAL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collector {
    pub address: Address,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub collector: Address,
    pub amount: Amount,
}

/// Ordered collectors. Never edited in place: `replace` validates a new list
/// and swaps it in whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorRegistry {
    collectors: Vec<Collector>,
}

impl CollectorRegistry {
    pub fn new(addresses: &[Address], weights: &[u32]) -> EngineResult<Self> {
        let mut registry = Self::default();
        registry.replace(addresses, weights)?;
        Ok(registry)
    }

    /// Validate `addresses`/`weights` and install them. On error the current
    /// list is left as it was.
    pub fn replace(&mut self, addresses: &[Address], weights: &[u32]) -> EngineResult<()> {
        if addresses.len() != weights.len() {
            return Err(EngineError::CollectorLengthMismatch {
                addresses: addresses.len(),
                weights: weights.len(),
            });
        }
        let total: u128 = weights.iter().map(|w| *w as u128).sum();
        if total != COLLECTOR_WEIGHT_TOTAL {
            return Err(EngineError::WeightMismatch {
                expected: COLLECTOR_WEIGHT_TOTAL,
                actual: total,
            });
        }
        let mut seen = BTreeSet::new();
        for address in addresses {
            if !seen.insert(address) {
                return Err(EngineError::DuplicateCollector(address.clone()));
            }
        }

        self.collectors = addresses
            .iter()
            .zip(weights)
            .map(|(address, weight)| Collector {
                address: address.clone(),
                weight: *weight,
            })
            .collect();
        Ok(())
    }

    pub fn collectors(&self) -> &[Collector] {
        &self.collectors
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Copy of the current list; a distribution works on this and never
    /// sees a later replacement.
    pub fn snapshot(&self) -> Vec<Collector> {
        self.collectors.clone()
    }
}

/// Split `amount` across `collectors` by weight.
///
/// `payout_i = floor(amount * weight_i / total_weight)`; the remainder left by
/// flooring is added to the last collector.
pub fn distribute(amount: Amount, collectors: &[Collector]) -> EngineResult<Vec<Payout>> {
    let last = collectors.last().ok_or(EngineError::EmptyRegistry)?;
    let total_weight: u128 = collectors.iter().map(|c| c.weight as u128).sum();
    if total_weight == 0 {
        return Err(EngineError::WeightMismatch {
            expected: COLLECTOR_WEIGHT_TOTAL,
            actual: 0,
        });
    }

    let mut payouts: Vec<Payout> = collectors
        .iter()
        .map(|c| Payout {
            collector: c.address.clone(),
            amount: mul_div_floor(amount, c.weight as u128, total_weight),
        })
        .collect();

    let paid: Amount = payouts.iter().map(|p| p.amount).sum();
    let dust = amount - paid;
    if dust > 0 {
        if let Some(p) = payouts.last_mut() {
            p.amount += dust;
        }
        tracing::debug!(
            collector = %last.address,
            dust = %dust,
            "rounding remainder to last collector"
        );
    }
    Ok(payouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(n: usize) -> Vec<Address> {
        (0..n).map(|i| Address::new(format!("0xc{}", i))).collect()
    }

    #[test]
    fn remainder_goes_to_last_collector() {
        let registry = CollectorRegistry::new(&addrs(3), &[60, 30, 10]).unwrap();
        let payouts = distribute(101, registry.collectors()).unwrap();
        let amounts: Vec<Amount> = payouts.iter().map(|p| p.amount).collect();
        assert_eq!(amounts, vec![60, 30, 11]);
    }

    #[test]
    fn payouts_always_sum_to_amount() {
        let registry = CollectorRegistry::new(&addrs(3), &[33, 33, 34]).unwrap();
        for amount in [0u128, 1, 2, 99, 100, 101, 12_345_678_901] {
            let payouts = distribute(amount, registry.collectors()).unwrap();
            assert_eq!(payouts.iter().map(|p| p.amount).sum::<Amount>(), amount);
        }
    }

    #[test]
    fn large_amounts_split_by_weight() {
        let registry = CollectorRegistry::new(&addrs(2), &[60, 40]).unwrap();
        let amount = u128::MAX / 2;
        let payouts = distribute(amount, registry.collectors()).unwrap();
        assert_eq!(
            payouts[0].amount,
            102_084_710_076_281_539_039_012_382_229_530_463_436
        );
        assert_eq!(payouts[1].amount, amount - payouts[0].amount);
        assert_eq!(payouts[1].amount, amount / 5 * 2 + 1);
    }

    #[test]
    fn empty_registry_is_an_error() {
        let registry = CollectorRegistry::default();
        assert_eq!(
            distribute(10, registry.collectors()).unwrap_err(),
            EngineError::EmptyRegistry
        );
    }

    #[test]
    fn bad_replacement_keeps_old_registry() {
        let mut registry = CollectorRegistry::new(&addrs(1), &[100]).unwrap();
        let before = registry.clone();

        let err = registry.replace(&addrs(2), &[50, 49]).unwrap_err();
        assert_eq!(
            err,
            EngineError::WeightMismatch {
                expected: 100,
                actual: 99
            }
        );
        assert_eq!(registry, before);

        let err = registry.replace(&addrs(2), &[100]).unwrap_err();
        assert!(matches!(err, EngineError::CollectorLengthMismatch { .. }));

        let dup = vec![Address::new("0xc0"), Address::new("0xC0")];
        let err = registry.replace(&dup, &[50, 50]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateCollector(_)));
        assert_eq!(registry, before);
    }
}
