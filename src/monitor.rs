//! Threshold monitor and the processing lock.

use serde::{Deserialize, Serialize};

use crate::config::ThresholdPolicy;
use crate::types::Amount;

/// Held for the whole swap + distribute span of one processing cycle.
/// Never persisted: a freshly loaded engine always starts unlocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingLock {
    held: bool,
}

impl ProcessingLock {
    /// Take the lock; `false` if a cycle already holds it.
    pub fn try_acquire(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.held = true;
        true
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

/// Result of asking whether a sell should start a processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorDecision {
    /// Convert `amount` (the full accrued balance).
    Armed { amount: Amount },
    Locked,
    Disabled,
    BelowThreshold { balance: Amount, threshold: Amount },
}

impl MonitorDecision {
    pub fn is_armed(&self) -> bool {
        matches!(self, MonitorDecision::Armed { .. })
    }
}

/// Lock first, then the enable flag, then the threshold. The threshold is
/// recomputed on every call from the current supply.
pub fn should_process(
    policy: &ThresholdPolicy,
    lock: &ProcessingLock,
    accrued: Amount,
    total_supply: Amount,
) -> MonitorDecision {
    if lock.is_held() {
        return MonitorDecision::Locked;
    }
    if !policy.auto_process_enabled {
        return MonitorDecision::Disabled;
    }
    let threshold = policy.effective_threshold(total_supply);
    if accrued == 0 || accrued < threshold {
        return MonitorDecision::BelowThreshold {
            balance: accrued,
            threshold,
        };
    }
    MonitorDecision::Armed { amount: accrued }
}

/// Progress toward the threshold in basis points, capped at 10000.
pub fn progress_bps(accrued: Amount, threshold: Amount) -> u128 {
    if threshold == 0 {
        return if accrued > 0 { 10_000 } else { 0 };
    }
    (accrued.saturating_mul(10_000) / threshold).min(10_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPPLY: Amount = 1_000_000_000 * 1_000_000_000;
    const THRESHOLD: Amount = 100_000 * 1_000_000_000;

    #[test]
    fn arms_at_threshold() {
        let policy = ThresholdPolicy::default();
        let lock = ProcessingLock::default();
        assert_eq!(
            should_process(&policy, &lock, THRESHOLD - 1, SUPPLY),
            MonitorDecision::BelowThreshold {
                balance: THRESHOLD - 1,
                threshold: THRESHOLD
            }
        );
        assert_eq!(
            should_process(&policy, &lock, THRESHOLD, SUPPLY),
            MonitorDecision::Armed { amount: THRESHOLD }
        );
    }

    #[test]
    fn lock_is_checked_before_anything_else() {
        let policy = ThresholdPolicy {
            auto_process_enabled: false,
            ..ThresholdPolicy::default()
        };
        let mut lock = ProcessingLock::default();
        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        assert_eq!(
            should_process(&policy, &lock, THRESHOLD, SUPPLY),
            MonitorDecision::Locked
        );
        lock.release();
        assert_eq!(
            should_process(&policy, &lock, THRESHOLD, SUPPLY),
            MonitorDecision::Disabled
        );
    }

    #[test]
    fn zero_override_never_arms_on_empty_balance() {
        let policy = ThresholdPolicy {
            swap_amount_override: Some(0),
            ..ThresholdPolicy::default()
        };
        let lock = ProcessingLock::default();
        assert!(!should_process(&policy, &lock, 0, SUPPLY).is_armed());
        assert!(should_process(&policy, &lock, 1, SUPPLY).is_armed());
    }

    #[test]
    fn progress_is_capped() {
        assert_eq!(progress_bps(THRESHOLD / 2, THRESHOLD), 5_000);
        assert_eq!(progress_bps(THRESHOLD * 3, THRESHOLD), 10_000);
        assert_eq!(progress_bps(0, 0), 0);
    }
}
