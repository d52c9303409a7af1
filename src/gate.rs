//! Transfer gate: every token movement between accounts passes through here.
//!
//! Classification of the two sides decides the kind of transfer and the tax.
//! Exempt beats pool, to-pool (sell) beats from-pool (buy).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classification::Classification;
use crate::config::FeeConfiguration;
use crate::engine::CycleOutcome;
use crate::error::EngineResult;
use crate::events::EngineEvent;
use crate::exchange::LedgerHandle;
use crate::monitor::{self, MonitorDecision};
use crate::state::EngineState;
use crate::types::{mul_div_floor, Address, Amount, BPS_DENOMINATOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    WalletToWallet,
    Buy,
    Sell,
    Exempt,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::WalletToWallet => "wallet_to_wallet",
            TransferKind::Buy => "buy",
            TransferKind::Sell => "sell",
            TransferKind::Exempt => "exempt",
        }
    }
}

pub fn classify_transfer(from: Classification, to: Classification) -> TransferKind {
    match (from, to) {
        (Classification::Exempt, _) | (_, Classification::Exempt) => TransferKind::Exempt,
        (_, Classification::Pool) => TransferKind::Sell,
        (Classification::Pool, _) => TransferKind::Buy,
        _ => TransferKind::WalletToWallet,
    }
}

pub fn tax_for(kind: TransferKind, fees: &FeeConfiguration, amount: Amount) -> Amount {
    let bps = match kind {
        TransferKind::Sell => fees.sell_fee_bps,
        TransferKind::Buy => fees.buy_fee_bps,
        TransferKind::WalletToWallet | TransferKind::Exempt => return 0,
    };
    mul_div_floor(amount, bps as u128, BPS_DENOMINATOR)
}

/// What a completed transfer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    /// Credited to `to`.
    pub net: Amount,
    /// Credited to the engine.
    pub tax: Amount,
    pub kind: TransferKind,
    /// Set for sells only.
    pub monitor: Option<MonitorDecision>,
    /// Set when the monitor armed and the engine ran a cycle.
    pub cycle: Option<CycleOutcome>,
}

impl TransferReceipt {
    pub fn triggered_cycle(&self) -> bool {
        self.cycle.is_some()
    }
}

impl EngineState {
    /// Move `amount` from `from` to `to`, withholding tax into the engine.
    ///
    /// Fails only on insufficient balance, with nothing mutated. The monitor
    /// is consulted after the move, so the sell that fills the accrued balance
    /// up to the threshold is the one that arms it.
    pub fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> EngineResult<TransferReceipt> {
        self.ledger.ensure_balance(from, amount)?;

        let kind = classify_transfer(self.classes.classify(from), self.classes.classify(to));
        let tax = tax_for(kind, &self.config.fees, amount);
        let net = amount - tax;
        let engine = self.token.clone();
        self.ledger.split_move(from, amount, &[(to, net), (&engine, tax)])?;

        if tax > 0 {
            debug!(
                from = %from,
                to = %to,
                amount = %amount,
                tax = %tax,
                kind = kind.as_str(),
                "taxed transfer"
            );
        }
        self.events.record(
            self.block_time,
            EngineEvent::Transfer {
                from: from.clone(),
                to: to.clone(),
                amount,
                tax,
                kind,
            },
        );

        let monitor = match kind {
            TransferKind::Sell => Some(self.should_process()),
            _ => None,
        };
        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            net,
            tax,
            kind,
            monitor,
            cycle: None,
        })
    }

    pub fn should_process(&self) -> MonitorDecision {
        monitor::should_process(
            &self.config.threshold,
            &self.lock,
            self.ledger.balance_of(&self.token),
            self.ledger.total_supply(),
        )
    }
}

/// The router's view of the ledger. Transfers go through the gate, and the
/// receipt comes back without a cycle: only the engine can run one.
impl LedgerHandle for EngineState {
    fn token(&self) -> &Address {
        &self.token
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> EngineResult<TransferReceipt> {
        EngineState::transfer(self, from, to, amount)
    }

    fn block_time(&self) -> u64 {
        self.block_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_wins_then_sell_then_buy() {
        use Classification::*;
        assert_eq!(classify_transfer(Exempt, Pool), TransferKind::Exempt);
        assert_eq!(classify_transfer(Pool, Exempt), TransferKind::Exempt);
        assert_eq!(classify_transfer(Pool, Pool), TransferKind::Sell);
        assert_eq!(classify_transfer(Normal, Pool), TransferKind::Sell);
        assert_eq!(classify_transfer(Pool, Normal), TransferKind::Buy);
        assert_eq!(classify_transfer(Normal, Normal), TransferKind::WalletToWallet);
    }

    #[test]
    fn tax_is_floored() {
        let fees = FeeConfiguration::new(300, 500).unwrap();
        assert_eq!(tax_for(TransferKind::Sell, &fees, 1_000), 50);
        assert_eq!(tax_for(TransferKind::Buy, &fees, 1_000), 30);
        assert_eq!(tax_for(TransferKind::Sell, &fees, 19), 0);
        assert_eq!(tax_for(TransferKind::WalletToWallet, &fees, 1_000), 0);
        assert_eq!(tax_for(TransferKind::Exempt, &fees, 1_000), 0);
    }

    #[test]
    fn tax_on_huge_amounts_is_exact() {
        let fees = FeeConfiguration::new(300, 500).unwrap();
        let amount = u128::MAX / 4;
        assert_eq!(
            tax_for(TransferKind::Sell, &fees, amount),
            4_253_529_586_511_730_793_292_182_592_897_102_643
        );
        assert_eq!(
            tax_for(TransferKind::Buy, &fees, amount),
            2_552_117_751_907_038_475_975_309_555_738_261_585
        );
    }
}
