//! Balance bookkeeping for the fee token and the settlement asset.
//!
//! The token ledger keeps `sum(balances) == total_supply`: the only way value
//! enters it is the one-time mint at deployment, and every later mutation is a
//! move between two accounts. The settlement book has no supply invariant; it
//! records settlement-asset proceeds the engine receives from the router and
//! pays out to collectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::types::{Address, Amount};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountLedger {
    balances: BTreeMap<Address, Amount>,
    total_supply: Amount,
}

impl AccountLedger {
    /// Ledger with the whole supply credited to `holder`.
    pub fn with_supply(holder: &Address, total_supply: Amount) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(holder.clone(), total_supply);
        Self {
            balances,
            total_supply,
        }
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    /// Fail with `InsufficientBalance` unless `account` holds at least `amount`.
    pub fn ensure_balance(&self, account: &Address, amount: Amount) -> EngineResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Move `amount` from one account to another. Nothing changes on error.
    pub fn move_balance(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> EngineResult<()> {
        self.ensure_balance(from, amount)?;
        if amount == 0 || from == to {
            return Ok(());
        }
        if let Some(bal) = self.balances.get_mut(from) {
            *bal -= amount;
        }
        *self.balances.entry(to.clone()).or_default() += amount;
        Ok(())
    }

    /// Debit `from` once and credit each `(to, amount)` leg. The legs must add
    /// up to the debit; used by the transfer gate to split net and tax.
    pub fn split_move(
        &mut self,
        from: &Address,
        gross: Amount,
        legs: &[(&Address, Amount)],
    ) -> EngineResult<()> {
        self.ensure_balance(from, gross)?;
        debug_assert_eq!(legs.iter().map(|(_, a)| *a).sum::<Amount>(), gross);
        if let Some(bal) = self.balances.get_mut(from) {
            *bal -= gross;
        }
        for (to, amount) in legs {
            *self.balances.entry((*to).clone()).or_default() += *amount;
        }
        Ok(())
    }

    /// Sum of every balance; equals `total_supply` unless something is broken.
    pub fn circulating(&self) -> Amount {
        self.balances.values().sum()
    }

    pub fn is_conserved(&self) -> bool {
        self.circulating() == self.total_supply
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementBook {
    balances: BTreeMap<Address, Amount>,
}

impl SettlementBook {
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, account: &Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        let entry = self.balances.entry(account.clone()).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn debit(&mut self, account: &Address, amount: Amount) -> EngineResult<()> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(EngineError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        if let Some(bal) = self.balances.get_mut(account) {
            *bal -= amount;
        }
        Ok(())
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> EngineResult<()> {
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    #[test]
    fn moves_preserve_supply() {
        let mut ledger = AccountLedger::with_supply(&addr("owner"), 1_000);
        ledger.move_balance(&addr("owner"), &addr("alice"), 400).unwrap();
        ledger
            .split_move(&addr("alice"), 100, &[(&addr("bob"), 95), (&addr("token"), 5)])
            .unwrap();
        assert_eq!(ledger.balance_of(&addr("owner")), 600);
        assert_eq!(ledger.balance_of(&addr("alice")), 300);
        assert_eq!(ledger.balance_of(&addr("bob")), 95);
        assert_eq!(ledger.balance_of(&addr("token")), 5);
        assert!(ledger.is_conserved());
    }

    #[test]
    fn overdraft_leaves_ledger_untouched() {
        let mut ledger = AccountLedger::with_supply(&addr("owner"), 50);
        let before = ledger.clone();
        let err = ledger
            .move_balance(&addr("owner"), &addr("alice"), 51)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientBalance {
                account: addr("owner"),
                needed: 51,
                available: 50,
            }
        );
        assert_eq!(ledger, before);
        assert!(ledger
            .move_balance(&addr("nobody"), &addr("alice"), 1)
            .is_err());
    }

    #[test]
    fn settlement_book_debits_and_credits() {
        let mut book = SettlementBook::default();
        book.credit(&addr("token"), 10);
        book.transfer(&addr("token"), &addr("c1"), 7).unwrap();
        assert_eq!(book.balance_of(&addr("token")), 3);
        assert_eq!(book.balance_of(&addr("c1")), 7);
        assert!(book.debit(&addr("token"), 4).is_err());
    }
}
