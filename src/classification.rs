//! Per-address classification: which accounts skip the fee and which ones
//! are exchange pools.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Address;

/// How the transfer gate treats an address. Resolved once per transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Normal,
    Exempt,
    Pool,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Normal => "normal",
            Classification::Exempt => "exempt",
            Classification::Pool => "pool",
        }
    }
}

/// Raw administrative flags. Both may be set; exempt wins on resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationEntry {
    pub exempt: bool,
    pub pool: bool,
}

impl ClassificationEntry {
    pub fn resolve(&self) -> Classification {
        if self.exempt {
            Classification::Exempt
        } else if self.pool {
            Classification::Pool
        } else {
            Classification::Normal
        }
    }

    fn is_default(&self) -> bool {
        !self.exempt && !self.pool
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRegistry {
    entries: BTreeMap<Address, ClassificationEntry>,
}

impl ClassificationRegistry {
    pub fn entry(&self, address: &Address) -> ClassificationEntry {
        self.entries.get(address).copied().unwrap_or_default()
    }

    pub fn classify(&self, address: &Address) -> Classification {
        self.entry(address).resolve()
    }

    pub fn is_exempt(&self, address: &Address) -> bool {
        self.entry(address).exempt
    }

    pub fn is_pool(&self, address: &Address) -> bool {
        self.entry(address).pool
    }

    pub fn set_exempt(&mut self, address: &Address, exempt: bool) {
        self.update(address, |e| e.exempt = exempt);
    }

    pub fn set_pool(&mut self, address: &Address, pool: bool) {
        self.update(address, |e| e.pool = pool);
    }

    /// Addresses currently flagged as pools (exempt-overridden ones included).
    pub fn pools(&self) -> Vec<Address> {
        self.entries
            .iter()
            .filter(|(_, e)| e.pool)
            .map(|(a, _)| a.clone())
            .collect()
    }

    pub fn exempt_accounts(&self) -> Vec<Address> {
        self.entries
            .iter()
            .filter(|(_, e)| e.exempt)
            .map(|(a, _)| a.clone())
            .collect()
    }

    fn update(&mut self, address: &Address, f: impl FnOnce(&mut ClassificationEntry)) {
        let mut entry = self.entry(address);
        f(&mut entry);
        if entry.is_default() {
            self.entries.remove(address);
        } else {
            self.entries.insert(address.clone(), entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exempt_overrides_pool() {
        let mut reg = ClassificationRegistry::default();
        let pair = Address::new("0xpair");
        reg.set_pool(&pair, true);
        assert_eq!(reg.classify(&pair), Classification::Pool);
        reg.set_exempt(&pair, true);
        assert_eq!(reg.classify(&pair), Classification::Exempt);
        assert!(reg.is_pool(&pair));
        reg.set_exempt(&pair, false);
        assert_eq!(reg.classify(&pair), Classification::Pool);
    }

    #[test]
    fn clearing_flags_drops_entry() {
        let mut reg = ClassificationRegistry::default();
        let a = Address::new("0xa");
        reg.set_exempt(&a, true);
        reg.set_exempt(&a, false);
        assert_eq!(reg, ClassificationRegistry::default());
        assert_eq!(reg.classify(&a), Classification::Normal);
    }
}
