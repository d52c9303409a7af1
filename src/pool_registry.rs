//! Current router, settlement asset and the pool address derived from them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::Address;

/// Deterministic pool address for the `(token, settlement)` pair under
/// `router`. Pair members are sorted first, so argument order does not matter.
pub fn derive_pool_address(router: &Address, token: &Address, settlement: &Address) -> Address {
    let (a, b) = if token <= settlement {
        (token, settlement)
    } else {
        (settlement, token)
    };
    let mut hasher = Sha256::new();
    hasher.update(b"drvn-pool");
    hasher.update(router.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(a.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(b.as_str().as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Address::new(format!("0x{}", hex::encode(&digest[12..])))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    router: Address,
    settlement_asset: Address,
    pool: Address,
}

impl PoolRegistry {
    pub fn new(router: Address, token: &Address, settlement_asset: Address) -> Self {
        let pool = derive_pool_address(&router, token, &settlement_asset);
        Self {
            router,
            settlement_asset,
            pool,
        }
    }

    pub fn router(&self) -> &Address {
        &self.router
    }

    pub fn settlement_asset(&self) -> &Address {
        &self.settlement_asset
    }

    pub fn pool(&self) -> &Address {
        &self.pool
    }

    /// Registry for `new_router`, same pair. The caller swaps it in whole.
    pub fn migrated(&self, new_router: Address, token: &Address) -> Self {
        Self::new(new_router, token, self.settlement_asset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_address_is_stable_and_order_independent() {
        let router = Address::new("0xrouter");
        let token = Address::new("0xtoken");
        let weth = Address::new("0xweth");
        let p1 = derive_pool_address(&router, &token, &weth);
        let p2 = derive_pool_address(&router, &weth, &token);
        assert_eq!(p1, p2);
        assert!(p1.as_str().starts_with("0x"));
        assert_eq!(p1.as_str().len(), 42);
    }

    #[test]
    fn migration_recomputes_pool() {
        let token = Address::new("0xtoken");
        let reg = PoolRegistry::new(Address::new("0xrouter-a"), &token, Address::new("0xweth"));
        let next = reg.migrated(Address::new("0xrouter-b"), &token);
        assert_ne!(reg.pool(), next.pool());
        assert_eq!(next.settlement_asset(), reg.settlement_asset());
        assert_eq!(
            next.pool(),
            &derive_pool_address(&Address::new("0xrouter-b"), &token, &Address::new("0xweth"))
        );
    }
}
