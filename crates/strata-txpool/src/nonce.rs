//! On-chain nonce lookup.

use strata_types::Address;

/// Supplies the nonce an account has on chain.
///
/// Pending runs start here; anything below it has already executed.
pub trait NonceRetriever: Send + Sync {
    fn nonce(&self, address: Address) -> u64;
}

impl<F> NonceRetriever for F
where
    F: Fn(Address) -> u64 + Send + Sync,
{
    fn nonce(&self, address: Address) -> u64 {
        self(address)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::RwLock;
    use strata_types::address_from_low_u64;

    use super::*;

    #[test]
    fn test_closure_retriever() {
        let retriever = |address: Address| if address.is_zero() { 0u64 } else { 7 };
        assert_eq!(retriever.nonce(Address::ZERO), 0);
        assert_eq!(retriever.nonce(address_from_low_u64(1)), 7);
    }

    #[test]
    fn test_shared_map_retriever() {
        let nonces: Arc<RwLock<HashMap<Address, u64>>> = Arc::default();
        let view = Arc::clone(&nonces);
        let retriever = move |address: Address| view.read().get(&address).copied().unwrap_or(0);

        let alice = address_from_low_u64(0xa11ce);
        assert_eq!(retriever.nonce(alice), 0);
        nonces.write().insert(alice, 3);
        assert_eq!(retriever.nonce(alice), 3);
    }
}
