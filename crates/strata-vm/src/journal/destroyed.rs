use std::collections::HashSet;

use alloy_primitives::Address;

use crate::snapshot::Controllable;

/// Accounts destroyed during the current transaction.
///
/// Accounts are only marked here; physical deletion happens when the state
/// is finalized, so a revert can still bring a destroyed account back.
#[derive(Debug, Default, Clone)]
pub struct DestroyedAccounts {
    order: Vec<Address>,
    set: HashSet<Address>,
}

impl DestroyedAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an account. Returns `true` if it was not already marked.
    pub fn mark(&mut self, address: Address) -> bool {
        if !self.set.insert(address) {
            return false;
        }
        self.order.push(address);
        true
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.set.contains(address)
    }

    /// Marked accounts in the order they were destroyed.
    pub fn addresses(&self) -> &[Address] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Controllable for DestroyedAccounts {
    fn registry_key(&self) -> &'static str {
        "destroyed_accounts"
    }

    fn snapshot(&mut self) -> usize {
        self.order.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        for address in self.order.drain(id.min(self.order.len())..) {
            self.set.remove(&address);
        }
    }

    fn finalize(&mut self) {
        self.order.clear();
        self.set.clear();
    }
}
