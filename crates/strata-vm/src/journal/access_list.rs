use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256};

use crate::snapshot::Controllable;

/// A reversible change to the warm set.
#[derive(Debug, Clone)]
enum Change {
    AddressAdded(Address),
    SlotAdded(Address, B256),
    AddressDeleted(Address, HashSet<B256>),
    SlotDeleted(Address, B256),
}

/// Addresses and storage slots warmed during the current transaction.
#[derive(Debug, Default, Clone)]
pub struct AccessList {
    addresses: HashMap<Address, HashSet<B256>>,
    journal: Vec<Change>,
}

impl AccessList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.addresses.contains_key(address)
    }

    /// Returns `(address_present, slot_present)`.
    pub fn contains(&self, address: &Address, slot: &B256) -> (bool, bool) {
        match self.addresses.get(address) {
            Some(slots) => (true, slots.contains(slot)),
            None => (false, false),
        }
    }

    /// Warm an address. Returns `true` if it was not already warm.
    pub fn add_address(&mut self, address: Address) -> bool {
        if self.addresses.contains_key(&address) {
            return false;
        }
        self.addresses.insert(address, HashSet::new());
        self.journal.push(Change::AddressAdded(address));
        true
    }

    /// Warm a slot, warming its address too.
    ///
    /// Returns `(address_added, slot_added)`.
    pub fn add_slot(&mut self, address: Address, slot: B256) -> (bool, bool) {
        let address_added = self.add_address(address);
        let slot_added = self
            .addresses
            .get_mut(&address)
            .map(|slots| slots.insert(slot))
            .unwrap_or(false);
        if slot_added {
            self.journal.push(Change::SlotAdded(address, slot));
        }
        (address_added, slot_added)
    }

    /// Remove an address and its slots from the warm set.
    pub fn delete_address(&mut self, address: &Address) {
        if let Some(slots) = self.addresses.remove(address) {
            self.journal.push(Change::AddressDeleted(*address, slots));
        }
    }

    pub fn delete_slot(&mut self, address: &Address, slot: &B256) {
        let removed = self
            .addresses
            .get_mut(address)
            .map(|slots| slots.remove(slot))
            .unwrap_or(false);
        if removed {
            self.journal.push(Change::SlotDeleted(*address, *slot));
        }
    }

    /// Forget every warm entry and all history.
    pub fn clear(&mut self) {
        self.addresses.clear();
        self.journal.clear();
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    fn undo(&mut self, change: Change) {
        match change {
            Change::AddressAdded(address) => {
                self.addresses.remove(&address);
            }
            Change::SlotAdded(address, slot) => {
                if let Some(slots) = self.addresses.get_mut(&address) {
                    slots.remove(&slot);
                }
            }
            Change::AddressDeleted(address, slots) => {
                self.addresses.insert(address, slots);
            }
            Change::SlotDeleted(address, slot) => {
                self.addresses.entry(address).or_default().insert(slot);
            }
        }
    }
}

impl Controllable for AccessList {
    fn registry_key(&self) -> &'static str {
        "access_list"
    }

    fn snapshot(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        while self.journal.len() > id {
            if let Some(change) = self.journal.pop() {
                self.undo(change);
            }
        }
    }

    /// Keeps the warm set; only the undo history is dropped.
    fn finalize(&mut self) {
        self.journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn s(n: u8) -> B256 {
        B256::with_last_byte(n)
    }

    #[test]
    fn test_registry_key() {
        assert_eq!(AccessList::new().registry_key(), "access_list");
    }

    #[test]
    fn test_controllable_operations() {
        let mut al = AccessList::new();
        assert!(al.add_address(a(1)));
        assert!(al.contains_address(&a(1)));
        assert!(!al.contains_address(&a(2)));
        al.delete_address(&a(1));
        assert!(!al.contains_address(&a(1)));

        assert_eq!(al.add_slot(a(1), s(1)), (true, true));
        assert_eq!(al.add_slot(a(1), s(2)), (false, true));

        let snap = al.snapshot();
        assert_eq!(al.add_slot(a(2), s(1)), (true, true));
        assert!(al.contains_address(&a(2)));

        al.revert_to_snapshot(snap);
        assert!(!al.contains_address(&a(2)));
        assert_eq!(al.contains(&a(1), &s(2)), (true, true));

        al.finalize();
        assert!(al.contains_address(&a(1)));
    }

    #[test]
    fn test_readding_is_free() {
        let mut al = AccessList::new();
        al.add_slot(a(1), s(1));
        let snap = al.snapshot();
        assert!(!al.add_address(a(1)));
        assert_eq!(al.add_slot(a(1), s(1)), (false, false));
        assert_eq!(al.snapshot(), snap);
    }

    #[test]
    fn test_revert_restores_deleted_entries() {
        let mut al = AccessList::new();
        al.add_slot(a(1), s(1));
        al.add_slot(a(1), s(2));
        let snap = al.snapshot();

        al.delete_slot(&a(1), &s(2));
        assert_eq!(al.contains(&a(1), &s(2)), (true, false));
        al.delete_address(&a(1));
        assert!(!al.contains_address(&a(1)));

        al.revert_to_snapshot(snap);
        assert_eq!(al.contains(&a(1), &s(1)), (true, true));
        assert_eq!(al.contains(&a(1), &s(2)), (true, true));
    }

    #[test]
    fn test_add_then_delete_then_revert() {
        let mut al = AccessList::new();
        let snap = al.snapshot();
        al.add_address(a(3));
        al.delete_address(&a(3));
        al.revert_to_snapshot(snap);
        assert!(!al.contains_address(&a(3)));
        assert_eq!(al.address_count(), 0);
    }
}
