use std::collections::HashMap;

use alloy_primitives::{Address, B256};

use crate::snapshot::Controllable;

/// EIP-1153 transient storage, discarded at the end of every transaction.
#[derive(Debug, Default, Clone)]
pub struct TransientStorage {
    storage: HashMap<(Address, B256), B256>,
    /// (address, key, previous value)
    journal: Vec<(Address, B256, B256)>,
}

impl TransientStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_transient_state(&self, address: Address, key: B256) -> B256 {
        self.storage.get(&(address, key)).copied().unwrap_or_default()
    }

    pub fn set_transient_state(&mut self, address: Address, key: B256, value: B256) {
        let prev = self.get_transient_state(address, key);
        if prev == value {
            return;
        }
        self.journal.push((address, key, prev));
        self.write(address, key, value);
    }

    fn write(&mut self, address: Address, key: B256, value: B256) {
        if value.is_zero() {
            self.storage.remove(&(address, key));
        } else {
            self.storage.insert((address, key), value);
        }
    }
}

impl Controllable for TransientStorage {
    fn registry_key(&self) -> &'static str {
        "transient_storage"
    }

    fn snapshot(&mut self) -> usize {
        self.journal.len()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        while self.journal.len() > id {
            if let Some((address, key, prev)) = self.journal.pop() {
                self.write(address, key, prev);
            }
        }
    }

    fn finalize(&mut self) {
        self.storage.clear();
        self.journal.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_revert() {
        let addr = Address::with_last_byte(1);
        let key = B256::with_last_byte(1);
        let mut ts = TransientStorage::new();

        ts.set_transient_state(addr, key, B256::with_last_byte(5));
        let snap = ts.snapshot();
        ts.set_transient_state(addr, key, B256::with_last_byte(6));
        ts.set_transient_state(addr, B256::with_last_byte(2), B256::with_last_byte(7));
        assert_eq!(ts.get_transient_state(addr, key), B256::with_last_byte(6));

        ts.revert_to_snapshot(snap);
        assert_eq!(ts.get_transient_state(addr, key), B256::with_last_byte(5));
        assert_eq!(ts.get_transient_state(addr, B256::with_last_byte(2)), B256::ZERO);
    }

    #[test]
    fn test_finalize_discards_values() {
        let addr = Address::with_last_byte(1);
        let mut ts = TransientStorage::new();
        ts.set_transient_state(addr, B256::ZERO, B256::with_last_byte(1));
        ts.finalize();
        assert_eq!(ts.get_transient_state(addr, B256::ZERO), B256::ZERO);
    }
}
