//! Transactions as seen by the runtime.
//!
//! The signed wire payload is decoded by the host's codec; by the time a
//! transaction reaches the runtime the sender is already recovered.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// An EIP-2930 access list entry.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// A decoded, sender-recovered transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender nonce
    pub nonce: u64,
    /// Recovered sender
    pub from: Address,
    /// Recipient (`None` for contract creation)
    pub to: Option<Address>,
    /// Value transferred
    pub value: U256,
    /// Gas limit supplied by the sender
    pub gas_limit: u64,
    /// Price offered per unit of gas
    pub gas_price: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Addresses and slots to pre-warm
    pub access_list: Vec<AccessListItem>,
    /// Hash over all other fields, computed once on construction
    hash: B256,
}

impl Transaction {
    /// Create a new transaction and seal its hash.
    pub fn new(
        from: Address,
        nonce: u64,
        to: Option<Address>,
        value: U256,
        gas_limit: u64,
        gas_price: U256,
        input: Bytes,
    ) -> Self {
        let mut tx = Self {
            nonce,
            from,
            to,
            value,
            gas_limit,
            gas_price,
            input,
            access_list: Vec::new(),
            hash: B256::ZERO,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Attach an access list, resealing the hash.
    pub fn with_access_list(mut self, access_list: Vec<AccessListItem>) -> Self {
        self.access_list = access_list;
        self.hash = self.compute_hash();
        self
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Whether this is a contract creation.
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// A structurally empty transaction (never sealed) has a zero hash.
    pub fn is_empty(&self) -> bool {
        self.hash.is_zero()
    }

    fn compute_hash(&self) -> B256 {
        let mut data = Vec::with_capacity(8 + 20 + 21 + 32 + 8 + 32 + self.input.len());
        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(self.from.as_slice());
        match self.to {
            Some(to) => {
                data.push(1);
                data.extend_from_slice(to.as_slice());
            }
            None => data.push(0),
        }
        data.extend_from_slice(&self.value.to_be_bytes::<32>());
        data.extend_from_slice(&self.gas_limit.to_be_bytes());
        data.extend_from_slice(&self.gas_price.to_be_bytes::<32>());
        data.extend_from_slice(&self.input);
        for item in &self.access_list {
            data.extend_from_slice(item.address.as_slice());
            for key in &item.storage_keys {
                data.extend_from_slice(key.as_slice());
            }
        }
        keccak256(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(nonce: u64) -> Transaction {
        Transaction::new(
            Address::with_last_byte(1),
            nonce,
            Some(Address::with_last_byte(2)),
            U256::from(1000u64),
            21_000,
            U256::from(1u64),
            Bytes::new(),
        )
    }

    #[test]
    fn test_hash_is_sealed() {
        let tx = transfer(0);
        assert!(!tx.is_empty());
        assert_ne!(tx.hash(), transfer(1).hash());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(Transaction::default().is_empty());
    }

    #[test]
    fn test_access_list_changes_hash() {
        let tx = transfer(0);
        let warmed = tx.clone().with_access_list(vec![AccessListItem {
            address: Address::with_last_byte(9),
            storage_keys: vec![B256::with_last_byte(1)],
        }]);
        assert_ne!(tx.hash(), warmed.hash());
    }

    #[test]
    fn test_create_detection() {
        let create = Transaction::new(
            Address::with_last_byte(1),
            0,
            None,
            U256::ZERO,
            100_000,
            U256::from(1u64),
            Bytes::from_static(&[0x60, 0x00]),
        );
        assert!(create.is_create());
        assert!(!transfer(0).is_create());
    }
}
