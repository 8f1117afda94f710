//! Strata Types - Core data structures shared by every Strata crate.
//!
//! Primitive values (addresses, hashes, 256-bit integers) come from
//! `alloy-primitives`; this crate layers the block, transaction, receipt
//! and chain-configuration types of the runtime on top of them.

pub mod block;
pub mod chain_config;
pub mod error;
pub mod receipt;
pub mod transaction;

pub use alloy_primitives::{address, b256, keccak256, Address, Bytes, Selector, B256, U256};

pub use block::{Block, Header};
pub use chain_config::{ChainConfig, Rules, INITIAL_BASE_FEE};
pub use error::TypesError;
pub use receipt::{Log, Receipt, TxLookupEntry};
pub use transaction::{AccessListItem, Transaction};

/// Create an address whose low 8 bytes hold `v`.
pub const fn address_from_low_u64(v: u64) -> Address {
    let b = v.to_be_bytes();
    Address::new([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_low_u64() {
        let addr = address_from_low_u64(0x1000);
        assert_eq!(addr.as_slice()[18..], [0x10, 0x00]);
        assert!(addr.as_slice()[..18].iter().all(|b| *b == 0));
        assert_eq!(address_from_low_u64(4), Address::with_last_byte(4));
    }
}
