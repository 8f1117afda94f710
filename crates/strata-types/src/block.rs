use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// Block header produced by the lifecycle at `Prepare`.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Hash of the parent block header
    pub parent_hash: B256,
    /// Address credited as the block producer
    pub coinbase: Address,
    /// Block number (height)
    pub number: u64,
    /// Maximum gas allowed in this block
    pub gas_limit: u64,
    /// Total gas used by all transactions in this block
    pub gas_used: u64,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
    /// Base fee per gas unit
    pub base_fee: U256,
}

impl Header {
    /// Create a new header with zero gas used.
    pub fn new(
        parent_hash: B256,
        coinbase: Address,
        number: u64,
        gas_limit: u64,
        timestamp: u64,
        base_fee: U256,
    ) -> Self {
        Self {
            parent_hash,
            coinbase,
            number,
            gas_limit,
            gas_used: 0,
            timestamp,
            base_fee,
        }
    }

    /// Compute the hash of this header.
    pub fn hash(&self) -> B256 {
        let mut data = Vec::with_capacity(32 + 20 + 8 * 4 + 32);
        data.extend_from_slice(self.parent_hash.as_slice());
        data.extend_from_slice(self.coinbase.as_slice());
        data.extend_from_slice(&self.number.to_be_bytes());
        data.extend_from_slice(&self.gas_limit.to_be_bytes());
        data.extend_from_slice(&self.gas_used.to_be_bytes());
        data.extend_from_slice(&self.timestamp.to_be_bytes());
        data.extend_from_slice(&self.base_fee.to_be_bytes::<32>());
        keccak256(&data)
    }
}

/// A finalized block: header plus the transactions executed in it.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Block hash (the header hash).
    pub fn hash(&self) -> B256 {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn gas_used(&self) -> u64 {
        self.header.gas_used
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
