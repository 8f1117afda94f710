use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// An event emitted during execution.
///
/// `address`, `topics` and `data` are set by the emitter; the remaining
/// fields are stamped by the runtime, tx fields when the log is journaled and
/// block fields once the block is finalized.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub tx_hash: B256,
    pub tx_index: u64,
    pub block_hash: B256,
    pub block_number: u64,
    /// Position of the log within its block
    pub index: u64,
}

impl Log {
    pub fn new(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
            ..Default::default()
        }
    }
}

/// Outcome of one transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// Whether execution succeeded
    pub status: bool,
    pub tx_hash: B256,
    pub tx_index: u64,
    /// Gas used by this transaction alone
    pub gas_used: u64,
    /// Gas used by this and every earlier transaction in the block
    pub cumulative_gas_used: u64,
    pub logs: Vec<Log>,
    /// Address of the created contract, if any
    pub contract_address: Option<Address>,
    pub block_hash: B256,
    pub block_number: u64,
}

/// Positional metadata for a transaction included in a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLookupEntry {
    pub tx: Transaction,
    pub index: u64,
    pub block_number: u64,
    pub block_hash: B256,
}
