//! Gas metering for transactions and blocks.
//!
//! A `GasMeter` holds a `{limit, consumed}` pair for the running transaction
//! and another for the block. Consumption is checked against both before it
//! is recorded, and arithmetic overflow is reported as an error instead of
//! panicking.

use crate::error::VmError;

/// Transaction and block gas accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasMeter {
    /// Gas limit of the current transaction
    tx_limit: u64,
    /// Gas consumed by the current transaction
    tx_consumed: u64,
    /// Explicit block gas limit (0 = unset)
    block_limit: u64,
    /// Gas consumed by earlier transactions in the block
    block_consumed: u64,
    /// Consensus maximum, used when no block limit is set
    consensus_max_gas: u64,
}

impl GasMeter {
    /// Create a meter for a block.
    pub fn new(block_limit: u64, consensus_max_gas: u64) -> Self {
        Self {
            block_limit,
            consensus_max_gas,
            ..Default::default()
        }
    }

    /// A meter that never runs out, used to isolate precompile execution.
    pub fn infinite() -> Self {
        Self {
            tx_limit: u64::MAX,
            tx_consumed: 0,
            block_limit: u64::MAX,
            block_consumed: 0,
            consensus_max_gas: u64::MAX,
        }
    }

    /// Start a new block: zero both meters and adopt the host's limits.
    pub fn prepare_block(&mut self, block_limit: u64, consensus_max_gas: u64) {
        self.block_limit = block_limit;
        self.begin_block(consensus_max_gas);
    }

    /// Start a new block under the current explicit limit.
    pub fn begin_block(&mut self, consensus_max_gas: u64) {
        self.tx_limit = 0;
        self.tx_consumed = 0;
        self.block_consumed = 0;
        self.consensus_max_gas = consensus_max_gas;
    }

    /// Start a new transaction.
    ///
    /// Gas consumed by the previous transaction is rolled into the block
    /// meter before the transaction meter is re-derived.
    pub fn reset_tx(&mut self, tx_limit: u64) {
        self.block_consumed = self.block_consumed.saturating_add(self.tx_consumed);
        self.tx_consumed = 0;
        self.tx_limit = tx_limit;
    }

    /// Forget the current transaction's consumption without charging the block.
    ///
    /// Used when the interpreter rejects a transaction outright.
    pub fn discard_tx(&mut self) {
        self.tx_consumed = 0;
    }

    /// Consume gas for the current transaction.
    ///
    /// # Errors
    /// - `GasOverflow` if the running total does not fit in a `u64`
    /// - `OutOfGas` if the transaction limit would be exceeded
    /// - `BlockOutOfGas` if the block limit would be exceeded
    ///
    /// On error nothing is recorded.
    pub fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        let new_consumed = self
            .tx_consumed
            .checked_add(amount)
            .ok_or(VmError::GasOverflow)?;

        if new_consumed > self.tx_limit {
            return Err(VmError::OutOfGas {
                consumed: new_consumed,
                limit: self.tx_limit,
            });
        }

        let block_limit = self.block_gas_limit();
        if self.block_consumed.saturating_add(new_consumed) > block_limit {
            return Err(VmError::BlockOutOfGas {
                block_consumed: self.block_consumed,
                tx_consumed: new_consumed,
                limit: block_limit,
            });
        }

        self.tx_consumed = new_consumed;
        Ok(())
    }

    /// Gas left for the current transaction.
    pub fn gas_remaining(&self) -> u64 {
        self.tx_limit.saturating_sub(self.tx_consumed)
    }

    /// Gas consumed by the current transaction.
    pub fn gas_consumed(&self) -> u64 {
        self.tx_consumed
    }

    /// Gas consumed in the block, excluding the current transaction.
    pub fn block_gas_consumed(&self) -> u64 {
        self.block_consumed
    }

    /// Block gas limit, falling back to the consensus maximum.
    pub fn block_gas_limit(&self) -> u64 {
        if self.block_limit != 0 {
            self.block_limit
        } else {
            self.consensus_max_gas
        }
    }

    pub fn tx_gas_limit(&self) -> u64 {
        self.tx_limit
    }
}
