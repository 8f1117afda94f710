//! The seam between the lifecycle and an EVM interpreter.
//!
//! The runtime does not interpret bytecode itself. A host plugs an
//! interpreter in through [`EvmFactory`]; the processor builds one [`Evm`]
//! per block and hands it an [`ExecutionEnv`] for every transaction.

use strata_types::{Address, Bytes, Header, Rules, Transaction, U256};
use strata_vm::{Precompiles, StateDb, VmError};

use crate::plugins::GasPlugin;

/// Block-level values visible to executing transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    /// Recipient of transaction fees
    pub coinbase: Address,
    pub gas_limit: u64,
    pub base_fee: U256,
    pub chain_id: u64,
    pub rules: Rules,
    pub extra_eips: Vec<u32>,
}

impl BlockContext {
    /// Context for `header`, paying fees to `fee_collector` when set.
    pub fn new(header: &Header, rules: Rules, fee_collector: Option<Address>) -> Self {
        Self {
            number: header.number,
            timestamp: header.timestamp,
            coinbase: fee_collector.unwrap_or(header.coinbase),
            gas_limit: header.gas_limit,
            base_fee: header.base_fee,
            chain_id: rules.chain_id,
            rules,
            extra_eips: Vec::new(),
        }
    }

    pub fn with_extra_eips(mut self, extra_eips: Vec<u32>) -> Self {
        self.extra_eips = extra_eips;
        self
    }
}

/// Outcome of a transaction that was executed.
///
/// A transaction that runs and fails (revert, out of gas) still produces
/// a result, with `error` set; its gas is charged and a failed receipt is
/// recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionResult {
    pub gas_used: u64,
    pub refund: u64,
    pub output: Bytes,
    pub error: Option<VmError>,
    pub contract_address: Option<Address>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything an interpreter touches while running one transaction.
pub struct ExecutionEnv<'a> {
    pub state: &'a mut StateDb,
    pub gas: &'a mut dyn GasPlugin,
    pub precompiles: &'a Precompiles,
    pub block: &'a BlockContext,
}

/// An EVM interpreter bound to one block.
pub trait Evm: Send {
    /// Execute `tx`.
    ///
    /// `Err` means the transaction could not be applied at all (bad nonce,
    /// insufficient funds). The caller reverts every state change, discards
    /// any gas already consumed and leaves it out of the block.
    fn transact(
        &mut self,
        tx: &Transaction,
        env: ExecutionEnv<'_>,
    ) -> Result<ExecutionResult, VmError>;
}

/// Builds an interpreter for each block.
pub trait EvmFactory: Send {
    fn build(&self, block: &BlockContext) -> Box<dyn Evm>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{address_from_low_u64, B256};

    #[test]
    fn test_block_context_fee_collector() {
        let header = Header::new(
            B256::ZERO,
            address_from_low_u64(1),
            5,
            30_000_000,
            1_700_000_000,
            U256::from(7),
        );
        let rules = Rules::default();

        let ctx = BlockContext::new(&header, rules, None);
        assert_eq!(ctx.coinbase, address_from_low_u64(1));
        assert_eq!(ctx.number, 5);
        assert_eq!(ctx.base_fee, U256::from(7));

        let ctx = BlockContext::new(&header, rules, Some(address_from_low_u64(2)));
        assert_eq!(ctx.coinbase, address_from_low_u64(2));
    }

    #[test]
    fn test_execution_result_status() {
        let ok = ExecutionResult::default();
        assert!(ok.is_success());

        let failed = ExecutionResult {
            error: Some(VmError::GasOverflow),
            ..Default::default()
        };
        assert!(failed.failed());
    }
}
