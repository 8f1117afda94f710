//! Per-block transaction execution.
//!
//! The [`StateProcessor`] owns the state database, the gas plugin and the
//! precompile registry for the block being built. It runs transactions one
//! at a time, snapshotting state before each one and reverting to that
//! snapshot when the transaction cannot be applied.

use strata_types::{Block, Header, Log, Receipt, Rules, Transaction, B256};
use strata_vm::{Precompiles, StateDb, StatePlugin};
use tracing::{debug, info, warn};

use crate::chain::LifecycleState;
use crate::error::CoreError;
use crate::evm::{BlockContext, Evm, EvmFactory, ExecutionEnv, ExecutionResult};
use crate::plugins::{GasPlugin, PrecompilePlugin};

/// A finalized block with its receipts and logs, stamped with the block
/// hash.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedBlock {
    pub block: Block,
    pub receipts: Vec<Receipt>,
    pub logs: Vec<Log>,
}

struct PreparedBlock {
    header: Header,
    context: BlockContext,
    evm: Box<dyn Evm>,
}

pub struct StateProcessor {
    statedb: StateDb,
    gas: Box<dyn GasPlugin>,
    precompile_plugin: Box<dyn PrecompilePlugin>,
    evm_factory: Box<dyn EvmFactory>,
    precompiles: Precompiles,
    /// Rules the registry was last built for
    precompile_rules: Option<Rules>,
    block: Option<PreparedBlock>,
    txs: Vec<Transaction>,
    receipts: Vec<Receipt>,
    log_count: u64,
}

impl std::fmt::Debug for StateProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateProcessor")
            .field("statedb", &self.statedb)
            .field("precompiles", &self.precompiles.len())
            .field("prepared", &self.block.is_some())
            .field("txs", &self.txs.len())
            .finish()
    }
}

impl StateProcessor {
    pub fn new(
        state: Box<dyn StatePlugin>,
        gas: Box<dyn GasPlugin>,
        precompile_plugin: Box<dyn PrecompilePlugin>,
        evm_factory: Box<dyn EvmFactory>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            statedb: StateDb::new(state)?,
            gas,
            precompile_plugin,
            evm_factory,
            precompiles: Precompiles::default(),
            precompile_rules: None,
            block: None,
            txs: Vec::new(),
            receipts: Vec::new(),
            log_count: 0,
        })
    }

    /// Build the precompile registry for `rules` unless it is current.
    ///
    /// # Errors
    /// Fails when a precompile cannot be registered; the chain must not
    /// produce blocks with an inconsistent registry.
    pub fn load_precompiles(&mut self, rules: &Rules) -> Result<(), CoreError> {
        if self.precompile_rules.as_ref() == Some(rules) {
            return Ok(());
        }
        let registrables = self.precompile_plugin.get_precompiles(rules);
        self.precompiles = Precompiles::new(registrables)?
            .with_kv_gas_config(self.precompile_plugin.kv_gas_config());
        self.precompile_rules = Some(*rules);
        debug!(count = self.precompiles.len(), "Loaded precompiles");
        Ok(())
    }

    /// Reset state and gas for a new block; returns the block gas limit.
    pub fn begin_block(&mut self, consensus_max_gas: u64) -> u64 {
        self.statedb.prepare_block();
        self.gas.prepare(consensus_max_gas);
        self.block = None;
        self.txs.clear();
        self.receipts.clear();
        self.log_count = 0;
        self.gas.block_gas_limit()
    }

    /// Bind a fresh interpreter to `header`.
    pub fn prepare(&mut self, header: Header, context: BlockContext) -> Result<(), CoreError> {
        self.load_precompiles(&context.rules)?;
        let evm = self.evm_factory.build(&context);
        self.block = Some(PreparedBlock {
            header,
            context,
            evm,
        });
        Ok(())
    }

    /// Execute one transaction and record its receipt.
    ///
    /// A transaction the interpreter rejects is rolled back and returned
    /// as an error; it is not included in the block. A transaction that
    /// executes but fails still gets a receipt with a failed status.
    ///
    /// # Panics
    /// Panics on a structurally empty transaction.
    pub fn process_transaction(&mut self, tx: &Transaction) -> Result<Receipt, CoreError> {
        assert!(
            !tx.is_empty(),
            "empty transaction handed to the state processor"
        );
        let Some(prepared) = self.block.as_mut() else {
            return Err(CoreError::InvalidState {
                expected: LifecycleState::AcceptingTransactions,
                found: LifecycleState::Idle,
            });
        };

        let tx_hash = tx.hash();
        let tx_index = self.txs.len() as u64;

        self.gas.reset(tx.gas_limit);
        self.statedb.plugin_mut().reset();
        self.statedb.reset(tx_hash, tx_index)?;
        self.statedb.prepare_access_list(
            &prepared.context.rules,
            tx.from,
            prepared.context.coinbase,
            tx.to,
            &self.precompiles.get_active(),
            &tx.access_list,
        );
        let snapshot = self.statedb.snapshot()?;

        let env = ExecutionEnv {
            state: &mut self.statedb,
            gas: &mut *self.gas,
            precompiles: &self.precompiles,
            block: &prepared.context,
        };
        let result = match prepared.evm.transact(tx, env) {
            Ok(result) => result,
            Err(e) => {
                warn!(%tx_hash, error = %e, "Transaction rejected, reverting");
                self.gas.discard();
                self.statedb.revert_to_snapshot(&snapshot)?;
                return Err(e.into());
            }
        };

        let receipt = self.build_receipt(tx, tx_index, &result);
        self.statedb.finalize()?;

        debug!(
            %tx_hash,
            gas_used = receipt.gas_used,
            status = receipt.status,
            logs = receipt.logs.len(),
            "Processed transaction"
        );
        self.log_count += receipt.logs.len() as u64;
        self.txs.push(tx.clone());
        self.receipts.push(receipt.clone());
        Ok(receipt)
    }

    fn build_receipt(&self, tx: &Transaction, tx_index: u64, result: &ExecutionResult) -> Receipt {
        let block_number = self
            .block
            .as_ref()
            .map(|prepared| prepared.header.number)
            .unwrap_or_default();
        let cumulative_gas_used = self
            .receipts
            .last()
            .map(|r| r.cumulative_gas_used)
            .unwrap_or_default()
            .saturating_add(result.gas_used);

        let mut logs = self.statedb.get_logs(tx.hash(), B256::ZERO, block_number);
        for (i, log) in logs.iter_mut().enumerate() {
            log.index = self.log_count + i as u64;
        }

        Receipt {
            status: result.is_success(),
            tx_hash: tx.hash(),
            tx_index,
            gas_used: result.gas_used,
            cumulative_gas_used,
            logs,
            contract_address: result.contract_address,
            block_hash: B256::ZERO,
            block_number,
        }
    }

    /// Commit state and assemble the block.
    pub fn finalize(&mut self) -> Result<FinalizedBlock, CoreError> {
        let Some(prepared) = self.block.take() else {
            return Err(CoreError::InvalidState {
                expected: LifecycleState::Finalizing,
                found: LifecycleState::Idle,
            });
        };
        self.statedb.finalize()?;

        let mut header = prepared.header;
        header.gas_used = self
            .receipts
            .last()
            .map(|r| r.cumulative_gas_used)
            .unwrap_or_default();

        let block = Block::new(header, std::mem::take(&mut self.txs));
        let block_hash = block.hash();
        let mut receipts = std::mem::take(&mut self.receipts);
        let mut logs = Vec::with_capacity(self.log_count as usize);
        for receipt in &mut receipts {
            receipt.block_hash = block_hash;
            for log in &mut receipt.logs {
                log.block_hash = block_hash;
                logs.push(log.clone());
            }
        }
        self.log_count = 0;

        info!(
            %block_hash,
            number = block.number(),
            gas_used = block.gas_used(),
            "Assembled block"
        );
        Ok(FinalizedBlock {
            block,
            receipts,
            logs,
        })
    }

    /// A state database over the plugin's view at `number`, independent of
    /// the live one.
    pub fn get_state_by_number(&self, number: u64) -> Result<StateDb, CoreError> {
        let plugin = self.statedb.get_state_by_number(number)?;
        Ok(StateDb::new(plugin)?)
    }

    pub fn statedb(&self) -> &StateDb {
        &self.statedb
    }

    pub fn statedb_mut(&mut self) -> &mut StateDb {
        &mut self.statedb
    }

    pub fn gas(&self) -> &dyn GasPlugin {
        &*self.gas
    }

    pub fn precompiles(&self) -> &Precompiles {
        &self.precompiles
    }

    /// Context of the block being built.
    pub fn block_context(&self) -> Option<&BlockContext> {
        self.block.as_ref().map(|prepared| &prepared.context)
    }

    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }
}
