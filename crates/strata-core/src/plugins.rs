//! Capabilities the host chain supplies to the runtime.
//!
//! Each plugin is a narrow trait; a [`Host`] bundles one of each and is
//! handed to [`Chain::new`](crate::chain::Chain::new).

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_types::{
    Address, Block, ChainConfig, Header, Receipt, Rules, Transaction, TxLookupEntry, B256, U256,
};
use strata_vm::{default_precompiles, GasConfig, GasMeter, Registrable, StatePlugin, VmError};
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::events::NewTxsEvent;

/// Per-sender transactions ordered by nonce.
pub type PoolContent = BTreeMap<Address, Vec<Transaction>>;

/// Block production data owned by the host.
pub trait BlockPlugin: Send {
    /// Called at the start of every block.
    fn prepare(&mut self, number: u64);

    /// Coinbase and timestamp of the block being built.
    fn get_new_block_metadata(&self, number: u64) -> (Address, u64);

    fn get_header_by_number(&self, number: u64) -> Result<Header, CoreError>;

    fn set_header_by_number(&mut self, header: &Header) -> Result<(), CoreError>;

    /// Base fee override; `None` selects the EIP-1559 calculation.
    fn base_fee(&self) -> Option<U256> {
        None
    }
}

/// Chain parameters owned by the host.
pub trait ConfigurationPlugin: Send {
    fn prepare(&mut self);

    fn chain_config(&self) -> &ChainConfig;

    /// Additional EIPs enabled on top of the fork rules.
    fn extra_eips(&self) -> Vec<u32> {
        Vec::new()
    }

    /// Recipient of transaction fees in place of the block coinbase.
    fn fee_collector(&self) -> Option<Address> {
        None
    }
}

/// Block and transaction gas accounting.
pub trait GasPlugin: Send {
    /// Start a new block capped at `consensus_max_gas` unless the plugin
    /// carries an explicit limit.
    fn prepare(&mut self, consensus_max_gas: u64);

    /// Start a new transaction with `tx_limit` gas.
    fn reset(&mut self, tx_limit: u64);

    /// Drop the current transaction's consumption; it is never charged
    /// to the block.
    fn discard(&mut self);

    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError>;

    fn gas_remaining(&self) -> u64;

    fn gas_consumed(&self) -> u64;

    fn block_gas_consumed(&self) -> u64;

    fn block_gas_limit(&self) -> u64;
}

impl GasPlugin for GasMeter {
    fn prepare(&mut self, consensus_max_gas: u64) {
        self.begin_block(consensus_max_gas);
    }

    fn reset(&mut self, tx_limit: u64) {
        self.reset_tx(tx_limit);
    }

    fn discard(&mut self) {
        self.discard_tx();
    }

    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        GasMeter::consume_gas(self, amount)
    }

    fn gas_remaining(&self) -> u64 {
        GasMeter::gas_remaining(self)
    }

    fn gas_consumed(&self) -> u64 {
        GasMeter::gas_consumed(self)
    }

    fn block_gas_consumed(&self) -> u64 {
        GasMeter::block_gas_consumed(self)
    }

    fn block_gas_limit(&self) -> u64 {
        GasMeter::block_gas_limit(self)
    }
}

/// Optional persistence for finalized blocks.
pub trait HistoricalPlugin: Send + Sync {
    fn store_block(&self, block: &Block) -> Result<(), CoreError>;

    fn store_receipts(&self, block_hash: B256, receipts: &[Receipt]) -> Result<(), CoreError>;

    fn store_transactions(
        &self,
        block_number: u64,
        block_hash: B256,
        txs: &[Transaction],
    ) -> Result<(), CoreError>;

    fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, CoreError>;

    fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block>, CoreError>;

    fn get_receipts_by_hash(&self, block_hash: B256) -> Result<Option<Vec<Receipt>>, CoreError>;

    fn get_transaction_by_hash(&self, tx_hash: B256) -> Result<Option<TxLookupEntry>, CoreError>;
}

/// Source of the precompiled contracts active under a set of rules.
pub trait PrecompilePlugin: Send {
    fn get_precompiles(&self, rules: &Rules) -> Vec<Registrable>;

    /// Storage gas configuration applied while precompiles run.
    fn kv_gas_config(&self) -> GasConfig {
        GasConfig::default()
    }

    /// Addresses of the precompiles active under `rules`, ascending.
    fn get_active(&self, rules: &Rules) -> Vec<Address> {
        let mut active: Vec<Address> = self
            .get_precompiles(rules)
            .iter()
            .map(Registrable::address)
            .collect();
        active.sort_unstable();
        active.dedup();
        active
    }
}

/// The built-in precompiles plus whatever the host adds.
#[derive(Default)]
pub struct DefaultPrecompilePlugin {
    extra: Vec<Registrable>,
    kv_gas_config: GasConfig,
}

impl DefaultPrecompilePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precompile(mut self, registrable: Registrable) -> Self {
        self.extra.push(registrable);
        self
    }

    pub fn with_kv_gas_config(mut self, config: GasConfig) -> Self {
        self.kv_gas_config = config;
        self
    }
}

impl PrecompilePlugin for DefaultPrecompilePlugin {
    fn get_precompiles(&self, rules: &Rules) -> Vec<Registrable> {
        let mut registrables = default_precompiles(rules);
        registrables.extend(self.extra.iter().cloned());
        registrables
    }

    fn kv_gas_config(&self) -> GasConfig {
        self.kv_gas_config
    }
}

/// Transaction admission.
pub trait TxPoolPlugin: Send + Sync {
    fn send_tx(&self, tx: Transaction) -> Result<(), CoreError>;

    /// Executable transactions per sender, nonce ordered.
    fn pending(&self, enforce_tips: bool) -> PoolContent;

    fn get(&self, hash: B256) -> Option<Transaction>;

    /// Next usable nonce for `address`.
    fn nonce(&self, address: Address) -> u64;

    /// Pending and queued transaction counts.
    fn stats(&self) -> (usize, usize);

    /// Pending and queued transactions of every sender.
    fn content(&self) -> (PoolContent, PoolContent);

    fn content_from(&self, address: Address) -> (Vec<Transaction>, Vec<Transaction>);

    fn subscribe_new_txs(&self) -> broadcast::Receiver<NewTxsEvent>;
}

/// The full set of plugins a chain runs on.
pub struct Host {
    pub block: Box<dyn BlockPlugin>,
    pub configuration: Box<dyn ConfigurationPlugin>,
    pub gas: Box<dyn GasPlugin>,
    pub state: Box<dyn StatePlugin>,
    pub precompile: Box<dyn PrecompilePlugin>,
    pub historical: Option<Arc<dyn HistoricalPlugin>>,
    pub txpool: Option<Arc<dyn TxPoolPlugin>>,
}

impl Host {
    pub fn new(
        block: Box<dyn BlockPlugin>,
        configuration: Box<dyn ConfigurationPlugin>,
        gas: Box<dyn GasPlugin>,
        state: Box<dyn StatePlugin>,
        precompile: Box<dyn PrecompilePlugin>,
    ) -> Self {
        Self {
            block,
            configuration,
            gas,
            state,
            precompile,
            historical: None,
            txpool: None,
        }
    }

    pub fn with_historical(mut self, historical: Arc<dyn HistoricalPlugin>) -> Self {
        self.historical = Some(historical);
        self
    }

    pub fn with_txpool(mut self, txpool: Arc<dyn TxPoolPlugin>) -> Self {
        self.txpool = Some(txpool);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::address_from_low_u64;
    use strata_vm::Identity;

    #[test]
    fn test_gas_meter_as_plugin() {
        let mut gas: Box<dyn GasPlugin> = Box::new(GasMeter::new(0, 0));
        gas.prepare(1_000_000);
        assert_eq!(gas.block_gas_limit(), 1_000_000);

        gas.reset(50_000);
        gas.consume_gas(21_000).unwrap();
        assert_eq!(gas.gas_consumed(), 21_000);
        assert_eq!(gas.gas_remaining(), 29_000);

        gas.reset(50_000);
        assert_eq!(gas.block_gas_consumed(), 21_000);
        assert_eq!(gas.gas_consumed(), 0);
    }

    #[test]
    fn test_default_precompiles_active() {
        let plugin = DefaultPrecompilePlugin::new();
        let active = plugin.get_active(&Rules::default());
        assert_eq!(active, vec![address_from_low_u64(4)]);
    }

    #[test]
    fn test_active_addresses_are_deduplicated() {
        let plugin = DefaultPrecompilePlugin::new()
            .with_precompile(Registrable::Stateless(Arc::new(Identity)));
        assert_eq!(plugin.get_precompiles(&Rules::default()).len(), 2);
        assert_eq!(plugin.get_active(&Rules::default()).len(), 1);
    }
}
