//! In-memory host plugins for tests.
//!
//! [`MockHost`] assembles a [`Host`] from the mocks below; combined with
//! [`MockEvmFactory`] it drives whole blocks without a real host chain.

mod evm;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_types::{
    address_from_low_u64, Address, Block, Bytes, ChainConfig, Header, Receipt, Transaction,
    TxLookupEntry, B256, U256,
};
use strata_vm::{Account, GasConfig, GasMeter, MemoryStatePlugin, Registrable};

pub use evm::{
    create_address, MockEvm, MockEvmFactory, CODE_DEPOSIT_GAS, INVALID_OPCODE, LOG_DATA_GAS,
    LOG_GAS,
};

use crate::chain::Chain;
use crate::config::RuntimeConfig;
use crate::error::CoreError;
use crate::plugins::{
    BlockPlugin, ConfigurationPlugin, DefaultPrecompilePlugin, HistoricalPlugin, Host,
    TxPoolPlugin,
};

pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const COINBASE: Address = address_from_low_u64(0xc0b);
pub const DEFAULT_GAS_LIMIT: u64 = 100_000;

/// Headers shared between a [`MockBlockPlugin`] and the test holding it.
pub type HeaderStore = Arc<RwLock<BTreeMap<u64, Header>>>;

/// A sealed transaction paying a gas price of 1.
pub fn tx(from: Address, nonce: u64, to: Option<Address>, value: u64, input: Bytes) -> Transaction {
    Transaction::new(
        from,
        nonce,
        to,
        U256::from(value),
        DEFAULT_GAS_LIMIT,
        U256::from(1),
        input,
    )
}

/// A plain value transfer.
pub fn transfer(from: Address, nonce: u64, to: Address, value: u64) -> Transaction {
    tx(from, nonce, Some(to), value, Bytes::new())
}

pub struct MockBlockPlugin {
    headers: HeaderStore,
    coinbase: Address,
    base_fee: Option<U256>,
    prepared: Option<u64>,
}

impl MockBlockPlugin {
    pub fn new(coinbase: Address, headers: HeaderStore) -> Self {
        Self {
            headers,
            coinbase,
            base_fee: None,
            prepared: None,
        }
    }

    pub fn with_base_fee(mut self, base_fee: U256) -> Self {
        self.base_fee = Some(base_fee);
        self
    }

    pub fn prepared(&self) -> Option<u64> {
        self.prepared
    }
}

impl BlockPlugin for MockBlockPlugin {
    fn prepare(&mut self, number: u64) {
        self.prepared = Some(number);
    }

    fn get_new_block_metadata(&self, number: u64) -> (Address, u64) {
        (self.coinbase, GENESIS_TIME + number * 2)
    }

    fn get_header_by_number(&self, number: u64) -> Result<Header, CoreError> {
        self.headers
            .read()
            .get(&number)
            .cloned()
            .ok_or(CoreError::HeaderNotFound(number))
    }

    fn set_header_by_number(&mut self, header: &Header) -> Result<(), CoreError> {
        self.headers.write().insert(header.number, header.clone());
        Ok(())
    }

    fn base_fee(&self) -> Option<U256> {
        self.base_fee
    }
}

pub struct MockConfigurationPlugin {
    config: ChainConfig,
    fee_collector: Option<Address>,
}

impl MockConfigurationPlugin {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            fee_collector: None,
        }
    }

    pub fn with_fee_collector(mut self, fee_collector: Address) -> Self {
        self.fee_collector = Some(fee_collector);
        self
    }
}

impl ConfigurationPlugin for MockConfigurationPlugin {
    fn prepare(&mut self) {}

    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    fn fee_collector(&self) -> Option<Address> {
        self.fee_collector
    }
}

/// Block storage in memory.
#[derive(Default)]
pub struct MockHistoricalPlugin {
    blocks: RwLock<BTreeMap<u64, Block>>,
    numbers: RwLock<HashMap<B256, u64>>,
    receipts: RwLock<HashMap<B256, Vec<Receipt>>>,
    txs: RwLock<HashMap<B256, TxLookupEntry>>,
    fail_writes: AtomicBool,
}

impl MockHistoricalPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every store call fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::Plugin("historical store unavailable".to_string()));
        }
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn tx_count(&self) -> usize {
        self.txs.read().len()
    }
}

impl HistoricalPlugin for MockHistoricalPlugin {
    fn store_block(&self, block: &Block) -> Result<(), CoreError> {
        self.check_writable()?;
        self.numbers.write().insert(block.hash(), block.number());
        self.blocks.write().insert(block.number(), block.clone());
        Ok(())
    }

    fn store_receipts(&self, block_hash: B256, receipts: &[Receipt]) -> Result<(), CoreError> {
        self.check_writable()?;
        self.receipts.write().insert(block_hash, receipts.to_vec());
        Ok(())
    }

    fn store_transactions(
        &self,
        block_number: u64,
        block_hash: B256,
        txs: &[Transaction],
    ) -> Result<(), CoreError> {
        self.check_writable()?;
        let mut stored = self.txs.write();
        for (index, tx) in txs.iter().enumerate() {
            stored.insert(
                tx.hash(),
                TxLookupEntry {
                    tx: tx.clone(),
                    index: index as u64,
                    block_number,
                    block_hash,
                },
            );
        }
        Ok(())
    }

    fn get_block_by_number(&self, number: u64) -> Result<Option<Block>, CoreError> {
        Ok(self.blocks.read().get(&number).cloned())
    }

    fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block>, CoreError> {
        let Some(number) = self.numbers.read().get(&hash).copied() else {
            return Ok(None);
        };
        self.get_block_by_number(number)
    }

    fn get_receipts_by_hash(&self, block_hash: B256) -> Result<Option<Vec<Receipt>>, CoreError> {
        Ok(self.receipts.read().get(&block_hash).cloned())
    }

    fn get_transaction_by_hash(&self, tx_hash: B256) -> Result<Option<TxLookupEntry>, CoreError> {
        Ok(self.txs.read().get(&tx_hash).cloned())
    }
}

/// Builder for a [`Host`] made of in-memory plugins.
pub struct MockHost {
    chain_config: ChainConfig,
    accounts: Vec<(Address, Account)>,
    coinbase: Address,
    base_fee: Option<U256>,
    fee_collector: Option<Address>,
    block_gas_limit: u64,
    precompiles: Vec<Registrable>,
    kv_gas_config: GasConfig,
    headers: HeaderStore,
    historical: Option<Arc<dyn HistoricalPlugin>>,
    txpool: Option<Arc<dyn TxPoolPlugin>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            chain_config: ChainConfig::default(),
            accounts: Vec::new(),
            coinbase: COINBASE,
            base_fee: None,
            fee_collector: None,
            block_gas_limit: 0,
            precompiles: Vec::new(),
            kv_gas_config: GasConfig::default(),
            headers: HeaderStore::default(),
            historical: None,
            txpool: None,
        }
    }

    pub fn with_chain_config(mut self, config: ChainConfig) -> Self {
        self.chain_config = config;
        self
    }

    /// Fund `address` at genesis.
    pub fn with_account(mut self, address: Address, balance: U256) -> Self {
        self.accounts.push((address, Account::with_balance(balance)));
        self
    }

    pub fn with_base_fee(mut self, base_fee: U256) -> Self {
        self.base_fee = Some(base_fee);
        self
    }

    pub fn with_fee_collector(mut self, fee_collector: Address) -> Self {
        self.fee_collector = Some(fee_collector);
        self
    }

    /// Explicit block gas limit; zero falls back to the consensus maximum.
    pub fn with_block_gas_limit(mut self, limit: u64) -> Self {
        self.block_gas_limit = limit;
        self
    }

    pub fn with_precompile(mut self, registrable: Registrable) -> Self {
        self.precompiles.push(registrable);
        self
    }

    pub fn with_kv_gas_config(mut self, config: GasConfig) -> Self {
        self.kv_gas_config = config;
        self
    }

    pub fn with_historical(mut self, historical: Arc<dyn HistoricalPlugin>) -> Self {
        self.historical = Some(historical);
        self
    }

    pub fn with_txpool(mut self, txpool: Arc<dyn TxPoolPlugin>) -> Self {
        self.txpool = Some(txpool);
        self
    }

    /// Headers written by the block plugin.
    pub fn headers(&self) -> HeaderStore {
        Arc::clone(&self.headers)
    }

    pub fn build(self) -> Host {
        let mut block = MockBlockPlugin::new(self.coinbase, self.headers);
        if let Some(base_fee) = self.base_fee {
            block = block.with_base_fee(base_fee);
        }

        let mut configuration = MockConfigurationPlugin::new(self.chain_config);
        if let Some(fee_collector) = self.fee_collector {
            configuration = configuration.with_fee_collector(fee_collector);
        }

        let state = self
            .accounts
            .into_iter()
            .fold(MemoryStatePlugin::new(), |state, (address, account)| {
                state.with_account(address, account)
            });

        let precompile = self
            .precompiles
            .into_iter()
            .fold(DefaultPrecompilePlugin::new(), |plugin, registrable| {
                plugin.with_precompile(registrable)
            })
            .with_kv_gas_config(self.kv_gas_config);

        let mut host = Host::new(
            Box::new(block),
            Box::new(configuration),
            Box::new(GasMeter::new(self.block_gas_limit, 0)),
            Box::new(state),
            Box::new(precompile),
        );
        host.historical = self.historical;
        host.txpool = self.txpool;
        host
    }

    /// A chain over this host running [`MockEvm`].
    pub fn build_chain(self) -> Result<Chain, CoreError> {
        Chain::new(
            self.build(),
            Box::new(MockEvmFactory),
            RuntimeConfig::default(),
        )
    }
}
