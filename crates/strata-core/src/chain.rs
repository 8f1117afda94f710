//! The block lifecycle driven by the host chain.
//!
//! The host calls [`Chain::prepare`] once per block, [`Chain::process_transaction`]
//! once per included transaction and [`Chain::finalize`] at block close.
//! Calls out of that order fail with [`CoreError::InvalidState`].
//!
//! Finalized blocks are published through a [`ChainReader`], which can be
//! cloned and queried from other threads while the next block is built.

use std::sync::Arc;

use derive_more::Display;
use parking_lot::RwLock;
use strata_types::{
    Block, ChainConfig, Header, Log, Receipt, Transaction, TxLookupEntry, B256, U256,
};
use strata_vm::StateDb;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::cache::BoundedCache;
use crate::config::RuntimeConfig;
use crate::error::CoreError;
use crate::events::{ChainEvent, ChainFeeds, ChainHeadEvent};
use crate::evm::{BlockContext, EvmFactory};
use crate::fee_market::calc_base_fee;
use crate::plugins::{BlockPlugin, ConfigurationPlugin, HistoricalPlugin, Host, TxPoolPlugin};
use crate::processor::{FinalizedBlock, StateProcessor};

/// Where the chain is in the block lifecycle.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "preparing")]
    Preparing,
    #[display(fmt = "accepting_transactions")]
    AcceptingTransactions,
    #[display(fmt = "finalizing")]
    Finalizing,
}

pub struct Chain {
    state: LifecycleState,
    block_plugin: Box<dyn BlockPlugin>,
    configuration: Box<dyn ConfigurationPlugin>,
    /// Takes precedence over the configuration plugin when set
    chain_config: Option<ChainConfig>,
    processor: StateProcessor,
    historical: Option<Arc<dyn HistoricalPlugin>>,
    txpool: Option<Arc<dyn TxPoolPlugin>>,
    reader: ChainReader,
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("state", &self.state)
            .field("processor", &self.processor)
            .field("historical", &self.historical.is_some())
            .field("txpool", &self.txpool.is_some())
            .finish()
    }
}

impl Chain {
    /// Assemble a chain from host plugins.
    ///
    /// The precompiles active at genesis are registered here, so an
    /// inconsistent precompile stops the chain from starting.
    pub fn new(
        host: Host,
        evm_factory: Box<dyn EvmFactory>,
        config: RuntimeConfig,
    ) -> Result<Self, CoreError> {
        config
            .validate()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        let processor = StateProcessor::new(host.state, host.gas, host.precompile, evm_factory)?;
        let reader = ChainReader::new(&config, host.historical.clone());

        let mut chain = Self {
            state: LifecycleState::Idle,
            block_plugin: host.block,
            configuration: host.configuration,
            chain_config: config.chain,
            processor,
            historical: host.historical,
            txpool: host.txpool,
            reader,
        };
        let rules = chain.chain_config().rules(0, 0);
        chain.processor.load_precompiles(&rules)?;

        info!(
            chain_id = rules.chain_id,
            precompiles = chain.processor.precompiles().len(),
            "Chain initialized"
        );
        Ok(chain)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn chain_config(&self) -> &ChainConfig {
        self.chain_config
            .as_ref()
            .unwrap_or_else(|| self.configuration.chain_config())
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), CoreError> {
        if self.state != expected {
            return Err(CoreError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    /// Start block `height`.
    ///
    /// # Panics
    /// Panics when the host cannot supply the parent header.
    pub fn prepare(&mut self, height: u64) -> Result<(), CoreError> {
        self.expect_state(LifecycleState::Idle)?;
        self.state = LifecycleState::Preparing;

        let result = self.prepare_block(height);
        self.state = match &result {
            Ok(()) => LifecycleState::AcceptingTransactions,
            Err(_) => LifecycleState::Idle,
        };
        result
    }

    fn prepare_block(&mut self, height: u64) -> Result<(), CoreError> {
        self.block_plugin.prepare(height);
        self.configuration.prepare();
        let chain_config = self.chain_config().clone();
        let gas_limit = self.processor.begin_block(chain_config.consensus_max_gas);

        let (coinbase, timestamp) = self.block_plugin.get_new_block_metadata(height);

        let parent_hash = if height > 1 {
            match self.block_plugin.get_header_by_number(height - 1) {
                Ok(parent) => parent.hash(),
                Err(e) => panic!("parent header of block {height} unavailable: {e}"),
            }
        } else {
            B256::ZERO
        };

        let base_fee = self.next_base_fee(&chain_config);
        info!(height, %coinbase, timestamp, %base_fee, gas_limit, "Preparing block");

        let header = Header::new(parent_hash, coinbase, height, gas_limit, timestamp, base_fee);
        let rules = chain_config.rules(height, timestamp);
        let context = BlockContext::new(&header, rules, self.configuration.fee_collector())
            .with_extra_eips(self.configuration.extra_eips());
        self.processor.prepare(header, context)
    }

    /// Base fee of the next block: the block plugin's override if any,
    /// else EIP-1559 over the last finalized block, else the initial fee.
    pub fn next_base_fee(&self, chain_config: &ChainConfig) -> U256 {
        if let Some(base_fee) = self.block_plugin.base_fee() {
            return base_fee;
        }
        match self.reader.finalized_block() {
            Some(parent) => calc_base_fee(chain_config, &parent.header),
            None => chain_config.initial_base_fee,
        }
    }

    /// Execute `tx` in the current block.
    ///
    /// A rejected transaction is rolled back and reported as an error;
    /// the block stays open for the next one.
    ///
    /// # Panics
    /// Panics on a structurally empty transaction.
    pub fn process_transaction(&mut self, tx: &Transaction) -> Result<Receipt, CoreError> {
        self.expect_state(LifecycleState::AcceptingTransactions)?;
        debug!(tx_hash = %tx.hash(), "Processing transaction");
        self.processor.process_transaction(tx)
    }

    /// Close the current block and publish it.
    ///
    /// State is committed and the block published to readers before it is
    /// handed to the host header store and the historical plugin. If either
    /// of those fails the error is returned, but the block stays final:
    /// the next height builds on it.
    pub fn finalize(&mut self) -> Result<Arc<Block>, CoreError> {
        self.expect_state(LifecycleState::AcceptingTransactions)?;
        self.state = LifecycleState::Finalizing;

        let result = self.finalize_block();
        self.state = LifecycleState::Idle;
        result
    }

    fn finalize_block(&mut self) -> Result<Arc<Block>, CoreError> {
        let finalized = self.processor.finalize()?;
        let block_hash = finalized.block.hash();
        let number = finalized.block.number();
        let block = self.reader.publish(finalized);
        let receipts = self.reader.current_receipts();
        info!(%block_hash, number, txs = block.tx_count(), "Finalized block");

        self.block_plugin.set_header_by_number(&block.header)?;
        if let Some(historical) = &self.historical {
            let persisted = historical
                .store_block(&block)
                .and_then(|()| historical.store_receipts(block_hash, &receipts))
                .and_then(|()| {
                    historical.store_transactions(number, block_hash, &block.transactions)
                });
            if let Err(e) = persisted {
                error!(%block_hash, number, error = %e, "Failed to persist finalized block");
                return Err(e);
            }
        }
        Ok(block)
    }

    /// Hand `tx` to the transaction pool.
    pub fn send_tx(&self, tx: Transaction) -> Result<(), CoreError> {
        match &self.txpool {
            Some(txpool) => txpool.send_tx(tx),
            None => Err(CoreError::TxPool("no transaction pool configured".to_string())),
        }
    }

    pub fn txpool(&self) -> Option<&Arc<dyn TxPoolPlugin>> {
        self.txpool.as_ref()
    }

    /// An independent state database over the state at `number`.
    pub fn get_state_by_number(&self, number: u64) -> Result<StateDb, CoreError> {
        self.processor.get_state_by_number(number)
    }

    /// A cloneable handle for reading published blocks.
    pub fn reader(&self) -> ChainReader {
        self.reader.clone()
    }

    pub fn processor(&self) -> &StateProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut StateProcessor {
        &mut self.processor
    }

    pub fn current_block(&self) -> Option<Arc<Block>> {
        self.reader.current_block()
    }

    pub fn finalized_block(&self) -> Option<Arc<Block>> {
        self.reader.finalized_block()
    }
}

struct ChainResources {
    current_block: RwLock<Option<Arc<Block>>>,
    finalized_block: RwLock<Option<Arc<Block>>>,
    current_receipts: RwLock<Arc<Vec<Receipt>>>,
    current_logs: RwLock<Arc<Vec<Log>>>,

    receipts: BoundedCache<B256, Arc<Vec<Receipt>>>,
    blocks_by_number: BoundedCache<u64, Arc<Block>>,
    blocks_by_hash: BoundedCache<B256, Arc<Block>>,
    tx_lookups: BoundedCache<B256, TxLookupEntry>,

    feeds: ChainFeeds,
    historical: Option<Arc<dyn HistoricalPlugin>>,
}

/// Read access to published blocks, shared across threads.
///
/// Lookups consult the bounded caches first and fall back to the
/// historical plugin when the host provides one.
#[derive(Clone)]
pub struct ChainReader {
    inner: Arc<ChainResources>,
}

impl std::fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReader")
            .field(
                "current_block",
                &self.current_block().map(|block| block.number()),
            )
            .field("cached_blocks", &self.inner.blocks_by_number.len())
            .finish()
    }
}

impl ChainReader {
    fn new(config: &RuntimeConfig, historical: Option<Arc<dyn HistoricalPlugin>>) -> Self {
        Self {
            inner: Arc::new(ChainResources {
                current_block: RwLock::new(None),
                finalized_block: RwLock::new(None),
                current_receipts: RwLock::new(Arc::new(Vec::new())),
                current_logs: RwLock::new(Arc::new(Vec::new())),
                receipts: BoundedCache::new(config.cache.receipts),
                blocks_by_number: BoundedCache::new(config.cache.blocks_by_number),
                blocks_by_hash: BoundedCache::new(config.cache.blocks_by_hash),
                tx_lookups: BoundedCache::new(config.cache.tx_lookups),
                feeds: ChainFeeds::new(config.events.channel_capacity),
                historical,
            }),
        }
    }

    /// Swap in a freshly finalized block and announce it.
    fn publish(&self, finalized: FinalizedBlock) -> Arc<Block> {
        let FinalizedBlock {
            block,
            receipts,
            logs,
        } = finalized;
        let block = Arc::new(block);
        let block_hash = block.hash();
        let receipts = Arc::new(receipts);
        let logs = Arc::new(logs);
        let inner = &self.inner;

        *inner.current_block.write() = Some(Arc::clone(&block));
        *inner.finalized_block.write() = Some(Arc::clone(&block));

        inner.blocks_by_number.put(block.number(), Arc::clone(&block));
        inner.blocks_by_hash.put(block_hash, Arc::clone(&block));
        for (index, tx) in block.transactions.iter().enumerate() {
            inner.tx_lookups.put(
                tx.hash(),
                TxLookupEntry {
                    tx: tx.clone(),
                    index: index as u64,
                    block_number: block.number(),
                    block_hash,
                },
            );
        }

        *inner.current_receipts.write() = Arc::clone(&receipts);
        inner.receipts.put(block_hash, receipts);
        *inner.current_logs.write() = Arc::clone(&logs);

        inner.feeds.publish(Arc::clone(&block), block_hash, logs);
        block
    }

    /// The block most recently produced by the lifecycle.
    pub fn current_block(&self) -> Option<Arc<Block>> {
        self.inner.current_block.read().clone()
    }

    /// The latest block that can no longer change.
    pub fn finalized_block(&self) -> Option<Arc<Block>> {
        self.inner.finalized_block.read().clone()
    }

    pub fn current_receipts(&self) -> Arc<Vec<Receipt>> {
        Arc::clone(&self.inner.current_receipts.read())
    }

    pub fn current_logs(&self) -> Arc<Vec<Log>> {
        Arc::clone(&self.inner.current_logs.read())
    }

    pub fn get_block_by_number(&self, number: u64) -> Result<Option<Arc<Block>>, CoreError> {
        if let Some(block) = self.inner.blocks_by_number.get(&number) {
            return Ok(Some(block));
        }
        let Some(historical) = &self.inner.historical else {
            return Ok(None);
        };
        Ok(historical.get_block_by_number(number)?.map(|block| {
            let block = Arc::new(block);
            self.inner.blocks_by_number.put(number, Arc::clone(&block));
            block
        }))
    }

    pub fn get_block_by_hash(&self, hash: B256) -> Result<Option<Arc<Block>>, CoreError> {
        if let Some(block) = self.inner.blocks_by_hash.get(&hash) {
            return Ok(Some(block));
        }
        let Some(historical) = &self.inner.historical else {
            return Ok(None);
        };
        Ok(historical.get_block_by_hash(hash)?.map(|block| {
            let block = Arc::new(block);
            self.inner.blocks_by_hash.put(hash, Arc::clone(&block));
            block
        }))
    }

    pub fn get_receipts_by_block_hash(
        &self,
        hash: B256,
    ) -> Result<Option<Arc<Vec<Receipt>>>, CoreError> {
        if let Some(receipts) = self.inner.receipts.get(&hash) {
            return Ok(Some(receipts));
        }
        let Some(historical) = &self.inner.historical else {
            return Ok(None);
        };
        Ok(historical.get_receipts_by_hash(hash)?.map(|receipts| {
            let receipts = Arc::new(receipts);
            self.inner.receipts.put(hash, Arc::clone(&receipts));
            receipts
        }))
    }

    pub fn get_transaction_lookup(&self, tx_hash: B256) -> Result<Option<TxLookupEntry>, CoreError> {
        if let Some(entry) = self.inner.tx_lookups.get(&tx_hash) {
            return Ok(Some(entry));
        }
        let Some(historical) = &self.inner.historical else {
            return Ok(None);
        };
        let entry = historical.get_transaction_by_hash(tx_hash)?;
        if let Some(entry) = &entry {
            self.inner.tx_lookups.put(tx_hash, entry.clone());
        }
        Ok(entry)
    }

    pub fn subscribe_chain_events(&self) -> broadcast::Receiver<ChainEvent> {
        self.inner.feeds.subscribe_chain()
    }

    pub fn subscribe_chain_head_events(&self) -> broadcast::Receiver<ChainHeadEvent> {
        self.inner.feeds.subscribe_chain_head()
    }

    pub fn subscribe_logs_events(&self) -> broadcast::Receiver<Arc<Vec<Log>>> {
        self.inner.feeds.subscribe_logs()
    }

    pub fn subscribe_pending_logs_events(&self) -> broadcast::Receiver<Arc<Vec<Log>>> {
        self.inner.feeds.subscribe_pending_logs()
    }
}
