//! Strata Core - the block and transaction lifecycle.
//!
//! A host chain supplies its storage, gas, block and configuration
//! capabilities as plugins ([`plugins`]) and an EVM interpreter through
//! [`EvmFactory`]. [`Chain`] then drives each block through
//! Prepare → ProcessTransaction* → Finalize and publishes the result to
//! readers and event subscribers.

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod evm;
pub mod fee_market;
pub mod plugins;
pub mod processor;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::BoundedCache;
pub use chain::{Chain, ChainReader, LifecycleState};
pub use config::{CacheConfig, EventConfig, LoggingConfig, RuntimeConfig};
pub use error::CoreError;
pub use events::{ChainEvent, ChainFeeds, ChainHeadEvent, NewTxsEvent};
pub use evm::{BlockContext, Evm, EvmFactory, ExecutionEnv, ExecutionResult};
pub use fee_market::calc_base_fee;
pub use plugins::{
    BlockPlugin, ConfigurationPlugin, DefaultPrecompilePlugin, GasPlugin, HistoricalPlugin, Host,
    PoolContent, PrecompilePlugin, TxPoolPlugin,
};
pub use processor::{FinalizedBlock, StateProcessor};
pub use telemetry::init_telemetry;
