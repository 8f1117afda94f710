//! Chain and mempool event feeds.
//!
//! Feeds are broadcast channels: every subscriber sees every event sent
//! after it subscribed, and a send with no subscribers is dropped.

use std::sync::Arc;

use alloy_primitives::B256;
use strata_types::{Block, Log, Transaction};
use tokio::sync::broadcast;
use tracing::trace;

/// A block was finalized.
#[derive(Debug, Clone)]
pub struct ChainEvent {
    pub block: Arc<Block>,
    pub hash: B256,
    pub logs: Arc<Vec<Log>>,
}

/// The canonical head moved.
#[derive(Debug, Clone)]
pub struct ChainHeadEvent {
    pub block: Arc<Block>,
}

/// Transactions became pending in the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTxsEvent {
    pub txs: Vec<Transaction>,
}

/// Broadcast senders for every chain feed.
#[derive(Debug, Clone)]
pub struct ChainFeeds {
    chain: broadcast::Sender<ChainEvent>,
    chain_head: broadcast::Sender<ChainHeadEvent>,
    logs: broadcast::Sender<Arc<Vec<Log>>>,
    pending_logs: broadcast::Sender<Arc<Vec<Log>>>,
}

impl ChainFeeds {
    /// Create feeds buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chain: broadcast::channel(capacity).0,
            chain_head: broadcast::channel(capacity).0,
            logs: broadcast::channel(capacity).0,
            pending_logs: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe_chain(&self) -> broadcast::Receiver<ChainEvent> {
        self.chain.subscribe()
    }

    pub fn subscribe_chain_head(&self) -> broadcast::Receiver<ChainHeadEvent> {
        self.chain_head.subscribe()
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<Arc<Vec<Log>>> {
        self.logs.subscribe()
    }

    pub fn subscribe_pending_logs(&self) -> broadcast::Receiver<Arc<Vec<Log>>> {
        self.pending_logs.subscribe()
    }

    /// Announce a finalized block on every feed.
    ///
    /// The logs feed only fires when the block produced logs.
    pub fn publish(&self, block: Arc<Block>, hash: B256, logs: Arc<Vec<Log>>) {
        let _ = self.pending_logs.send(Arc::clone(&logs));
        if !logs.is_empty() {
            let _ = self.logs.send(Arc::clone(&logs));
        }
        let _ = self.chain.send(ChainEvent {
            block: Arc::clone(&block),
            hash,
            logs,
        });
        let _ = self.chain_head.send(ChainHeadEvent { block });
        trace!(%hash, "Published chain events");
    }
}

impl Default for ChainFeeds {
    fn default() -> Self {
        Self::new(128)
    }
}
