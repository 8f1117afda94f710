//! Transaction pool management.
//!
//! Each sender's transactions live in one nonce-keyed map next to the
//! on-chain nonce last seen for that sender and the end of its pending run.
//! A transaction enters pending only at the on-chain nonce; its arrival
//! promotes the queued successors chained behind it. Later nonces wait in
//! queued until the chain catches up and [`TxPool::prune`] promotes them.
//! Removing a pending transaction demotes everything after it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use strata_core::{CoreError, NewTxsEvent, PoolContent, TxPoolPlugin};
use strata_types::{Address, Transaction, B256, U256};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::PoolError;
use crate::nonce::NonceRetriever;

/// Configuration for the transaction pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum transactions per sender
    pub max_per_account: usize,
    /// Maximum transactions in the pool
    pub max_total: usize,
    /// Gas price below which `pending(true)` cuts a sender's run
    pub min_tip: U256,
    /// Buffered new-transaction events per subscriber
    pub event_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_account: 64,
            max_total: 10_000,
            min_tip: U256::ZERO,
            event_capacity: 128,
        }
    }
}

/// Pool statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Transactions ready for a block
    pub pending: usize,
    /// Transactions behind a nonce gap
    pub queued: usize,
}

impl PoolStats {
    pub fn total(&self) -> usize {
        self.pending + self.queued
    }
}

/// Where an admitted transaction landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Pending,
    Queued,
}

#[derive(Debug, Default)]
struct AccountTxs {
    /// On-chain nonce when last refreshed
    base: u64,
    /// Pending holds exactly the nonces in `base..pending_end`
    pending_end: u64,
    txs: BTreeMap<u64, Transaction>,
}

impl AccountTxs {
    fn pending(&self) -> impl Iterator<Item = &Transaction> {
        self.txs.range(self.base..self.pending_end).map(|(_, tx)| tx)
    }

    fn queued(&self) -> impl Iterator<Item = &Transaction> {
        self.txs.range(self.pending_end..).map(|(_, tx)| tx)
    }

    fn is_pending(&self, nonce: u64) -> bool {
        (self.base..self.pending_end).contains(&nonce)
    }

    /// Extend the pending run over every queued successor chained to it.
    fn promote(&mut self) {
        self.pending_end = contiguous_from(&self.txs, self.pending_end);
    }

    fn pending_hashes(&self) -> Vec<B256> {
        self.pending().map(Transaction::hash).collect()
    }

    /// Move to a new on-chain nonce, returning transactions it made stale.
    fn rebase(&mut self, base: u64) -> Vec<Transaction> {
        if base < self.base {
            self.pending_end = base;
        }
        self.base = base;
        let kept = self.txs.split_off(&base);
        let stale = std::mem::replace(&mut self.txs, kept).into_values().collect();

        self.pending_end = self.pending_end.max(base);
        if self.pending_end == base {
            self.promote();
        }
        stale
    }
}

fn contiguous_from(txs: &BTreeMap<u64, Transaction>, start: u64) -> u64 {
    let mut next = start;
    while txs.contains_key(&next) {
        next += 1;
    }
    next
}

/// Nonce-ordered transaction pool.
///
/// Per-sender maps sit behind one lock so admission and removal are atomic;
/// the hash index is read without it.
pub struct TxPool {
    config: PoolConfig,
    nonces: Arc<dyn NonceRetriever>,
    accounts: RwLock<HashMap<Address, AccountTxs>>,
    /// All transactions by hash
    all: DashMap<B256, Transaction>,
    new_txs: broadcast::Sender<NewTxsEvent>,
}

impl fmt::Debug for TxPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TxPool {
    /// Create a new transaction pool.
    pub fn new(config: PoolConfig, nonces: Arc<dyn NonceRetriever>) -> Self {
        let (new_txs, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            nonces,
            accounts: RwLock::new(HashMap::new()),
            all: DashMap::new(),
            new_txs,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Admit a transaction into a free nonce slot.
    pub fn insert(&self, tx: Transaction) -> Result<PoolStatus, PoolError> {
        self.add(tx, false).map(|(status, _)| status)
    }

    /// Swap the transaction occupying the same sender and nonce for `tx`,
    /// returning the one it displaced.
    pub fn replace(&self, tx: Transaction) -> Result<Transaction, PoolError> {
        let nonce = tx.nonce;
        match self.add(tx, true)? {
            (_, Some(replaced)) => Ok(replaced),
            (_, None) => Err(PoolError::NothingToReplace(nonce)),
        }
    }

    fn add(
        &self,
        tx: Transaction,
        replace: bool,
    ) -> Result<(PoolStatus, Option<Transaction>), PoolError> {
        if tx.is_empty() {
            return Err(PoolError::InvalidTransaction(
                "transaction was never sealed".to_string(),
            ));
        }

        let sender = tx.from;
        let base = self.nonces.nonce(sender);
        if tx.nonce < base {
            return Err(PoolError::NonceTooLow {
                expected: base,
                got: tx.nonce,
            });
        }

        let hash = tx.hash();
        let nonce = tx.nonce;
        let mut accounts = self.accounts.write();
        let account = accounts.entry(sender).or_default();

        let before = account.pending_hashes();
        let stale = account.rebase(base);
        self.forget(&stale);

        let admitted = self.admit(account, tx, replace);
        let announced: Vec<Transaction> = account
            .pending()
            .filter(|pending| !before.contains(&pending.hash()))
            .cloned()
            .collect();
        let status = if account.is_pending(nonce) {
            PoolStatus::Pending
        } else {
            PoolStatus::Queued
        };
        if account.txs.is_empty() {
            accounts.remove(&sender);
        }
        drop(accounts);

        self.announce(announced);
        let replaced = admitted?;
        debug!(
            %hash,
            %sender,
            nonce,
            ?status,
            replaced = replaced.is_some(),
            "Transaction admitted"
        );
        Ok((status, replaced))
    }

    fn admit(
        &self,
        account: &mut AccountTxs,
        tx: Transaction,
        replace: bool,
    ) -> Result<Option<Transaction>, PoolError> {
        let hash = tx.hash();
        if self.all.contains_key(&hash) {
            return Err(PoolError::AlreadyKnown(hash));
        }

        // a queued slot is overwritten; a pending one needs an explicit replace
        let occupant = account.txs.get(&tx.nonce).map(Transaction::hash);
        let replaced = match occupant {
            Some(existing) if !replace && account.is_pending(tx.nonce) => {
                return Err(PoolError::ReplacementNotAllowed {
                    nonce: tx.nonce,
                    existing,
                });
            }
            Some(_) => account.txs.remove(&tx.nonce),
            None if replace => return Err(PoolError::NothingToReplace(tx.nonce)),
            None => {
                if account.txs.len() >= self.config.max_per_account {
                    return Err(PoolError::PoolFull(format!(
                        "sender {} holds {} transactions",
                        tx.from,
                        account.txs.len()
                    )));
                }
                if self.all.len() >= self.config.max_total {
                    return Err(PoolError::PoolFull(format!(
                        "pool holds {} transactions",
                        self.all.len()
                    )));
                }
                None
            }
        };

        if let Some(old) = &replaced {
            self.all.remove(&old.hash());
        }
        let nonce = tx.nonce;
        self.all.insert(hash, tx.clone());
        account.txs.insert(nonce, tx);
        if nonce == account.base && account.pending_end == account.base {
            account.promote();
        }
        Ok(replaced)
    }

    /// Drop a transaction; successors behind the new gap fall back to queued.
    pub fn remove(&self, hash: B256) -> Option<Transaction> {
        let mut accounts = self.accounts.write();
        let (_, tx) = self.all.remove(&hash)?;

        let mut demoted = 0;
        if let Some(account) = accounts.get_mut(&tx.from) {
            account.txs.remove(&tx.nonce);
            if account.is_pending(tx.nonce) {
                demoted = account.txs.range(tx.nonce + 1..account.pending_end).count();
                account.pending_end = tx.nonce;
            }
            if account.txs.is_empty() {
                accounts.remove(&tx.from);
            }
        }

        debug!(%hash, sender = %tx.from, nonce = tx.nonce, demoted, "Transaction removed");
        Some(tx)
    }

    /// Refresh every sender from its on-chain nonce, dropping transactions
    /// that already executed. Returns the dropped transactions.
    pub fn prune(&self) -> Vec<Transaction> {
        let mut accounts = self.accounts.write();
        let mut dropped = Vec::new();
        let mut announced = Vec::new();

        for (sender, account) in accounts.iter_mut() {
            let before = account.pending_hashes();
            let stale = account.rebase(self.nonces.nonce(*sender));
            self.forget(&stale);
            dropped.extend(stale);
            announced.extend(
                account
                    .pending()
                    .filter(|pending| !before.contains(&pending.hash()))
                    .cloned(),
            );
        }
        accounts.retain(|_, account| !account.txs.is_empty());
        drop(accounts);

        trace!(dropped = dropped.len(), promoted = announced.len(), "Pool pruned");
        self.announce(announced);
        dropped
    }

    fn forget(&self, txs: &[Transaction]) {
        for tx in txs {
            self.all.remove(&tx.hash());
        }
    }

    fn announce(&self, txs: Vec<Transaction>) {
        if !txs.is_empty() {
            let _ = self.new_txs.send(NewTxsEvent { txs });
        }
    }

    /// Next usable nonce for `address`: its on-chain nonce, or one past
    /// the sender's pending run when that is further.
    pub fn nonce(&self, address: Address) -> u64 {
        let base = self.nonces.nonce(address);
        match self.accounts.read().get(&address) {
            Some(account) => account.pending_end.max(base),
            None => base,
        }
    }

    /// Executable transactions per sender, nonce ordered.
    ///
    /// With `enforce_tips` a sender's run stops at the first transaction
    /// priced under the configured minimum tip.
    pub fn pending(&self, enforce_tips: bool) -> PoolContent {
        let accounts = self.accounts.read();
        let mut content = PoolContent::new();
        for (sender, account) in accounts.iter() {
            let run: Vec<Transaction> = account
                .pending()
                .take_while(|tx| !enforce_tips || tx.gas_price >= self.config.min_tip)
                .cloned()
                .collect();
            if !run.is_empty() {
                content.insert(*sender, run);
            }
        }
        content
    }

    /// Transactions waiting on a nonce gap, per sender.
    pub fn queued(&self) -> PoolContent {
        let accounts = self.accounts.read();
        accounts
            .iter()
            .filter_map(|(sender, account)| {
                let queued: Vec<Transaction> = account.queued().cloned().collect();
                (!queued.is_empty()).then_some((*sender, queued))
            })
            .collect()
    }

    pub fn content(&self) -> (PoolContent, PoolContent) {
        (self.pending(false), self.queued())
    }

    pub fn content_from(&self, address: Address) -> (Vec<Transaction>, Vec<Transaction>) {
        match self.accounts.read().get(&address) {
            Some(account) => (
                account.pending().cloned().collect(),
                account.queued().cloned().collect(),
            ),
            None => (Vec::new(), Vec::new()),
        }
    }

    pub fn get(&self, hash: B256) -> Option<Transaction> {
        self.all.get(&hash).map(|tx| tx.clone())
    }

    pub fn contains(&self, hash: B256) -> bool {
        self.all.contains_key(&hash)
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let accounts = self.accounts.read();
        accounts
            .values()
            .fold(PoolStats::default(), |mut stats, account| {
                let pending = account.pending().count();
                stats.pending += pending;
                stats.queued += account.txs.len() - pending;
                stats
            })
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Subscribe to transactions entering the pending group.
    pub fn subscribe_new_txs(&self) -> broadcast::Receiver<NewTxsEvent> {
        self.new_txs.subscribe()
    }
}

impl TxPoolPlugin for TxPool {
    fn send_tx(&self, tx: Transaction) -> Result<(), CoreError> {
        self.insert(tx)?;
        Ok(())
    }

    fn pending(&self, enforce_tips: bool) -> PoolContent {
        TxPool::pending(self, enforce_tips)
    }

    fn get(&self, hash: B256) -> Option<Transaction> {
        TxPool::get(self, hash)
    }

    fn nonce(&self, address: Address) -> u64 {
        TxPool::nonce(self, address)
    }

    fn stats(&self) -> (usize, usize) {
        let stats = TxPool::stats(self);
        (stats.pending, stats.queued)
    }

    fn content(&self) -> (PoolContent, PoolContent) {
        TxPool::content(self)
    }

    fn content_from(&self, address: Address) -> (Vec<Transaction>, Vec<Transaction>) {
        TxPool::content_from(self, address)
    }

    fn subscribe_new_txs(&self) -> broadcast::Receiver<NewTxsEvent> {
        TxPool::subscribe_new_txs(self)
    }
}
