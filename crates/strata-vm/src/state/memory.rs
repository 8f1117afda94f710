//! An in-memory state plugin with per-block history.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use parking_lot::RwLock;
use tracing::trace;

use super::plugin::{GasConfig, StatePlugin};
use crate::error::VmError;
use crate::snapshot::Controllable;

/// Account record held by [`MemoryStatePlugin`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: BTreeMap<B256, B256>,
}

impl Account {
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }
}

type Accounts = BTreeMap<Address, Account>;

/// Reference [`StatePlugin`] backed by ordered maps.
///
/// Snapshots copy the account set. History is shared between a plugin and
/// every view returned from `get_state_by_number`.
#[derive(Debug)]
pub struct MemoryStatePlugin {
    accounts: Accounts,
    committed: Accounts,
    snapshots: Vec<Accounts>,
    gas_config: GasConfig,
    storage_gas: AtomicU64,
    history: Arc<RwLock<BTreeMap<u64, Accounts>>>,
    block: u64,
}

impl Default for MemoryStatePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStatePlugin {
    pub fn new() -> Self {
        Self {
            accounts: Accounts::new(),
            committed: Accounts::new(),
            snapshots: Vec::new(),
            gas_config: GasConfig::empty(),
            storage_gas: AtomicU64::new(0),
            history: Arc::new(RwLock::new(BTreeMap::new())),
            block: 0,
        }
    }

    /// Seed a committed account, as genesis allocation.
    pub fn with_account(mut self, address: Address, account: Account) -> Self {
        self.accounts.insert(address, account.clone());
        self.committed.insert(address, account);
        self
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Number of blocks prepared so far.
    pub fn block(&self) -> u64 {
        self.block
    }

    fn charge(&self, gas: u64) {
        if gas > 0 {
            self.storage_gas.fetch_add(gas, Ordering::Relaxed);
        }
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    fn view(&self, accounts: Accounts) -> Self {
        Self {
            accounts: accounts.clone(),
            committed: accounts,
            snapshots: Vec::new(),
            gas_config: GasConfig::empty(),
            storage_gas: AtomicU64::new(0),
            history: Arc::clone(&self.history),
            block: self.block,
        }
    }
}

impl Controllable for MemoryStatePlugin {
    fn registry_key(&self) -> &'static str {
        "state"
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.accounts.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        if id >= self.snapshots.len() {
            return;
        }
        self.snapshots.truncate(id + 1);
        if let Some(accounts) = self.snapshots.pop() {
            self.accounts = accounts;
        }
    }

    fn finalize(&mut self) {
        self.committed = self.accounts.clone();
        self.snapshots.clear();
    }
}

impl StatePlugin for MemoryStatePlugin {
    fn prepare(&mut self) {
        self.history.write().insert(self.block, self.committed.clone());
        self.block += 1;
        self.snapshots.clear();
        trace!(block = self.block, "Prepared memory state");
    }

    fn reset(&mut self) {
        self.storage_gas.store(0, Ordering::Relaxed);
    }

    fn create_account(&mut self, address: Address) {
        let balance = self.get_balance(address);
        self.accounts.insert(address, Account::with_balance(balance));
    }

    fn exist(&self, address: Address) -> bool {
        self.charge(self.gas_config.has_cost);
        self.accounts.contains_key(&address)
    }

    fn get_balance(&self, address: Address) -> U256 {
        self.charge(self.gas_config.read_cost(32));
        self.accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        self.charge(self.gas_config.write_cost(32));
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_add(amount);
    }

    fn sub_balance(&mut self, address: Address, amount: U256) {
        self.charge(self.gas_config.write_cost(32));
        let account = self.account_mut(address);
        account.balance = account.balance.saturating_sub(amount);
    }

    fn get_nonce(&self, address: Address) -> u64 {
        self.charge(self.gas_config.read_cost(8));
        self.accounts.get(&address).map(|a| a.nonce).unwrap_or(0)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.charge(self.gas_config.write_cost(8));
        self.account_mut(address).nonce = nonce;
    }

    fn get_code(&self, address: Address) -> Bytes {
        let code = self
            .accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default();
        self.charge(self.gas_config.read_cost(code.len() as u64));
        code
    }

    fn get_code_hash(&self, address: Address) -> B256 {
        self.charge(self.gas_config.read_cost(32));
        self.accounts
            .get(&address)
            .map(|a| keccak256(&a.code))
            .unwrap_or_default()
    }

    fn set_code(&mut self, address: Address, code: Bytes) {
        self.charge(self.gas_config.write_cost(code.len() as u64));
        self.account_mut(address).code = code;
    }

    fn get_state(&self, address: Address, key: B256) -> B256 {
        self.charge(self.gas_config.read_cost(32));
        self.accounts
            .get(&address)
            .and_then(|a| a.storage.get(&key).copied())
            .unwrap_or_default()
    }

    fn get_committed_state(&self, address: Address, key: B256) -> B256 {
        self.charge(self.gas_config.read_cost(32));
        self.committed
            .get(&address)
            .and_then(|a| a.storage.get(&key).copied())
            .unwrap_or_default()
    }

    fn set_state(&mut self, address: Address, key: B256, value: B256) {
        if value.is_zero() {
            self.charge(self.gas_config.delete_cost);
            self.account_mut(address).storage.remove(&key);
        } else {
            self.charge(self.gas_config.write_cost(32));
            self.account_mut(address).storage.insert(key, value);
        }
    }

    fn delete_accounts(&mut self, addresses: &[Address]) {
        for address in addresses {
            self.charge(self.gas_config.delete_cost);
            self.accounts.remove(address);
        }
    }

    fn gas_config(&self) -> GasConfig {
        self.gas_config
    }

    fn set_gas_config(&mut self, config: GasConfig) {
        self.gas_config = config;
    }

    fn storage_gas_consumed(&self) -> u64 {
        self.storage_gas.load(Ordering::Relaxed)
    }

    fn get_state_by_number(&self, number: u64) -> Result<Box<dyn StatePlugin>, VmError> {
        if number >= self.block {
            return Ok(Box::new(self.view(self.committed.clone())));
        }
        let accounts = self
            .history
            .read()
            .get(&number)
            .cloned()
            .ok_or_else(|| VmError::State(format!("No state recorded for block {number}")))?;
        Ok(Box::new(self.view(accounts)))
    }
}
