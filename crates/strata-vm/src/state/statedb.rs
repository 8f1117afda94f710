//! The interpreter-facing state database.
//!
//! `StateDb` combines the host's [`StatePlugin`] with the transaction-scoped
//! journals. A snapshot covers the plugin and every journal at once; a
//! revert rolls all of them back to the same instant.

use alloy_primitives::{Address, B256, U256};
use strata_types::{AccessListItem, Log, Rules};
use tracing::{debug, trace};

use super::plugin::StatePlugin;
use crate::error::VmError;
use crate::journal::{AccessList, DestroyedAccounts, Logs, Refund, TransientStorage};
use crate::snapshot::{CompositeSnapshot, Controller};

pub struct StateDb {
    plugin: Box<dyn StatePlugin>,
    logs: Logs,
    refund: Refund,
    access_list: AccessList,
    transient: TransientStorage,
    destroyed: DestroyedAccounts,
}

impl std::fmt::Debug for StateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDb")
            .field("plugin", &self.plugin.registry_key())
            .field("logs", &self.logs.len())
            .field("refund", &self.refund.get_refund())
            .field("destroyed", &self.destroyed.len())
            .finish()
    }
}

impl StateDb {
    /// Wrap a state plugin.
    ///
    /// # Errors
    /// Returns `DuplicateComponent` if the plugin's registry key collides
    /// with one of the journals.
    pub fn new(plugin: Box<dyn StatePlugin>) -> Result<Self, VmError> {
        let mut db = Self {
            plugin,
            logs: Logs::new(),
            refund: Refund::new(),
            access_list: AccessList::new(),
            transient: TransientStorage::new(),
            destroyed: DestroyedAccounts::new(),
        };
        db.controller()?;
        Ok(db)
    }

    fn controller(&mut self) -> Result<Controller<'_>, VmError> {
        let mut ctrl = Controller::new();
        ctrl.register(&mut self.plugin)?;
        ctrl.register(&mut self.logs)?;
        ctrl.register(&mut self.refund)?;
        ctrl.register(&mut self.access_list)?;
        ctrl.register(&mut self.transient)?;
        ctrl.register(&mut self.destroyed)?;
        Ok(ctrl)
    }

    fn journal_controller(&mut self) -> Result<Controller<'_>, VmError> {
        let mut ctrl = Controller::new();
        ctrl.register(&mut self.logs)?;
        ctrl.register(&mut self.refund)?;
        ctrl.register(&mut self.access_list)?;
        ctrl.register(&mut self.transient)?;
        ctrl.register(&mut self.destroyed)?;
        Ok(ctrl)
    }

    /// Snapshot the plugin and every journal.
    pub fn snapshot(&mut self) -> Result<CompositeSnapshot, VmError> {
        Ok(self.controller()?.snapshot())
    }

    pub fn revert_to_snapshot(&mut self, snapshot: &CompositeSnapshot) -> Result<(), VmError> {
        self.controller()?.revert_to_snapshot(snapshot)
    }

    /// Prepare the state for a new block.
    pub fn prepare_block(&mut self) {
        self.plugin.prepare();
    }

    /// Start a transaction: commit leftover journal state, clear the warm
    /// set and stamp the transaction onto future logs.
    pub fn reset(&mut self, tx_hash: B256, tx_index: u64) -> Result<(), VmError> {
        self.journal_controller()?.finalize();
        self.access_list.clear();
        self.logs.set_tx_context(tx_hash, tx_index);
        trace!(%tx_hash, tx_index, "Reset state for transaction");
        Ok(())
    }

    /// Commit the transaction: delete self-destructed accounts, then
    /// finalize the plugin and journals.
    pub fn finalize(&mut self) -> Result<(), VmError> {
        if !self.destroyed.is_empty() {
            debug!(count = self.destroyed.len(), "Deleting destroyed accounts");
            self.plugin.delete_accounts(self.destroyed.addresses());
        }
        self.controller()?.finalize();
        Ok(())
    }

    /// Warm the addresses and slots a transaction touches up front.
    ///
    /// Under Berlin: sender, destination, every active precompile and the
    /// transaction's access list. Under Shanghai: the coinbase too.
    pub fn prepare_access_list(
        &mut self,
        rules: &Rules,
        sender: Address,
        coinbase: Address,
        dest: Option<Address>,
        precompiles: &[Address],
        list: &[AccessListItem],
    ) {
        if !rules.is_berlin {
            return;
        }
        self.access_list.add_address(sender);
        if let Some(dest) = dest {
            self.access_list.add_address(dest);
        }
        for address in precompiles {
            self.access_list.add_address(*address);
        }
        for item in list {
            self.access_list.add_address(item.address);
            for key in &item.storage_keys {
                self.access_list.add_slot(item.address, *key);
            }
        }
        if rules.is_shanghai {
            self.access_list.add_address(coinbase);
        }
    }

    pub fn plugin(&self) -> &dyn StatePlugin {
        self.plugin.as_ref()
    }

    pub fn plugin_mut(&mut self) -> &mut dyn StatePlugin {
        self.plugin.as_mut()
    }

    pub fn get_state_by_number(&self, number: u64) -> Result<Box<dyn StatePlugin>, VmError> {
        self.plugin.get_state_by_number(number)
    }

    // Logs

    pub fn add_log(&mut self, log: Log) {
        self.logs.add_log(log);
    }

    pub fn get_logs(&self, tx_hash: B256, block_hash: B256, block_number: u64) -> Vec<Log> {
        self.logs.get_logs(tx_hash, block_hash, block_number)
    }

    pub fn logs(&self) -> &[Log] {
        self.logs.logs()
    }

    // Refund

    pub fn add_refund(&mut self, gas: u64) {
        self.refund.add_refund(gas);
    }

    pub fn sub_refund(&mut self, gas: u64) -> Result<(), VmError> {
        self.refund.sub_refund(gas)
    }

    pub fn get_refund(&self) -> u64 {
        self.refund.get_refund()
    }

    // Access list

    pub fn address_in_access_list(&self, address: &Address) -> bool {
        self.access_list.contains_address(address)
    }

    pub fn slot_in_access_list(&self, address: &Address, slot: &B256) -> (bool, bool) {
        self.access_list.contains(address, slot)
    }

    pub fn add_address_to_access_list(&mut self, address: Address) -> bool {
        self.access_list.add_address(address)
    }

    pub fn add_slot_to_access_list(&mut self, address: Address, slot: B256) -> (bool, bool) {
        self.access_list.add_slot(address, slot)
    }

    // Transient storage

    pub fn get_transient_state(&self, address: Address, key: B256) -> B256 {
        self.transient.get_transient_state(address, key)
    }

    pub fn set_transient_state(&mut self, address: Address, key: B256, value: B256) {
        self.transient.set_transient_state(address, key, value);
    }

    // Self-destruct

    /// Mark an account destroyed and burn its balance. The account itself
    /// is removed on finalize.
    pub fn self_destruct(&mut self, address: Address) {
        self.destroyed.mark(address);
        let balance = self.plugin.get_balance(address);
        if balance > U256::ZERO {
            self.plugin.sub_balance(address, balance);
        }
    }

    pub fn has_self_destructed(&self, address: &Address) -> bool {
        self.destroyed.contains(address)
    }
}
