//! The host chain's storage backend as seen by the runtime.

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::error::VmError;
use crate::snapshot::Controllable;

/// Gas the host's key-value store charges for storage operations.
///
/// Precompiles execute under the host's metering; nested interpreter calls
/// run with [`GasConfig::empty`] so storage work is not metered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

impl GasConfig {
    /// A configuration that charges nothing.
    pub const fn empty() -> Self {
        Self {
            has_cost: 0,
            delete_cost: 0,
            read_cost_flat: 0,
            read_cost_per_byte: 0,
            write_cost_flat: 0,
            write_cost_per_byte: 0,
            iter_next_cost_flat: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    /// Cost of reading `len` bytes.
    pub fn read_cost(&self, len: u64) -> u64 {
        self.read_cost_flat
            .saturating_add(self.read_cost_per_byte.saturating_mul(len))
    }

    /// Cost of writing `len` bytes.
    pub fn write_cost(&self, len: u64) -> u64 {
        self.write_cost_flat
            .saturating_add(self.write_cost_per_byte.saturating_mul(len))
    }
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            has_cost: 1_000,
            delete_cost: 1_000,
            read_cost_flat: 1_000,
            read_cost_per_byte: 3,
            write_cost_flat: 2_000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
        }
    }
}

/// Account and storage access implemented by the host chain.
///
/// The plugin is itself [`Controllable`]: it must journal its own writes so
/// that the runtime can snapshot and revert it alongside the journals.
pub trait StatePlugin: Controllable + Send {
    /// Reset to a default state for a new block.
    fn prepare(&mut self);

    /// Reset per-transaction scratch state.
    fn reset(&mut self);

    fn create_account(&mut self, address: Address);

    fn exist(&self, address: Address) -> bool;

    /// Whether the account is empty (EIP-161).
    fn empty(&self, address: Address) -> bool {
        self.get_nonce(address) == 0
            && self.get_balance(address).is_zero()
            && self.get_code(address).is_empty()
    }

    fn get_balance(&self, address: Address) -> U256;

    fn add_balance(&mut self, address: Address, amount: U256);

    fn sub_balance(&mut self, address: Address, amount: U256);

    fn get_nonce(&self, address: Address) -> u64;

    fn set_nonce(&mut self, address: Address, nonce: u64);

    fn get_code(&self, address: Address) -> Bytes;

    fn get_code_hash(&self, address: Address) -> B256;

    fn set_code(&mut self, address: Address, code: Bytes);

    fn get_state(&self, address: Address, key: B256) -> B256;

    /// Value of a slot as of the last finalize.
    fn get_committed_state(&self, address: Address, key: B256) -> B256;

    fn set_state(&mut self, address: Address, key: B256, value: B256);

    /// Physically remove accounts and their storage.
    fn delete_accounts(&mut self, addresses: &[Address]);

    fn gas_config(&self) -> GasConfig;

    fn set_gas_config(&mut self, config: GasConfig);

    /// Running total of gas charged under the active [`GasConfig`].
    fn storage_gas_consumed(&self) -> u64 {
        0
    }

    /// An independent view of the state as of block `number`.
    fn get_state_by_number(&self, number: u64) -> Result<Box<dyn StatePlugin>, VmError>;
}

/// Lets a boxed plugin register with a [`Controller`](crate::snapshot::Controller).
impl Controllable for Box<dyn StatePlugin> {
    fn registry_key(&self) -> &'static str {
        (**self).registry_key()
    }

    fn snapshot(&mut self) -> usize {
        (**self).snapshot()
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        (**self).revert_to_snapshot(id)
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }
}
