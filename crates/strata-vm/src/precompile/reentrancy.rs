//! Precompile call context and controlled reentrancy.
//!
//! While a precompile runs, the state plugin charges storage gas under the
//! precompile's key-value gas configuration. A handler that calls back into
//! the interpreter must not be charged a second time for the nested call's
//! storage work, so the nested call runs with an empty configuration and the
//! previous one is put back afterwards. [`ReentrancyScope`] ties the restore
//! to scope exit, so a failing nested call cannot leave it unbalanced.

use alloy_primitives::{Address, Bytes, U256};
use tracing::trace;

use super::events::{EventTranslator, NativeEvent};
use crate::error::VmError;
use crate::gas::GasMeter;
use crate::state::{GasConfig, StateDb};

/// What a precompile sees of the interpreter running it.
pub trait PrecompileEvm {
    fn state(&mut self) -> &mut StateDb;

    /// Execute a nested message call.
    fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<Bytes, VmError>;
}

/// Strip storage gas charging; returns the configuration to restore.
pub fn enable_reentrancy(state: &mut StateDb) -> GasConfig {
    let previous = state.plugin().gas_config();
    state.plugin_mut().set_gas_config(GasConfig::empty());
    trace!("Reentrancy enabled");
    previous
}

/// Restore the configuration returned by [`enable_reentrancy`].
pub fn disable_reentrancy(state: &mut StateDb, previous: GasConfig) {
    state.plugin_mut().set_gas_config(previous);
    trace!("Reentrancy disabled");
}

/// Reentrancy enabled for the lifetime of the scope.
pub struct ReentrancyScope<'a> {
    evm: &'a mut dyn PrecompileEvm,
    previous: GasConfig,
}

impl<'a> ReentrancyScope<'a> {
    pub fn enter(evm: &'a mut dyn PrecompileEvm) -> Self {
        let previous = enable_reentrancy(evm.state());
        Self { evm, previous }
    }

    pub fn evm(&mut self) -> &mut dyn PrecompileEvm {
        &mut *self.evm
    }

    /// Configuration restored on drop.
    pub fn previous(&self) -> GasConfig {
        self.previous
    }
}

impl<'a> Drop for ReentrancyScope<'a> {
    fn drop(&mut self) {
        disable_reentrancy(self.evm.state(), self.previous);
    }
}

/// Everything a native handler can reach during one precompile call.
pub struct CallContext<'a> {
    caller: Address,
    value: U256,
    readonly: bool,
    address: Address,
    gas: &'a mut GasMeter,
    evm: &'a mut dyn PrecompileEvm,
    events: Option<&'a EventTranslator>,
}

impl<'a> CallContext<'a> {
    pub fn new(
        address: Address,
        caller: Address,
        value: U256,
        readonly: bool,
        gas: &'a mut GasMeter,
        evm: &'a mut dyn PrecompileEvm,
        events: Option<&'a EventTranslator>,
    ) -> Self {
        Self {
            caller,
            value,
            readonly,
            address,
            gas,
            evm,
            events,
        }
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// Address of the running precompile.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Charge dynamic gas on top of the method's static cost.
    pub fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        self.gas.consume_gas(amount)
    }

    pub fn gas_consumed(&self) -> u64 {
        self.gas.gas_consumed()
    }

    pub fn state(&mut self) -> &mut StateDb {
        self.evm.state()
    }

    /// Fails with `WriteProtection` in a read-only call.
    pub fn ensure_writable(&self) -> Result<(), VmError> {
        if self.readonly {
            return Err(VmError::WriteProtection);
        }
        Ok(())
    }

    /// Record a native event as a log of this precompile.
    ///
    /// Returns whether a log was emitted; events of kinds the precompile
    /// does not declare are dropped.
    pub fn emit_native_event(&mut self, event: &NativeEvent) -> Result<bool, VmError> {
        let Some(translator) = self.events else {
            return Ok(false);
        };
        match translator.translate(event)? {
            Some(log) => {
                self.evm.state().add_log(log);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Call back into the interpreter as the precompile.
    pub fn call(&mut self, to: Address, input: Bytes, gas: u64, value: U256) -> Result<Bytes, VmError> {
        if self.readonly && !value.is_zero() {
            return Err(VmError::WriteProtection);
        }
        let caller = self.address;
        let mut scope = ReentrancyScope::enter(&mut *self.evm);
        scope.evm().call(caller, to, input, gas, value)
    }
}
