//! The precompile registry and its gas accounting.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use tracing::{debug, info, warn};

use super::codec::{AbiCodec, DynAbiCodec};
use super::container::Container;
use super::factory::{ContainerFactory, DynamicFactory, StatefulFactory, StatelessFactory};
use super::reentrancy::{CallContext, PrecompileEvm};
use super::Registrable;
use crate::error::VmError;
use crate::gas::GasMeter;
use crate::state::GasConfig;

/// Outcome of one precompile call.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecompileResult {
    pub output: Result<Bytes, VmError>,
    pub gas_remaining: u64,
}

impl PrecompileResult {
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }
}

/// Containers keyed by address, built once and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct Precompiles {
    containers: BTreeMap<Address, Container>,
    kv_gas_config: GasConfig,
}

impl Precompiles {
    /// Build a container for every registrable with the default codec.
    ///
    /// # Errors
    /// Fails on the first registrable that cannot be built, or on two
    /// registrables sharing an address.
    pub fn new(registrables: Vec<Registrable>) -> Result<Self, VmError> {
        Self::with_codec(registrables, Arc::new(DynAbiCodec))
    }

    pub fn with_codec(
        registrables: Vec<Registrable>,
        codec: Arc<dyn AbiCodec>,
    ) -> Result<Self, VmError> {
        let stateless = StatelessFactory;
        let stateful = StatefulFactory::new(Arc::clone(&codec));
        let dynamic = DynamicFactory::new(codec);

        let mut containers = BTreeMap::new();
        for registrable in &registrables {
            let address = registrable.address();
            if containers.contains_key(&address) {
                return Err(VmError::DuplicatePrecompile(address));
            }
            let factory: &dyn ContainerFactory = match registrable {
                Registrable::Stateless(_) => &stateless,
                Registrable::Stateful(_) => &stateful,
                Registrable::Dynamic(_) => &dynamic,
            };
            let container = factory.build(registrable)?;
            info!(
                %address,
                kind = registrable.kind(),
                methods = container.method_count(),
                "Registered precompile"
            );
            containers.insert(address, container);
        }

        Ok(Self {
            containers,
            kv_gas_config: GasConfig::default(),
        })
    }

    /// Storage gas configuration applied while a precompile runs.
    pub fn with_kv_gas_config(mut self, config: GasConfig) -> Self {
        self.kv_gas_config = config;
        self
    }

    pub fn kv_gas_config(&self) -> GasConfig {
        self.kv_gas_config
    }

    pub fn get(&self, address: &Address) -> Option<&Container> {
        self.containers.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.containers.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Registered addresses in ascending order.
    pub fn get_active(&self) -> Vec<Address> {
        self.containers.keys().copied().collect()
    }

    /// Run the precompile at `address` with `supplied_gas`.
    ///
    /// The static cost and any dynamic or storage gas are charged to a
    /// meter private to this call. State is snapshotted first and reverted
    /// if the call fails or consumes more than `supplied_gas`; the latter
    /// reports `OutOfGas` with nothing remaining.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        evm: &mut dyn PrecompileEvm,
        address: Address,
        input: &[u8],
        caller: Address,
        value: U256,
        supplied_gas: u64,
        readonly: bool,
    ) -> PrecompileResult {
        let Some(container) = self.containers.get(&address) else {
            return PrecompileResult {
                output: Err(VmError::PrecompileNotFound(address)),
                gas_remaining: supplied_gas,
            };
        };

        let snapshot = match evm.state().snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return PrecompileResult {
                    output: Err(e),
                    gas_remaining: 0,
                }
            }
        };

        let mut gas = GasMeter::infinite();
        let previous = evm.state().plugin().gas_config();
        evm.state().plugin_mut().set_gas_config(self.kv_gas_config);
        let storage_before = evm.state().plugin().storage_gas_consumed();

        let mut output = match gas.consume_gas(container.required_gas(input)) {
            Err(e) => Err(e),
            Ok(()) => {
                let mut ctx = CallContext::new(
                    address,
                    caller,
                    value,
                    readonly,
                    &mut gas,
                    &mut *evm,
                    container.event_translator(),
                );
                container.run(&mut ctx, input)
            }
        };

        let storage_used = evm
            .state()
            .plugin()
            .storage_gas_consumed()
            .saturating_sub(storage_before);
        evm.state().plugin_mut().set_gas_config(previous);

        let consumed = gas.gas_consumed().saturating_add(storage_used);
        let mut gas_remaining = supplied_gas.saturating_sub(consumed);
        if consumed > supplied_gas {
            warn!(%address, consumed, supplied_gas, "Precompile consumed more gas than supplied");
            output = Err(VmError::OutOfGas {
                consumed,
                limit: supplied_gas,
            });
            gas_remaining = 0;
        }

        if let Err(cause) = &output {
            debug!(%address, %cause, "Precompile call failed, reverting");
            if let Err(e) = evm.state().revert_to_snapshot(&snapshot) {
                output = Err(e);
            }
        }

        PrecompileResult {
            output,
            gas_remaining,
        }
    }
}
