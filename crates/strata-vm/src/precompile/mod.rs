//! Precompiled contracts.
//!
//! A precompile is registered as one of three kinds:
//! - stateless: a pure function of the input bytes
//! - stateful: ABI methods dispatched by 4-byte selector to native handlers
//! - dynamic: stateful, plus translation of native host events into logs
//!
//! Each kind is turned into a [`Container`] by its factory when the
//! [`Precompiles`] registry is built. Misconfigured precompiles fail there,
//! before the chain starts.

mod codec;
mod container;
mod events;
mod factory;
mod identity;
mod method;
mod reentrancy;
mod registry;

#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes};
use strata_types::Rules;

use crate::error::VmError;

pub use codec::{AbiCodec, DynAbiCodec};
pub use container::{Container, StatefulContainer};
pub use events::{snake_case, EventTranslator, NativeEvent, ValueDecoder};
pub use factory::{ContainerFactory, DynamicFactory, StatefulFactory, StatelessFactory};
pub use identity::{Identity, IDENTITY_ADDRESS};
pub use method::{Handler, Method};
pub use reentrancy::{
    disable_reentrancy, enable_reentrancy, CallContext, PrecompileEvm, ReentrancyScope,
};
pub use registry::{PrecompileResult, Precompiles};

/// Length of an ABI method selector.
pub const SELECTOR_LEN: usize = 4;

/// A precompile that never touches chain state.
pub trait StatelessPrecompile: Send + Sync {
    fn address(&self) -> Address;

    fn required_gas(&self, input: &[u8]) -> u64;

    fn run(&self, input: &[u8]) -> Result<Bytes, VmError>;
}

/// A precompile exposing ABI methods backed by native handlers.
///
/// Every function in [`abi`](Self::abi) must have exactly one handler in
/// [`methods`](Self::methods) whose signature matches byte for byte.
pub trait StatefulPrecompile: Send + Sync {
    fn address(&self) -> Address;

    fn abi(&self) -> JsonAbi;

    fn methods(&self) -> Vec<Method>;
}

/// A stateful precompile whose native events are translated to logs.
pub trait DynamicPrecompile: StatefulPrecompile {
    /// Decoders for event attributes that cannot be parsed from their
    /// string form by ABI type alone, keyed by attribute name.
    fn value_decoders(&self) -> HashMap<String, ValueDecoder> {
        HashMap::new()
    }
}

/// A precompile as handed to the registry.
#[derive(Clone)]
pub enum Registrable {
    Stateless(Arc<dyn StatelessPrecompile>),
    Stateful(Arc<dyn StatefulPrecompile>),
    Dynamic(Arc<dyn DynamicPrecompile>),
}

impl Registrable {
    pub fn address(&self) -> Address {
        match self {
            Registrable::Stateless(p) => p.address(),
            Registrable::Stateful(p) => p.address(),
            Registrable::Dynamic(p) => p.address(),
        }
    }

    /// Human-readable kind, used in errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Registrable::Stateless(_) => "stateless",
            Registrable::Stateful(_) => "stateful",
            Registrable::Dynamic(_) => "dynamic",
        }
    }
}

impl std::fmt::Debug for Registrable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrable")
            .field("kind", &self.kind())
            .field("address", &self.address())
            .finish()
    }
}

/// The built-in precompiles active under `rules`.
pub fn default_precompiles(_rules: &Rules) -> Vec<Registrable> {
    vec![Registrable::Stateless(Arc::new(Identity))]
}
