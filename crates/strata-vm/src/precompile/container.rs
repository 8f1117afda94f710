//! Executable precompile containers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, Selector};
use tracing::debug;

use super::codec::AbiCodec;
use super::events::EventTranslator;
use super::method::BoundMethod;
use super::reentrancy::CallContext;
use super::{StatelessPrecompile, SELECTOR_LEN};
use crate::error::VmError;

/// A precompile ready to run.
#[derive(Clone)]
pub enum Container {
    Stateless(Arc<dyn StatelessPrecompile>),
    Stateful(StatefulContainer),
}

impl Container {
    pub fn address(&self) -> Address {
        match self {
            Container::Stateless(p) => p.address(),
            Container::Stateful(c) => c.address,
        }
    }

    /// Static gas for `input`.
    pub fn required_gas(&self, input: &[u8]) -> u64 {
        match self {
            Container::Stateless(p) => p.required_gas(input),
            Container::Stateful(c) => c.required_gas(input),
        }
    }

    /// Number of dispatchable methods; always 0 for stateless containers.
    pub fn method_count(&self) -> usize {
        match self {
            Container::Stateless(_) => 0,
            Container::Stateful(c) => c.methods.len(),
        }
    }

    pub fn event_translator(&self) -> Option<&EventTranslator> {
        match self {
            Container::Stateless(_) => None,
            Container::Stateful(c) => c.events.as_ref(),
        }
    }

    pub fn run(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        match self {
            Container::Stateless(p) => p.run(input),
            Container::Stateful(c) => c.run(ctx, input),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Stateless(p) => f
                .debug_tuple("Stateless")
                .field(&p.address())
                .finish(),
            Container::Stateful(c) => f.debug_tuple("Stateful").field(c).finish(),
        }
    }
}

/// Selector-dispatched native methods of one precompile.
#[derive(Clone)]
pub struct StatefulContainer {
    address: Address,
    methods: HashMap<Selector, BoundMethod>,
    codec: Arc<dyn AbiCodec>,
    events: Option<EventTranslator>,
}

impl StatefulContainer {
    pub(crate) fn new(
        address: Address,
        methods: HashMap<Selector, BoundMethod>,
        codec: Arc<dyn AbiCodec>,
        events: Option<EventTranslator>,
    ) -> Self {
        Self {
            address,
            methods,
            codec,
            events,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        self.methods.keys()
    }

    fn lookup(&self, input: &[u8]) -> Option<&BoundMethod> {
        if input.len() < SELECTOR_LEN {
            return None;
        }
        self.methods.get(&Selector::from_slice(&input[..SELECTOR_LEN]))
    }

    /// Static cost of the selected method; 0 for short or unknown input.
    pub fn required_gas(&self, input: &[u8]) -> u64 {
        self.lookup(input)
            .map(|bound| bound.method.required_gas())
            .unwrap_or(0)
    }

    /// Dispatch `input` to the handler its selector names.
    ///
    /// Decoding failures are returned as-is. Handler failures, and failures
    /// to encode what a handler returned, become `ExecutionReverted`.
    pub fn run(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Bytes, VmError> {
        if self.methods.is_empty() {
            return Err(VmError::ContainerMisconfigured(self.address));
        }
        if input.len() < SELECTOR_LEN {
            return Err(VmError::InvalidInput { len: input.len() });
        }
        let selector = Selector::from_slice(&input[..SELECTOR_LEN]);
        let bound = self
            .methods
            .get(&selector)
            .ok_or(VmError::MethodNotFound { selector })?;

        let args = self
            .codec
            .unpack_inputs(&bound.function, &input[SELECTOR_LEN..])?;

        let revert = |cause: VmError| {
            debug!(
                precompile = %self.address,
                method = bound.method.signature(),
                %cause,
                "Precompile method reverted"
            );
            VmError::ExecutionReverted {
                method: bound.method.signature().to_string(),
                cause: Box::new(cause),
            }
        };

        let values = bound.method.execute(ctx, &args).map_err(revert)?;
        self.codec
            .pack_outputs(&bound.function, &values)
            .map_err(revert)
    }
}

impl fmt::Debug for StatefulContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut signatures: Vec<_> = self
            .methods
            .values()
            .map(|bound| bound.method.signature())
            .collect();
        signatures.sort_unstable();
        f.debug_struct("StatefulContainer")
            .field("address", &self.address)
            .field("methods", &signatures)
            .field("events", &self.events)
            .finish()
    }
}
