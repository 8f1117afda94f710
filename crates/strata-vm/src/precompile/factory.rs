//! Factories that turn registrables into containers.
//!
//! Building a stateful container binds every ABI function to the native
//! handler declared under the same signature. A function without a handler,
//! a handler without a function, or two handlers for one signature all fail
//! the build.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Selector};
use tracing::trace;

use super::codec::{AbiCodec, DynAbiCodec};
use super::container::{Container, StatefulContainer};
use super::events::EventTranslator;
use super::method::{BoundMethod, Method};
use super::Registrable;
use crate::error::VmError;

/// Builds one kind of container.
pub trait ContainerFactory {
    /// # Errors
    /// `WrongContainerFactory` if `registrable` is not of this factory's
    /// kind; binding errors for inconsistent stateful declarations.
    fn build(&self, registrable: &Registrable) -> Result<Container, VmError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StatelessFactory;

impl ContainerFactory for StatelessFactory {
    fn build(&self, registrable: &Registrable) -> Result<Container, VmError> {
        match registrable {
            Registrable::Stateless(p) => Ok(Container::Stateless(Arc::clone(p))),
            other => Err(VmError::WrongContainerFactory {
                factory: "StatelessFactory",
                kind: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatefulFactory {
    codec: Arc<dyn AbiCodec>,
}

impl StatefulFactory {
    pub fn new(codec: Arc<dyn AbiCodec>) -> Self {
        Self { codec }
    }
}

impl Default for StatefulFactory {
    fn default() -> Self {
        Self::new(Arc::new(DynAbiCodec))
    }
}

impl ContainerFactory for StatefulFactory {
    fn build(&self, registrable: &Registrable) -> Result<Container, VmError> {
        let Registrable::Stateful(p) = registrable else {
            return Err(VmError::WrongContainerFactory {
                factory: "StatefulFactory",
                kind: registrable.kind(),
            });
        };
        let methods = bind_methods(p.address(), &p.abi(), p.methods())?;
        Ok(Container::Stateful(StatefulContainer::new(
            p.address(),
            methods,
            Arc::clone(&self.codec),
            None,
        )))
    }
}

#[derive(Debug, Clone)]
pub struct DynamicFactory {
    codec: Arc<dyn AbiCodec>,
}

impl DynamicFactory {
    pub fn new(codec: Arc<dyn AbiCodec>) -> Self {
        Self { codec }
    }
}

impl Default for DynamicFactory {
    fn default() -> Self {
        Self::new(Arc::new(DynAbiCodec))
    }
}

impl ContainerFactory for DynamicFactory {
    fn build(&self, registrable: &Registrable) -> Result<Container, VmError> {
        let Registrable::Dynamic(p) = registrable else {
            return Err(VmError::WrongContainerFactory {
                factory: "DynamicFactory",
                kind: registrable.kind(),
            });
        };
        let abi = p.abi();
        let methods = bind_methods(p.address(), &abi, p.methods())?;
        let events = EventTranslator::new(p.address(), &abi, p.value_decoders());
        Ok(Container::Stateful(StatefulContainer::new(
            p.address(),
            methods,
            Arc::clone(&self.codec),
            Some(events),
        )))
    }
}

fn bind_methods(
    address: Address,
    abi: &JsonAbi,
    methods: Vec<Method>,
) -> Result<HashMap<Selector, BoundMethod>, VmError> {
    let mut handlers = BTreeMap::new();
    for method in methods {
        let signature = method.signature().to_string();
        if handlers.contains_key(&signature) {
            return Err(VmError::DuplicateHandler { signature });
        }
        handlers.insert(signature, method);
    }

    let mut table = HashMap::new();
    for function in abi.functions() {
        let signature = function.signature();
        let method = handlers
            .remove(&signature)
            .ok_or_else(|| VmError::NoHandlerForMethod {
                signature: signature.clone(),
            })?;
        let bound = BoundMethod {
            function: function.clone(),
            method,
        };
        trace!(%address, %signature, selector = %bound.selector(), "Bound precompile method");
        table.insert(bound.selector(), bound);
    }

    if let Some(signature) = handlers.into_keys().next() {
        return Err(VmError::NoAbiMethodForHandler { signature });
    }
    Ok(table)
}
