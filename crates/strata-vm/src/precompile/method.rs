//! Native handlers for stateful precompile methods.

use std::fmt;
use std::sync::Arc;

use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::Function;
use alloy_primitives::Selector;

use super::reentrancy::CallContext;
use crate::error::VmError;

/// Native implementation of one ABI method.
pub type Handler = Arc<
    dyn Fn(&mut CallContext<'_>, &[DynSolValue]) -> Result<Vec<DynSolValue>, VmError> + Send + Sync,
>;

/// A native handler declared under an ABI signature.
#[derive(Clone)]
pub struct Method {
    signature: String,
    required_gas: u64,
    handler: Handler,
}

impl Method {
    /// Declare a handler for `signature`, e.g. `transfer(address,uint256)`.
    pub fn new<F>(signature: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut CallContext<'_>, &[DynSolValue]) -> Result<Vec<DynSolValue>, VmError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            signature: signature.into(),
            required_gas: 0,
            handler: Arc::new(handler),
        }
    }

    /// Static gas charged before the handler runs.
    pub fn with_required_gas(mut self, gas: u64) -> Self {
        self.required_gas = gas;
        self
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn required_gas(&self) -> u64 {
        self.required_gas
    }

    pub(crate) fn execute(
        &self,
        ctx: &mut CallContext<'_>,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, VmError> {
        (self.handler)(ctx, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("signature", &self.signature)
            .field("required_gas", &self.required_gas)
            .finish_non_exhaustive()
    }
}

/// A [`Method`] matched to its ABI function.
#[derive(Debug, Clone)]
pub(crate) struct BoundMethod {
    pub(crate) function: Function,
    pub(crate) method: Method,
}

impl BoundMethod {
    pub(crate) fn selector(&self) -> Selector {
        self.function.selector()
    }
}
