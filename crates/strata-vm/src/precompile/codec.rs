//! ABI packing for stateful precompiles.

use std::fmt;

use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::Function;
use alloy_primitives::Bytes;

use crate::error::VmError;

/// Converts between raw call data and typed argument lists.
pub trait AbiCodec: Send + Sync + fmt::Debug {
    /// Decode the arguments of `function` from `data`, selector excluded.
    fn unpack_inputs(&self, function: &Function, data: &[u8]) -> Result<Vec<DynSolValue>, VmError>;

    /// Encode `values` as the return data of `function`.
    fn pack_outputs(&self, function: &Function, values: &[DynSolValue]) -> Result<Bytes, VmError>;
}

/// [`AbiCodec`] backed by `alloy-dyn-abi`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynAbiCodec;

impl AbiCodec for DynAbiCodec {
    fn unpack_inputs(&self, function: &Function, data: &[u8]) -> Result<Vec<DynSolValue>, VmError> {
        function
            .abi_decode_input(data, true)
            .map_err(|e| VmError::Codec(e.to_string()))
    }

    fn pack_outputs(&self, function: &Function, values: &[DynSolValue]) -> Result<Bytes, VmError> {
        function
            .abi_encode_output(values)
            .map(Bytes::from)
            .map_err(|e| VmError::Codec(e.to_string()))
    }
}
