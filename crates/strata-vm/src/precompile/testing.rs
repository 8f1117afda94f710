//! Precompiles and an interpreter stand-in shared by the tests.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, Address, Bytes, B256, U256};
use parking_lot::Mutex;

use super::events::NativeEvent;
use super::method::Method;
use super::reentrancy::PrecompileEvm;
use super::{DynamicPrecompile, StatefulPrecompile};
use crate::error::VmError;
use crate::state::{GasConfig, MemoryStatePlugin, StateDb};

pub(crate) const COUNTER_ADDRESS: Address = address!("0000000000000000000000000000000000000069");
pub(crate) const MEMO_ADDRESS: Address = address!("0000000000000000000000000000000000000070");
pub(crate) const EMPTY_ADDRESS: Address = address!("0000000000000000000000000000000000000071");

pub(crate) const COUNTER_SLOT: B256 = B256::ZERO;
pub(crate) const MARKER_SLOT: B256 = B256::with_last_byte(1);

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub caller: Address,
    pub to: Address,
    pub gas_config: GasConfig,
}

pub(crate) struct TestEvm {
    state: StateDb,
    pub calls: Vec<RecordedCall>,
}

impl TestEvm {
    pub const REVERTING: Address = address!("00000000000000000000000000000000000000ff");

    pub fn new() -> Self {
        Self {
            state: StateDb::new(Box::new(MemoryStatePlugin::new())).unwrap(),
            calls: Vec::new(),
        }
    }
}

impl PrecompileEvm for TestEvm {
    fn state(&mut self) -> &mut StateDb {
        &mut self.state
    }

    fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        _gas: u64,
        _value: U256,
    ) -> Result<Bytes, VmError> {
        self.calls.push(RecordedCall {
            caller,
            to,
            gas_config: self.state.plugin().gas_config(),
        });
        if to == Self::REVERTING {
            return Err(VmError::Reverted("nested call failed".to_string()));
        }
        self.state
            .plugin_mut()
            .set_state(to, MARKER_SLOT, B256::with_last_byte(1));
        Ok(input)
    }
}

pub(crate) fn calldata(abi: &JsonAbi, name: &str, args: &[DynSolValue]) -> Vec<u8> {
    abi.function(name).unwrap()[0].abi_encode_input(args).unwrap()
}

pub(crate) fn uint(n: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(n), 256)
}

fn read_u256(slot: B256) -> U256 {
    U256::from_be_bytes(slot.0)
}

fn arg_uint(args: &[DynSolValue], i: usize) -> Result<U256, VmError> {
    args.get(i)
        .and_then(|v| v.as_uint())
        .map(|(n, _)| n)
        .ok_or_else(|| VmError::Codec(format!("argument {i} is not a uint")))
}

/// A stateful precompile exercising every dispatch path.
pub(crate) struct Counter {
    abi: JsonAbi,
    methods: Vec<Method>,
    pub echoed: Arc<Mutex<Vec<Vec<DynSolValue>>>>,
}

impl Counter {
    pub fn new() -> Self {
        let abi = JsonAbi::parse([
            "function increment(uint256 amount) returns (uint256)",
            "function get() view returns (uint256)",
            "function burn(uint256 amount)",
            "function fail()",
            "function echo(uint256 a, address b) returns (uint256, address)",
            "function callback(address target) returns (bytes)",
            "function badOutput() returns (uint256)",
        ])
        .unwrap();
        let echoed: Arc<Mutex<Vec<Vec<DynSolValue>>>> = Arc::default();
        let echo_log = Arc::clone(&echoed);

        let methods = vec![
            Method::new("increment(uint256)", |ctx, args| {
                ctx.ensure_writable()?;
                let amount = arg_uint(args, 0)?;
                let this = ctx.address();
                let current = read_u256(ctx.state().plugin().get_state(this, COUNTER_SLOT));
                let next = current.saturating_add(amount);
                ctx.state()
                    .plugin_mut()
                    .set_state(this, COUNTER_SLOT, B256::from(next.to_be_bytes::<32>()));
                Ok(vec![DynSolValue::Uint(next, 256)])
            })
            .with_required_gas(100),
            Method::new("get()", |ctx, _| {
                let this = ctx.address();
                let current = read_u256(ctx.state().plugin().get_state(this, COUNTER_SLOT));
                Ok(vec![DynSolValue::Uint(current, 256)])
            })
            .with_required_gas(50),
            Method::new("burn(uint256)", |ctx, args| {
                let amount = arg_uint(args, 0)?;
                let this = ctx.address();
                ctx.state()
                    .plugin_mut()
                    .set_state(this, MARKER_SLOT, B256::with_last_byte(1));
                ctx.consume_gas(amount.saturating_to::<u64>())?;
                Ok(vec![])
            })
            .with_required_gas(10),
            Method::new("fail()", |ctx, _| {
                let this = ctx.address();
                ctx.state()
                    .plugin_mut()
                    .set_state(this, MARKER_SLOT, B256::with_last_byte(1));
                Err(VmError::Reverted("boom".to_string()))
            })
            .with_required_gas(10),
            Method::new("echo(uint256,address)", move |_, args| {
                echo_log.lock().push(args.to_vec());
                Ok(args.to_vec())
            }),
            Method::new("callback(address)", |ctx, args| {
                let target = args
                    .first()
                    .and_then(|v| v.as_address())
                    .ok_or_else(|| VmError::Codec("target is not an address".to_string()))?;
                let out = ctx.call(target, Bytes::from_static(b"ping"), 10_000, U256::ZERO)?;
                Ok(vec![DynSolValue::Bytes(out.to_vec())])
            })
            .with_required_gas(20),
            Method::new("badOutput()", |_, _| Ok(vec![])),
        ];

        Self {
            abi,
            methods,
            echoed,
        }
    }

    pub fn abi_ref(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn without_method(mut self, signature: &str) -> Self {
        self.methods.retain(|m| m.signature() != signature);
        self
    }

    pub fn with_extra_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }
}

impl StatefulPrecompile for Counter {
    fn address(&self) -> Address {
        COUNTER_ADDRESS
    }

    fn abi(&self) -> JsonAbi {
        self.abi.clone()
    }

    fn methods(&self) -> Vec<Method> {
        self.methods.clone()
    }
}

/// A dynamic precompile that reports its writes as native events.
pub(crate) struct MemoDynamic;

impl MemoDynamic {
    pub fn abi() -> JsonAbi {
        JsonAbi::parse([
            "function setMemo(string memo)",
            "event MemoSet(string indexed memo, uint64 creationHeight)",
        ])
        .unwrap()
    }
}

impl StatefulPrecompile for MemoDynamic {
    fn address(&self) -> Address {
        MEMO_ADDRESS
    }

    fn abi(&self) -> JsonAbi {
        Self::abi()
    }

    fn methods(&self) -> Vec<Method> {
        vec![Method::new("setMemo(string)", |ctx, args| {
            let memo = args
                .first()
                .and_then(|v| v.as_str())
                .ok_or_else(|| VmError::Codec("memo is not a string".to_string()))?;
            let event = NativeEvent::new("memo_set")
                .with_attribute("memo", memo)
                .with_attribute("creation_height", "7");
            ctx.emit_native_event(&event)?;
            Ok(vec![])
        })]
    }
}

impl DynamicPrecompile for MemoDynamic {}

/// A stateful precompile with nothing to dispatch.
pub(crate) struct Empty;

impl StatefulPrecompile for Empty {
    fn address(&self) -> Address {
        EMPTY_ADDRESS
    }

    fn abi(&self) -> JsonAbi {
        JsonAbi::default()
    }

    fn methods(&self) -> Vec<Method> {
        Vec::new()
    }
}
