//! A minimal interpreter for exercising the lifecycle.
//!
//! It understands value transfers, contract creation (the input becomes
//! the code), precompile calls and two synthetic behaviours: a call whose
//! input starts with `0xfe` fails, and any other non-empty call input is
//! emitted as a log from the callee.

use strata_types::{keccak256, Address, Bytes, Log, Transaction, U256};
use strata_vm::{
    PrecompileEvm, Precompiles, StateDb, VmError, MAX_CALL_DEPTH, TX_BASE_GAS,
};
use tracing::trace;

use crate::evm::{BlockContext, Evm, EvmFactory, ExecutionEnv, ExecutionResult};

/// Gas for a one-topic log, before the per-byte charge.
pub const LOG_GAS: u64 = 750;
pub const LOG_DATA_GAS: u64 = 8;
pub const CODE_DEPOSIT_GAS: u64 = 200;
/// First input byte that makes a call fail.
pub const INVALID_OPCODE: u8 = 0xfe;

/// Address of a contract created by `sender` at `nonce`.
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut data = Vec::with_capacity(28);
    data.extend_from_slice(sender.as_slice());
    data.extend_from_slice(&nonce.to_be_bytes());
    Address::from_slice(&keccak256(&data)[12..])
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockEvmFactory;

impl EvmFactory for MockEvmFactory {
    fn build(&self, block: &BlockContext) -> Box<dyn Evm> {
        Box::new(MockEvm {
            number: block.number,
            executed: 0,
        })
    }
}

#[derive(Debug)]
pub struct MockEvm {
    number: u64,
    executed: u64,
}

impl MockEvm {
    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl Evm for MockEvm {
    fn transact(
        &mut self,
        tx: &Transaction,
        env: ExecutionEnv<'_>,
    ) -> Result<ExecutionResult, VmError> {
        let ExecutionEnv {
            state,
            gas,
            precompiles,
            block,
        } = env;

        let expected = state.plugin().get_nonce(tx.from);
        if tx.nonce != expected {
            return Err(VmError::InvalidNonce {
                expected,
                got: tx.nonce,
            });
        }

        let max_fee = tx.gas_price.saturating_mul(U256::from(tx.gas_limit));
        let cost = max_fee.saturating_add(tx.value);
        let balance = state.plugin().get_balance(tx.from);
        if balance < cost {
            return Err(VmError::InsufficientBalance {
                have: balance.to_string(),
                want: cost.to_string(),
            });
        }

        gas.consume_gas(TX_BASE_GAS)?;
        state.plugin_mut().sub_balance(tx.from, max_fee);
        state.plugin_mut().set_nonce(tx.from, expected + 1);

        let available = gas.gas_remaining();
        let mut frame = Frame {
            state: &mut *state,
            precompiles,
            depth: 0,
        };
        let mut contract_address = None;
        let (mut output, used) = match tx.to {
            Some(to) => execute_call(&mut frame, tx.from, to, &tx.input, tx.value, available),
            None => {
                let address = create_address(tx.from, expected);
                contract_address = Some(address);
                execute_create(&mut frame, tx.from, address, &tx.input, tx.value, available)
            }
        };
        if let Err(e) = gas.consume_gas(used) {
            output = Err(e);
        }

        let gas_used = gas.gas_consumed();
        let leftover = tx.gas_limit.saturating_sub(gas_used);
        state
            .plugin_mut()
            .add_balance(tx.from, tx.gas_price.saturating_mul(U256::from(leftover)));
        state
            .plugin_mut()
            .add_balance(block.coinbase, tx.gas_price.saturating_mul(U256::from(gas_used)));

        self.executed += 1;
        trace!(number = self.number, tx_hash = %tx.hash(), gas_used, "Mock transaction executed");

        let (output, error) = match output {
            Ok(output) => (output, None),
            Err(e) => {
                contract_address = None;
                (Bytes::new(), Some(e))
            }
        };
        Ok(ExecutionResult {
            gas_used,
            refund: state.get_refund(),
            output,
            error,
            contract_address,
        })
    }
}

struct Frame<'a> {
    state: &'a mut StateDb,
    precompiles: &'a Precompiles,
    depth: usize,
}

impl PrecompileEvm for Frame<'_> {
    fn state(&mut self) -> &mut StateDb {
        &mut *self.state
    }

    fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<Bytes, VmError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(VmError::CallDepthExceeded { depth: self.depth });
        }
        self.depth += 1;
        let (output, _) = execute_call(self, caller, to, &input, value, gas);
        self.depth -= 1;
        output
    }
}

fn transfer(state: &mut StateDb, from: Address, to: Address, value: U256) -> Result<(), VmError> {
    if value.is_zero() {
        return Ok(());
    }
    let balance = state.plugin().get_balance(from);
    if balance < value {
        return Err(VmError::InsufficientBalance {
            have: balance.to_string(),
            want: value.to_string(),
        });
    }
    state.plugin_mut().sub_balance(from, value);
    state.plugin_mut().add_balance(to, value);
    Ok(())
}

/// Run a message call with `gas`; returns the output and the gas used.
/// State changes of a failed call are reverted.
fn execute_call(
    frame: &mut Frame<'_>,
    caller: Address,
    to: Address,
    input: &Bytes,
    value: U256,
    gas: u64,
) -> (Result<Bytes, VmError>, u64) {
    let snapshot = match frame.state.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => return (Err(e), gas),
    };

    let (output, used) = match transfer(frame.state, caller, to, value) {
        Err(e) => (Err(e), 0),
        Ok(()) if frame.precompiles.contains(&to) => {
            let precompiles = frame.precompiles;
            let result = precompiles.run(frame, to, input, caller, value, gas, false);
            (result.output, gas.saturating_sub(result.gas_remaining))
        }
        Ok(()) if input.first() == Some(&INVALID_OPCODE) => (
            Err(VmError::Reverted(format!("invalid opcode {INVALID_OPCODE:#x}"))),
            gas,
        ),
        Ok(()) if input.is_empty() => (Ok(Bytes::new()), 0),
        Ok(()) => {
            let cost = LOG_GAS.saturating_add(LOG_DATA_GAS.saturating_mul(input.len() as u64));
            if cost > gas {
                (Err(VmError::OutOfGas { consumed: cost, limit: gas }), gas)
            } else {
                frame
                    .state
                    .add_log(Log::new(to, vec![keccak256(input)], input.clone()));
                (Ok(input.clone()), cost)
            }
        }
    };

    if output.is_err() {
        if let Err(e) = frame.state.revert_to_snapshot(&snapshot) {
            return (Err(e), used);
        }
    }
    (output, used)
}

fn execute_create(
    frame: &mut Frame<'_>,
    caller: Address,
    address: Address,
    code: &Bytes,
    value: U256,
    gas: u64,
) -> (Result<Bytes, VmError>, u64) {
    let cost = CODE_DEPOSIT_GAS.saturating_mul(code.len() as u64);
    if cost > gas {
        return (Err(VmError::OutOfGas { consumed: cost, limit: gas }), gas);
    }
    if let Err(e) = transfer(frame.state, caller, address, value) {
        return (Err(e), 0);
    }
    frame.state.plugin_mut().create_account(address);
    frame.state.plugin_mut().set_nonce(address, 1);
    frame.state.plugin_mut().set_code(address, code.clone());
    (Ok(Bytes::new()), cost)
}
