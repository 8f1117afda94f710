//! Whole-block scenarios driven through the mock host.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use strata_core::test_utils::*;
use strata_core::{Chain, CoreError, LifecycleState};
use strata_types::{address_from_low_u64, keccak256, Address, Bytes, B256, U256};
use strata_vm::{
    CallContext, GasConfig, Method, Registrable, StatefulPrecompile, VmError,
};

const ALICE: Address = address_from_low_u64(0xa11ce);
const BOB: Address = address_from_low_u64(0xb0b);
const CAROL: Address = address_from_low_u64(0xca201);
const RELAY: Address = address_from_low_u64(0x100);
const RELAYED_SLOT: B256 = B256::ZERO;

/// Forwards a call back into the interpreter, optionally failing after.
struct Relay {
    abi: JsonAbi,
}

impl Relay {
    fn new() -> Self {
        Self {
            abi: JsonAbi::parse([
                "function relay(address target, bytes data) returns (bytes)",
                "function relayAndFail(address target, bytes data)",
            ])
            .unwrap(),
        }
    }

    fn calldata(&self, name: &str, target: Address, data: &[u8]) -> Bytes {
        let args = [
            DynSolValue::Address(target),
            DynSolValue::Bytes(data.to_vec()),
        ];
        self.abi.function(name).unwrap()[0]
            .abi_encode_input(&args)
            .unwrap()
            .into()
    }
}

fn relay(ctx: &mut CallContext<'_>, args: &[DynSolValue]) -> Result<Vec<DynSolValue>, VmError> {
    ctx.ensure_writable()?;
    let target = args
        .first()
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| VmError::Codec("target is not an address".to_string()))?;
    let data = args
        .get(1)
        .and_then(DynSolValue::as_bytes)
        .map(Bytes::copy_from_slice)
        .ok_or_else(|| VmError::Codec("data is not bytes".to_string()))?;

    let this = ctx.address();
    ctx.state()
        .plugin_mut()
        .set_state(this, RELAYED_SLOT, B256::with_last_byte(1));
    let output = ctx.call(target, data, 50_000, U256::ZERO)?;
    Ok(vec![DynSolValue::Bytes(output.to_vec())])
}

impl StatefulPrecompile for Relay {
    fn address(&self) -> Address {
        RELAY
    }

    fn abi(&self) -> JsonAbi {
        self.abi.clone()
    }

    fn methods(&self) -> Vec<Method> {
        vec![
            Method::new("relay(address,bytes)", relay).with_required_gas(500),
            Method::new("relayAndFail(address,bytes)", |ctx, args| {
                relay(ctx, args)?;
                Err(VmError::Reverted("relay refused".to_string()))
            }),
        ]
    }
}

fn chain() -> Chain {
    MockHost::new()
        .with_account(ALICE, U256::from(1_000_000_000u64))
        .with_account(CAROL, U256::from(1_000_000_000u64))
        .with_precompile(Registrable::Stateful(Arc::new(Relay::new())))
        .build_chain()
        .unwrap()
}

#[test_log::test]
fn test_blocks_link_to_their_parents() {
    let mut chain = chain();
    let reader = chain.reader();
    let mut events = reader.subscribe_chain_events();

    let mut hashes = Vec::new();
    for height in 1..=3 {
        chain.prepare(height).unwrap();
        chain
            .process_transaction(&transfer(ALICE, height - 1, BOB, 10))
            .unwrap();
        hashes.push(chain.finalize().unwrap().hash());
    }

    let head = reader.current_block().unwrap();
    assert_eq!(head.number(), 3);
    assert_eq!(head.header.parent_hash, hashes[1]);
    assert_eq!(reader.finalized_block().unwrap().hash(), hashes[2]);

    let second = reader.get_block_by_hash(hashes[1]).unwrap().unwrap();
    assert_eq!(second.header.parent_hash, hashes[0]);

    for expected in &hashes {
        let event = events.try_recv().unwrap();
        assert_eq!(&event.hash, expected);
    }
}

#[test_log::test]
fn test_failing_transaction_does_not_disturb_neighbours() {
    let mut chain = chain();
    chain.prepare(1).unwrap();

    let ok = chain
        .process_transaction(&transfer(ALICE, 0, BOB, 100))
        .unwrap();
    let failed = chain
        .process_transaction(&tx(
            CAROL,
            0,
            Some(BOB),
            100,
            Bytes::from(vec![INVALID_OPCODE]),
        ))
        .unwrap();
    let rejected = chain.process_transaction(&transfer(CAROL, 7, BOB, 100));
    let last = chain
        .process_transaction(&transfer(ALICE, 1, BOB, 100))
        .unwrap();

    assert!(ok.status);
    assert!(!failed.status);
    assert!(matches!(
        rejected,
        Err(CoreError::Vm(VmError::InvalidNonce { expected: 1, got: 7 }))
    ));
    assert!(last.status);
    assert_eq!(last.tx_index, 2);

    let block = chain.finalize().unwrap();
    assert_eq!(block.tx_count(), 3);
    assert_eq!(
        chain.processor().statedb().plugin().get_balance(BOB),
        U256::from(200)
    );
}

#[test_log::test]
fn test_precompile_reenters_interpreter() {
    let mut chain = chain();
    chain.prepare(1).unwrap();

    let payload = [0xde, 0xad];
    let input = Relay::new().calldata("relay", BOB, &payload);
    let receipt = chain
        .process_transaction(&tx(ALICE, 0, Some(RELAY), 0, input))
        .unwrap();

    assert!(receipt.status);
    assert!(receipt.gas_used > 21_000 + 500);
    assert_eq!(receipt.logs.len(), 1);
    assert_eq!(receipt.logs[0].address, BOB);
    assert_eq!(receipt.logs[0].topics, vec![keccak256(payload)]);

    let plugin = chain.processor().statedb().plugin();
    assert_eq!(
        plugin.get_state(RELAY, RELAYED_SLOT),
        B256::with_last_byte(1)
    );
    // storage gas charging is switched back off once the call returns
    assert_eq!(plugin.gas_config(), GasConfig::empty());
}

#[test_log::test]
fn test_failed_precompile_discards_nested_effects() {
    let mut chain = chain();
    chain.prepare(1).unwrap();

    let input = Relay::new().calldata("relayAndFail", BOB, &[0x01]);
    let receipt = chain
        .process_transaction(&tx(ALICE, 0, Some(RELAY), 0, input))
        .unwrap();

    assert!(!receipt.status);
    assert!(receipt.logs.is_empty());
    let plugin = chain.processor().statedb().plugin();
    assert_eq!(plugin.get_state(RELAY, RELAYED_SLOT), B256::ZERO);
    assert_eq!(plugin.gas_config(), GasConfig::empty());
    assert_eq!(plugin.get_nonce(ALICE), 1);
}

#[test_log::test]
fn test_unknown_selector_fails_the_transaction() {
    let mut chain = chain();
    chain.prepare(1).unwrap();

    let receipt = chain
        .process_transaction(&tx(
            ALICE,
            0,
            Some(RELAY),
            0,
            Bytes::from(vec![0x12, 0x34, 0x56, 0x78]),
        ))
        .unwrap();
    assert!(!receipt.status);

    let short = chain
        .process_transaction(&tx(ALICE, 1, Some(RELAY), 0, Bytes::from(vec![0x12])))
        .unwrap();
    assert!(!short.status);
    assert_eq!(chain.finalize().unwrap().tx_count(), 2);
}

#[test_log::test]
fn test_readers_run_alongside_block_production() {
    let mut chain = chain();
    chain.prepare(1).unwrap();
    let tx1 = transfer(ALICE, 0, BOB, 1);
    chain.process_transaction(&tx1).unwrap();
    chain.finalize().unwrap();

    let reader = chain.reader();
    let handle = std::thread::spawn(move || {
        let block = reader.get_block_by_number(1).unwrap().unwrap();
        let lookup = reader.get_transaction_lookup(tx1.hash()).unwrap().unwrap();
        (block.hash(), lookup.block_hash)
    });

    chain.prepare(2).unwrap();
    chain
        .process_transaction(&transfer(ALICE, 1, BOB, 1))
        .unwrap();

    let (block_hash, lookup_hash) = handle.join().unwrap();
    assert_eq!(block_hash, lookup_hash);
    assert_eq!(chain.state(), LifecycleState::AcceptingTransactions);
    chain.finalize().unwrap();
}

#[test_log::test]
fn test_state_views_are_independent() {
    let mut chain = chain();
    chain.prepare(1).unwrap();
    chain
        .process_transaction(&transfer(ALICE, 0, BOB, 500))
        .unwrap();
    chain.finalize().unwrap();

    let mut view = chain.get_state_by_number(1).unwrap();
    view.plugin_mut().add_balance(BOB, U256::from(1_000_000));
    view.add_log(strata_types::Log::new(BOB, vec![], Bytes::new()));

    let other = chain.get_state_by_number(1).unwrap();
    assert_eq!(other.plugin().get_balance(BOB), U256::from(500));
    assert_eq!(
        chain.processor().statedb().plugin().get_balance(BOB),
        U256::from(500)
    );
    assert!(chain.processor().statedb().logs().is_empty());
}
