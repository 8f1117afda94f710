//! Strata VM - the execution adapter between an EVM interpreter and a
//! foreign host chain.
//!
//! This crate provides:
//! - Overflow-safe gas metering for transactions and blocks
//! - Transaction-scoped journals (logs, refunds, access list, transient
//!   storage, destroyed accounts) under one snapshot controller
//! - The `StateDb` facade over a host-supplied state plugin
//! - Selector-based precompile dispatch with controlled reentrancy

pub mod error;
pub mod gas;
pub mod journal;
pub mod precompile;
pub mod snapshot;
pub mod state;

pub use error::VmError;
pub use gas::GasMeter;
pub use journal::{AccessList, DestroyedAccounts, Logs, Refund, TransientStorage};
pub use precompile::{
    default_precompiles, disable_reentrancy, enable_reentrancy, AbiCodec, CallContext, Container,
    ContainerFactory, DynAbiCodec, DynamicFactory, DynamicPrecompile, EventTranslator, Identity,
    Method, NativeEvent, PrecompileEvm, PrecompileResult, Precompiles, ReentrancyScope,
    Registrable, StatefulFactory, StatefulPrecompile, StatelessFactory, StatelessPrecompile,
    ValueDecoder, IDENTITY_ADDRESS,
};
pub use snapshot::{CompositeSnapshot, Controllable, Controller};
pub use state::{Account, GasConfig, MemoryStatePlugin, StateDb, StatePlugin};

/// Gas charged for a plain value transfer.
pub const TX_BASE_GAS: u64 = 21_000;

/// Maximum nested call depth.
pub const MAX_CALL_DEPTH: usize = 1024;
