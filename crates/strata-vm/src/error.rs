use alloy_primitives::{Address, Selector};
use thiserror::Error;

/// Errors that can occur while metering, journaling or dispatching.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Out of gas: consumed {consumed}, limit {limit}")]
    OutOfGas { consumed: u64, limit: u64 },

    #[error("Block out of gas: block consumed {block_consumed}, tx consumed {tx_consumed}, block limit {limit}")]
    BlockOutOfGas {
        block_consumed: u64,
        tx_consumed: u64,
        limit: u64,
    },

    #[error("Gas overflow")]
    GasOverflow,

    #[error("Invalid input: {len} bytes is shorter than a method selector")]
    InvalidInput { len: usize },

    #[error("Method not found for selector {selector}")]
    MethodNotFound { selector: Selector },

    #[error("Precompile container {0} has no methods")]
    ContainerMisconfigured(Address),

    #[error("Execution reverted in {method}: {cause}")]
    ExecutionReverted { method: String, cause: Box<VmError> },

    #[error("ABI codec error: {0}")]
    Codec(String),

    #[error("No native handler for ABI method {signature}")]
    NoHandlerForMethod { signature: String },

    #[error("No ABI method for native handler {signature}")]
    NoAbiMethodForHandler { signature: String },

    #[error("Duplicate native handler for {signature}")]
    DuplicateHandler { signature: String },

    #[error("Wrong container factory: {factory} cannot build a {kind} precompile")]
    WrongContainerFactory {
        factory: &'static str,
        kind: &'static str,
    },

    #[error("Precompile already registered at {0}")]
    DuplicatePrecompile(Address),

    #[error("No precompile at {0}")]
    PrecompileNotFound(Address),

    #[error("Missing attribute {attribute} for event {event}")]
    MissingEventAttribute { event: String, attribute: String },

    #[error("Snapshot component already registered: {0}")]
    DuplicateComponent(String),

    #[error("Snapshot refers to unknown component: {0}")]
    UnknownSnapshotComponent(String),

    #[error("Refund underflow: current {current}, subtracting {amount}")]
    RefundUnderflow { current: u64, amount: u64 },

    #[error("Insufficient balance: have {have}, want {want}")]
    InsufficientBalance { have: String, want: String },

    #[error("Invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("Call depth exceeded: {depth}")]
    CallDepthExceeded { depth: usize },

    #[error("Write protection: state modification in a read-only call")]
    WriteProtection,

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error("State error: {0}")]
    State(String),
}

impl VmError {
    /// Resource exhaustion: aborts only the current transaction.
    pub fn is_gas_error(&self) -> bool {
        matches!(
            self,
            VmError::OutOfGas { .. } | VmError::BlockOutOfGas { .. } | VmError::GasOverflow
        )
    }

    /// Malformed call into a precompile.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            VmError::InvalidInput { .. }
                | VmError::MethodNotFound { .. }
                | VmError::ContainerMisconfigured(_)
        )
    }

    /// Inconsistent precompile declaration; the chain must not start.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            VmError::NoHandlerForMethod { .. }
                | VmError::NoAbiMethodForHandler { .. }
                | VmError::DuplicateHandler { .. }
                | VmError::WrongContainerFactory { .. }
                | VmError::DuplicatePrecompile(_)
        )
    }
}
