use strata_core::CoreError;
use strata_types::B256;
use thiserror::Error;

/// Errors that can occur in the transaction pool.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Transaction already known: {0}")]
    AlreadyKnown(B256),

    #[error("Nonce too low: expected {expected}, got {got}")]
    NonceTooLow { expected: u64, got: u64 },

    #[error("Nonce {nonce} already taken by {existing}")]
    ReplacementNotAllowed { nonce: u64, existing: B256 },

    #[error("Transaction pool full: {0}")]
    PoolFull(String),

    #[error("Nothing to replace at nonce {0}")]
    NothingToReplace(u64),
}

impl From<PoolError> for CoreError {
    fn from(err: PoolError) -> Self {
        CoreError::TxPool(err.to_string())
    }
}
