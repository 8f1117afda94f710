use strata_vm::VmError;
use thiserror::Error;

use crate::chain::LifecycleState;

/// Errors that can occur while driving the block lifecycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("VM error: {0}")]
    Vm(#[from] VmError),

    #[error("Invalid lifecycle state: expected {expected}, found {found}")]
    InvalidState {
        expected: LifecycleState,
        found: LifecycleState,
    },

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Header not found for block {0}")]
    HeaderNotFound(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transaction pool error: {0}")]
    TxPool(String),
}

impl CoreError {
    /// Whether the error only affects one transaction; block processing
    /// may continue with the next.
    pub fn is_transaction_error(&self) -> bool {
        matches!(self, CoreError::Vm(e) if !e.is_registration_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidState {
            expected: LifecycleState::Idle,
            found: LifecycleState::AcceptingTransactions,
        };
        assert_eq!(
            err.to_string(),
            "Invalid lifecycle state: expected idle, found accepting_transactions"
        );
    }

    #[test]
    fn test_from_vm_error() {
        let err: CoreError = VmError::GasOverflow.into();
        assert_eq!(err, CoreError::Vm(VmError::GasOverflow));
        assert!(err.is_transaction_error());
        assert!(!CoreError::HeaderNotFound(3).is_transaction_error());
    }
}
