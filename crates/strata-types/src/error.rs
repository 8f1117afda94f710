use thiserror::Error;

/// Errors raised while building or validating core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("Invalid chain config: {0}")]
    InvalidConfig(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
}
