//! Strata Transaction Pool
//!
//! Candidate transactions grouped per sender and ordered by nonce. The
//! run starting at a sender's on-chain nonce is *pending* and ready for a
//! block; everything else is *queued* until the chain reaches it.

pub mod error;
pub mod nonce;
pub mod pool;

pub use error::PoolError;
pub use nonce::NonceRetriever;
pub use pool::{PoolConfig, PoolStats, PoolStatus, TxPool};
