//! State access for the interpreter.

mod memory;
mod plugin;
mod statedb;

pub use memory::{Account, MemoryStatePlugin};
pub use plugin::{GasConfig, StatePlugin};
pub use statedb::StateDb;
