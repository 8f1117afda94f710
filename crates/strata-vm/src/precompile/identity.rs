use alloy_primitives::{address, Address, Bytes};

use super::StatelessPrecompile;
use crate::error::VmError;

pub const IDENTITY_ADDRESS: Address = address!("0000000000000000000000000000000000000004");

const IDENTITY_BASE_GAS: u64 = 15;
const IDENTITY_PER_WORD_GAS: u64 = 3;

/// The data copy precompile: returns its input.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl StatelessPrecompile for Identity {
    fn address(&self) -> Address {
        IDENTITY_ADDRESS
    }

    fn required_gas(&self, input: &[u8]) -> u64 {
        let words = (input.len() as u64).div_ceil(32);
        IDENTITY_BASE_GAS.saturating_add(words.saturating_mul(IDENTITY_PER_WORD_GAS))
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VmError> {
        Ok(Bytes::copy_from_slice(input))
    }
}
