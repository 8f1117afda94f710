//! EIP-1559 base fee calculation.

use strata_types::{ChainConfig, Header, U256};

/// Calculate the base fee of the block following `parent`.
///
/// A parent mined before London yields the configured initial base fee.
/// Otherwise the fee moves towards the gas target (`gas_limit / elasticity`)
/// by at most `1 / base_fee_change_denominator` per block.
pub fn calc_base_fee(config: &ChainConfig, parent: &Header) -> U256 {
    if !config.is_london(parent.number) {
        return config.initial_base_fee;
    }

    let elasticity = config.elasticity_multiplier.max(1);
    let denominator = U256::from(config.base_fee_change_denominator.max(1));
    let parent_gas_target = parent.gas_limit / elasticity;

    // Prevent division by zero
    if parent_gas_target == 0 || parent.gas_used == parent_gas_target {
        return parent.base_fee;
    }

    let target = U256::from(parent_gas_target);
    if parent.gas_used > parent_gas_target {
        let gas_used_delta = U256::from(parent.gas_used - parent_gas_target);
        let base_fee_delta = (parent.base_fee.saturating_mul(gas_used_delta) / target / denominator)
            .max(U256::from(1));
        parent.base_fee.saturating_add(base_fee_delta)
    } else {
        let gas_used_delta = U256::from(parent_gas_target - parent.gas_used);
        let base_fee_delta = parent.base_fee.saturating_mul(gas_used_delta) / target / denominator;
        parent.base_fee.saturating_sub(base_fee_delta)
    }
}
