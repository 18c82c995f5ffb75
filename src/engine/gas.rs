use crate::types::U256;

/// EIP-2929 gas costs.
pub const COLD_SLOAD_COST: u64 = 2100;
pub const WARM_SLOAD_COST: u64 = 100;

pub const COLD_SSTORE_COST: u64 = 20000;
pub const WARM_SSTORE_COST: u64 = 2900;
pub const SSTORE_RESET_COST: u64 = 5000;
pub const SSTORE_SET_COST: u64 = 20000;

pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2600;
pub const WARM_ACCOUNT_ACCESS_COST: u64 = 100;

pub const ADD_COST: u64 = 3;
pub const SUB_COST: u64 = 3;
pub const KECCAK_BASE_COST: u64 = 30;
pub const KECCAK_WORD_COST: u64 = 6;
pub const NOOP_COST: u64 = 1;
pub const CREATE_ACCOUNT_COST: u64 = 32000;
pub const SELFDESTRUCT_COST: u64 = 5000;

pub fn calculate_sload_gas(is_cold: bool) -> u64 {
    if is_cold {
        COLD_SLOAD_COST
    } else {
        WARM_SLOAD_COST
    }
}

pub fn calculate_sstore_gas(is_cold: bool, current: U256, new_value: U256) -> u64 {
    let is_zero = current == U256::ZERO;
    let new_is_zero = new_value == U256::ZERO;

    let base = match (is_zero, new_is_zero) {
        (_, true) => SSTORE_RESET_COST,
        (true, false) => SSTORE_SET_COST,
        (false, false) => WARM_SSTORE_COST,
    };

    if is_cold && !(is_zero && new_is_zero) {
        base + COLD_SLOAD_COST
    } else {
        base
    }
}

pub fn calculate_account_access_gas(is_cold: bool) -> u64 {
    if is_cold {
        COLD_ACCOUNT_ACCESS_COST
    } else {
        WARM_ACCOUNT_ACCESS_COST
    }
}

pub fn calculate_keccak_gas(data_len: usize) -> u64 {
    KECCAK_BASE_COST + KECCAK_WORD_COST * data_len.div_ceil(32) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sload_gas() {
        assert_eq!(calculate_sload_gas(true), COLD_SLOAD_COST);
        assert_eq!(calculate_sload_gas(false), WARM_SLOAD_COST);
    }

    #[test]
    fn test_account_access_gas() {
        assert_eq!(calculate_account_access_gas(true), COLD_ACCOUNT_ACCESS_COST);
        assert_eq!(calculate_account_access_gas(false), WARM_ACCOUNT_ACCESS_COST);
    }

    #[test]
    fn test_sstore_gas_cold_vs_warm() {
        let zero = U256::ZERO;
        let one = U256::from_u64(1);
        assert!(calculate_sstore_gas(true, zero, one) > calculate_sstore_gas(false, zero, one));
    }
}
