use crate::types::{Address, StorageKey, U256};
use ahash::AHashSet;

/// Per-run interpreter bookkeeping: gas accounting and the EIP-2929 warm/cold
/// ledger, covering both storage slots and accounts. Kept local to one
/// speculative run; this is deliberately separate from the cross-transaction
/// tracking the [`crate::worldstate::TrackingStateShim`] performs underneath
/// it.
pub struct RunContext {
    pub warm_addresses: AHashSet<Address>,
    pub warm_keys: AHashSet<(Address, StorageKey)>,
    pub gas_used: u64,
    pub stack: Vec<U256>,
    pub gas_limit: u64,
}

impl RunContext {
    pub fn new(gas_limit: u64) -> Self {
        Self {
            warm_addresses: AHashSet::new(),
            warm_keys: AHashSet::new(),
            gas_used: 0,
            stack: Vec::new(),
            gas_limit,
        }
    }

    pub fn warm_up_address(&mut self, addr: Address) -> bool {
        self.warm_addresses.insert(addr)
    }

    pub fn warm_up_key(&mut self, addr: Address, key: StorageKey) -> bool {
        self.warm_keys.insert((addr, key))
    }

    pub fn is_warm_address(&self, addr: &Address) -> bool {
        self.warm_addresses.contains(addr)
    }

    pub fn is_warm_key(&self, addr: &Address, key: &StorageKey) -> bool {
        self.warm_keys.contains(&(*addr, *key))
    }

    pub fn consume_gas(&mut self, amount: u64) -> Result<(), super::EngineError> {
        self.gas_used = self
            .gas_used
            .checked_add(amount)
            .ok_or(super::EngineError::GasOverflow)?;
        if self.gas_used > self.gas_limit {
            Err(super::EngineError::OutOfGas {
                used: self.gas_used,
                limit: self.gas_limit,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_limit_enforced() {
        let mut ctx = RunContext::new(100);
        assert!(ctx.consume_gas(50).is_ok());
        assert!(ctx.consume_gas(60).is_err());
    }

    #[test]
    fn test_warm_tracking() {
        let mut ctx = RunContext::new(u64::MAX);
        let addr = Address::new([1u8; 20]);
        assert!(!ctx.is_warm_address(&addr));
        ctx.warm_up_address(addr);
        assert!(ctx.is_warm_address(&addr));
    }
}
