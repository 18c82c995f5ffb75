pub mod context;
pub mod gas;
pub mod ops;

pub use context::RunContext;
pub use ops::execute_op;

use crate::types::{BatchTransaction, MicroOp};
use crate::worldstate::WorldState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("stack underflow in {0}")]
    StackUnderflow(&'static str),
    #[error("gas overflow")]
    GasOverflow,
    #[error("out of gas: used {used} > limit {limit}")]
    OutOfGas { used: u64, limit: u64 },
    #[error("world-state operation failed: {0}")]
    State(String),
}

/// A unit of speculative execution against a [`WorldState`] backend, put
/// behind a trait so the conflict analyzer can be parameterized over
/// alternative interpreters: the execution engine is a pluggable dependency
/// of the analyzer, not part of its own contract.
pub trait SpeculativeEngine<S: WorldState>: Send + Sync {
    /// Run one transaction's program against `state`, returning gas used.
    /// Mutations speculatively committed to `state` are never rolled back by
    /// the engine itself; the caller owns a disposable state instance per
    /// speculative run.
    fn run(&self, state: &mut S, tx: &BatchTransaction) -> Result<u64, EngineError>;
}

/// Interprets [`MicroOp`] programs against any [`WorldState`] implementation,
/// charging gas and tracking the warm/cold ledger as it runs each op.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicroOpEngine {
    gas_limit: u64,
}

impl MicroOpEngine {
    pub fn new() -> Self {
        Self {
            gas_limit: u64::MAX,
        }
    }

    pub fn with_gas_limit(gas_limit: u64) -> Self {
        Self { gas_limit }
    }
}

impl<S: WorldState> SpeculativeEngine<S> for MicroOpEngine {
    fn run(&self, state: &mut S, tx: &BatchTransaction) -> Result<u64, EngineError> {
        tracing::debug!(tx_idx = tx.tx_idx, "running transaction program");

        let mut ctx = RunContext::new(self.gas_limit);
        ctx.warm_up_address(tx.from);
        if let Some(to) = tx.to {
            ctx.warm_up_address(to);
        }
        for key in &tx.access_list {
            ctx.warm_up_key(tx.from, *key);
        }

        for (idx, op) in tx.program.iter().enumerate() {
            execute_op(op, tx.from, state, &mut ctx).map_err(|e| {
                tracing::error!(tx_idx = tx.tx_idx, op_idx = idx, error = %e, "op failed");
                e
            })?;
        }

        Ok(ctx.gas_used)
    }
}

/// Reference micro-program covering every row of the taxonomy table, useful
/// for synthetic batches and tests.
pub fn default_program_for(tx: &BatchTransaction) -> Vec<MicroOp> {
    tx.program.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, StorageKey, U256};
    use crate::worldstate::MemoryWorldState;

    fn tx(tx_idx: u32, program: Vec<MicroOp>) -> BatchTransaction {
        BatchTransaction {
            tx_idx,
            from: Address::new([tx_idx as u8 + 1; 20]),
            to: None,
            value: U256::ZERO,
            program,
            access_list: vec![],
            nonce: 0,
        }
    }

    #[test]
    fn test_run_simple_transfer_program() {
        let engine = MicroOpEngine::new();
        let mut state = MemoryWorldState::new();
        let from = Address::new([1u8; 20]);
        let to = Address::new([2u8; 20]);

        let t = BatchTransaction {
            tx_idx: 0,
            from,
            to: Some(to),
            value: U256::from_u64(10),
            program: vec![
                MicroOp::SubBalance(from, U256::from_u64(10)),
                MicroOp::AddBalance(to, U256::from_u64(10)),
            ],
            access_list: vec![],
            nonce: 0,
        };

        let gas = engine.run(&mut state, &t).unwrap();
        assert!(gas > 0);
        assert_eq!(state.get_balance(&to).unwrap(), U256::from_u64(10));
    }

    #[test]
    fn test_run_reports_stack_underflow() {
        let engine = MicroOpEngine::new();
        let mut state = MemoryWorldState::new();
        let t = tx(1, vec![MicroOp::Add(U256::from_u64(1))]);
        let err = engine.run(&mut state, &t);
        assert!(matches!(err, Err(EngineError::StackUnderflow("ADD"))));
    }

    #[test]
    fn test_run_enforces_gas_limit() {
        let engine = MicroOpEngine::with_gas_limit(1);
        let mut state = MemoryWorldState::new();
        let t = tx(2, vec![MicroOp::SLoad(StorageKey::ZERO)]);
        let err = engine.run(&mut state, &t);
        assert!(matches!(err, Err(EngineError::OutOfGas { .. })));
    }
}
