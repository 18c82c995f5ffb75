use super::context::RunContext;
use super::gas::*;
use super::EngineError;
use crate::types::{Address, MicroOp, U256};
use crate::worldstate::WorldState;

/// Dispatch and execute one [`MicroOp`] against `state`, charging gas and
/// updating the warm/cold ledger on `ctx` as it goes.
pub fn execute_op<S: WorldState>(
    op: &MicroOp,
    owner: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    match op {
        MicroOp::SLoad(key) => execute_sload(owner, *key, state, ctx),
        MicroOp::SStore(key, value) => execute_sstore(owner, *key, *value, state, ctx),
        MicroOp::GetBalance(addr) => execute_get_balance(*addr, state, ctx),
        MicroOp::AddBalance(addr, amount) => execute_add_balance(*addr, *amount, state, ctx),
        MicroOp::SubBalance(addr, amount) => execute_sub_balance(*addr, *amount, state, ctx),
        MicroOp::GetNonce(addr) => execute_get_nonce(*addr, state, ctx),
        MicroOp::SetNonce(addr, nonce) => execute_set_nonce(*addr, *nonce, state, ctx),
        MicroOp::GetCode(addr) => execute_get_code(*addr, state, ctx),
        MicroOp::SetCode(addr, code) => execute_set_code(*addr, code.clone(), state, ctx),
        MicroOp::CreateAccount(addr) => execute_create_account(*addr, state, ctx),
        MicroOp::SelfDestruct(addr) => execute_self_destruct(*addr, state, ctx),
        MicroOp::Add(value) => execute_add(*value, ctx),
        MicroOp::Sub(value) => execute_sub(*value, ctx),
        MicroOp::Keccak(data) => execute_keccak(data, ctx),
        MicroOp::NoOp => execute_noop(ctx),
    }
}

/// `SLoad`/`SStore` are keyed purely by [`crate::types::StorageKey`]
/// (storage keys already disambiguate slots globally), so `owner` only
/// selects which account's storage map the world-state backend stores the
/// value under; it plays no part in conflict detection.
fn execute_sload<S: WorldState>(
    owner: Address,
    key: crate::types::StorageKey,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_key(&owner, &key);
    ctx.consume_gas(calculate_sload_gas(is_cold))?;
    ctx.warm_up_key(owner, key);
    let value = state
        .get_state(&owner, &key)
        .map_err(|e| EngineError::State(e.to_string()))?;
    ctx.stack.push(value);
    Ok(())
}

fn execute_sstore<S: WorldState>(
    owner: Address,
    key: crate::types::StorageKey,
    value: U256,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_key(&owner, &key);
    let current = state
        .get_state(&owner, &key)
        .map_err(|e| EngineError::State(e.to_string()))?;
    ctx.consume_gas(calculate_sstore_gas(is_cold, current, value))?;
    ctx.warm_up_key(owner, key);
    state
        .set_state(&owner, &key, value)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_get_balance<S: WorldState>(
    addr: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    let balance = state
        .get_balance(&addr)
        .map_err(|e| EngineError::State(e.to_string()))?;
    ctx.stack.push(balance);
    Ok(())
}

fn execute_add_balance<S: WorldState>(
    addr: Address,
    amount: U256,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    state
        .add_balance(&addr, amount)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_sub_balance<S: WorldState>(
    addr: Address,
    amount: U256,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    state
        .sub_balance(&addr, amount)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_get_nonce<S: WorldState>(
    addr: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    let nonce = state
        .get_nonce(&addr)
        .map_err(|e| EngineError::State(e.to_string()))?;
    ctx.stack.push(U256::from_u64(nonce));
    Ok(())
}

fn execute_set_nonce<S: WorldState>(
    addr: Address,
    nonce: u64,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    state
        .set_nonce(&addr, nonce)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_get_code<S: WorldState>(
    addr: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    let size = state
        .get_code_size(&addr)
        .map_err(|e| EngineError::State(e.to_string()))?;
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    ctx.stack.push(U256::from_u64(size as u64));
    Ok(())
}

fn execute_set_code<S: WorldState>(
    addr: Address,
    code: Vec<u8>,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    let is_cold = !ctx.is_warm_address(&addr);
    ctx.consume_gas(calculate_account_access_gas(is_cold))?;
    ctx.warm_up_address(addr);
    state
        .set_code(&addr, code)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_create_account<S: WorldState>(
    addr: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    ctx.consume_gas(CREATE_ACCOUNT_COST)?;
    ctx.warm_up_address(addr);
    state
        .create_account(&addr)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_self_destruct<S: WorldState>(
    addr: Address,
    state: &mut S,
    ctx: &mut RunContext,
) -> Result<(), EngineError> {
    ctx.consume_gas(SELFDESTRUCT_COST)?;
    ctx.warm_up_address(addr);
    state
        .self_destruct(&addr)
        .map_err(|e| EngineError::State(e.to_string()))?;
    Ok(())
}

fn execute_add(value: U256, ctx: &mut RunContext) -> Result<(), EngineError> {
    ctx.consume_gas(ADD_COST)?;
    let a = ctx.stack.pop().ok_or(EngineError::StackUnderflow("ADD"))?;
    ctx.stack.push(a.add(&value));
    Ok(())
}

fn execute_sub(value: U256, ctx: &mut RunContext) -> Result<(), EngineError> {
    ctx.consume_gas(SUB_COST)?;
    let a = ctx.stack.pop().ok_or(EngineError::StackUnderflow("SUB"))?;
    ctx.stack.push(a.sub(&value));
    Ok(())
}

fn execute_keccak(data: &[u8], ctx: &mut RunContext) -> Result<(), EngineError> {
    ctx.consume_gas(calculate_keccak_gas(data.len()))?;
    // Use blake3 as a fast hash function (in production, use Keccak256).
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(hash.as_bytes());
    ctx.stack.push(U256(bytes));
    Ok(())
}

fn execute_noop(ctx: &mut RunContext) -> Result<(), EngineError> {
    ctx.consume_gas(NOOP_COST)?;
    Ok(())
}
