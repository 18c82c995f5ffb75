use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 20-byte account identifier. Distinct name space from [`StorageKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// 32-byte storage-slot identifier. Distinct name space from [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageKey(pub [u8; 32]);

impl StorageKey {
    pub const ZERO: StorageKey = StorageKey([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// A single touched state location. Addresses and storage keys never alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Address(Address),
    Key(StorageKey),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Address(a) => write!(f, "addr:{}", a),
            Location::Key(k) => write!(f, "key:{}", k),
        }
    }
}

/// 256-bit scalar value, stored as 32 big-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct U256(pub [u8; 32]);

impl U256 {
    pub const ZERO: U256 = U256([0u8; 32]);
    pub const ONE: U256 = {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        U256(bytes)
    };

    pub fn from_u64(val: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..32].copy_from_slice(&val.to_be_bytes());
        U256(bytes)
    }

    pub fn to_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|&b| b != 0) {
            return None;
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[24..32]);
        Some(u64::from_be_bytes(bytes))
    }

    pub fn add(&self, other: &U256) -> U256 {
        let mut result = [0u8; 32];
        let mut carry = 0u16;
        for i in (0..32).rev() {
            let sum = self.0[i] as u16 + other.0[i] as u16 + carry;
            result[i] = (sum & 0xFF) as u8;
            carry = sum >> 8;
        }
        U256(result)
    }

    pub fn sub(&self, other: &U256) -> U256 {
        let mut result = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = self.0[i] as i16 - other.0[i] as i16 - borrow;
            if diff < 0 {
                result[i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                result[i] = diff as u8;
                borrow = 0;
            }
        }
        U256(result)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

/// Instruction set the demonstration [`crate::engine::MicroOpEngine`] runs.
///
/// Covers balance, nonce, code and account-lifecycle ops alongside storage
/// reads and writes, so every combination of tracked state the world-state
/// backend exposes is exercisable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MicroOp {
    SLoad(StorageKey),
    SStore(StorageKey, U256),
    GetBalance(Address),
    AddBalance(Address, U256),
    SubBalance(Address, U256),
    GetNonce(Address),
    SetNonce(Address, u64),
    GetCode(Address),
    SetCode(Address, Vec<u8>),
    CreateAccount(Address),
    SelfDestruct(Address),
    Add(U256),
    Sub(U256),
    Keccak(Vec<u8>),
    NoOp,
}

/// One transaction in a batch submitted for conflict analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransaction {
    pub tx_idx: u32,
    pub from: Address,
    /// Absent ⇒ contract creation (dispatch `Create`); present ⇒ `Call`.
    pub to: Option<Address>,
    pub value: U256,
    pub program: Vec<MicroOp>,
    pub access_list: Vec<StorageKey>,
    pub nonce: u64,
}

/// A batch of transactions destined for serial execution, to be partitioned
/// into parallel-safe groups by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub block_number: u64,
    pub base_fee: U256,
    pub transactions: Vec<BatchTransaction>,
}

impl Batch {
    pub fn new(block_number: u64, transactions: Vec<BatchTransaction>) -> Self {
        Self {
            block_number,
            base_fee: U256::ZERO,
            transactions,
        }
    }
}

/// Per-transaction footprint, keyed by the two disjoint location spaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessResult {
    pub tx_idx: u32,
    pub addresses: Vec<Address>,
    pub keys: Vec<StorageKey>,
}

impl AccessResult {
    pub fn new(tx_idx: u32, addresses: AHashSet<Address>, keys: AHashSet<StorageKey>) -> Self {
        let mut addresses: Vec<Address> = addresses.into_iter().collect();
        let mut keys: Vec<StorageKey> = keys.into_iter().collect();
        addresses.sort_unstable();
        keys.sort_unstable();
        Self {
            tx_idx,
            addresses,
            keys,
        }
    }
}

/// Summary metrics over one completed analysis pass, scoped to what a
/// conflict-analysis-only core actually measures. No speedup-vs-serial
/// claim: nothing here executes for effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub num_transactions: usize,
    pub num_conflicting: usize,
    pub num_groups: usize,
    pub avg_group_size: f64,
    pub largest_group: usize,
    pub conflict_rate: f64,
}

impl AnalysisMetrics {
    pub fn default_for(num_transactions: usize) -> Self {
        Self {
            num_transactions,
            num_conflicting: 0,
            num_groups: 1,
            avg_group_size: num_transactions as f64,
            largest_group: num_transactions,
            conflict_rate: 0.0,
        }
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
