pub mod memory;
pub mod shim;

pub use memory::MemoryWorldState;
pub use shim::TrackingStateShim;

use crate::types::{Address, StorageKey, U256};

/// The world-state capability surface the execution engine consumes: an
/// account and storage model covering balances, nonces, code, storage
/// slots, account lifecycle, refunds, snapshots, transient storage, and
/// access-list membership.
///
/// Methods return `Result` uniformly, in the shape of `revm`'s `Database`
/// trait, so [`TrackingStateShim`] can surface a tracker-channel failure
/// through the very same call path a plain state read takes.
pub trait WorldState: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get_balance(&self, addr: &Address) -> Result<U256, Self::Error>;
    fn add_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error>;
    fn sub_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error>;

    fn get_nonce(&self, addr: &Address) -> Result<u64, Self::Error>;
    fn set_nonce(&mut self, addr: &Address, nonce: u64) -> Result<(), Self::Error>;

    fn get_code(&self, addr: &Address) -> Result<Vec<u8>, Self::Error>;
    fn get_code_size(&self, addr: &Address) -> Result<usize, Self::Error>;
    fn get_code_hash(&self, addr: &Address) -> Result<StorageKey, Self::Error>;
    fn set_code(&mut self, addr: &Address, code: Vec<u8>) -> Result<(), Self::Error>;

    fn get_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error>;
    fn get_committed_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error>;
    fn set_state(&mut self, addr: &Address, key: &StorageKey, value: U256) -> Result<(), Self::Error>;
    fn get_storage_root(&self, addr: &Address) -> Result<StorageKey, Self::Error>;

    fn exist(&self, addr: &Address) -> Result<bool, Self::Error>;
    fn empty(&self, addr: &Address) -> Result<bool, Self::Error>;

    fn create_account(&mut self, addr: &Address) -> Result<(), Self::Error>;
    fn create_contract(&mut self, addr: &Address) -> Result<(), Self::Error>;
    fn self_destruct(&mut self, addr: &Address) -> Result<(), Self::Error>;
    fn self_destruct6780(&mut self, addr: &Address) -> Result<bool, Self::Error>;

    // Untracked pass-through surface: refunds, snapshot lifecycle,
    // transient state, and access-list membership have no bearing on
    // cross-transaction conflicts and are never routed through the tracker.
    fn add_refund(&mut self, amount: u64) -> Result<(), Self::Error>;
    fn sub_refund(&mut self, amount: u64) -> Result<(), Self::Error>;
    fn get_refund(&self) -> Result<u64, Self::Error>;

    fn snapshot(&mut self) -> Result<usize, Self::Error>;
    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), Self::Error>;

    fn get_transient_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error>;
    fn set_transient_state(
        &mut self,
        addr: &Address,
        key: &StorageKey,
        value: U256,
    ) -> Result<(), Self::Error>;

    fn address_in_access_list(&self, addr: &Address) -> Result<bool, Self::Error>;
    fn add_address_to_access_list(&mut self, addr: &Address) -> Result<(), Self::Error>;

    fn finalise(&mut self, delete_empty_objects: bool) -> Result<(), Self::Error>;
}
