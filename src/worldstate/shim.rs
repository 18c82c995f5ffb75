use super::WorldState;
use crate::access::{AccessTracker, TrackerError};
use crate::types::{Address, StorageKey, U256};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShimError<E: std::error::Error + 'static> {
    #[error(transparent)]
    State(#[from] E),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Decorates an inner [`WorldState`] with an [`AccessTracker`], routing every
/// balance/nonce/code/storage read or write through the tracker before
/// delegating to the wrapped store. Untracked pass-through operations (which
/// cannot affect cross-transaction conflicts) go straight to the inner
/// store.
pub struct TrackingStateShim<S: WorldState> {
    inner: S,
    tracker: Arc<AccessTracker>,
}

impl<S: WorldState> TrackingStateShim<S> {
    pub fn new(inner: S, tracker: Arc<AccessTracker>) -> Self {
        Self { inner, tracker }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: WorldState> WorldState for TrackingStateShim<S> {
    type Error = ShimError<S::Error>;

    fn get_balance(&self, addr: &Address) -> Result<U256, Self::Error> {
        self.tracker.track_balance_read(*addr)?;
        Ok(self.inner.get_balance(addr)?)
    }

    fn add_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error> {
        self.tracker.track_balance_read(*addr)?;
        self.tracker.track_balance_write(*addr)?;
        Ok(self.inner.add_balance(addr, amount)?)
    }

    fn sub_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error> {
        self.tracker.track_balance_read(*addr)?;
        self.tracker.track_balance_write(*addr)?;
        Ok(self.inner.sub_balance(addr, amount)?)
    }

    fn get_nonce(&self, addr: &Address) -> Result<u64, Self::Error> {
        self.tracker.track_nonce_read(*addr)?;
        Ok(self.inner.get_nonce(addr)?)
    }

    fn set_nonce(&mut self, addr: &Address, nonce: u64) -> Result<(), Self::Error> {
        self.tracker.track_nonce_write(*addr)?;
        Ok(self.inner.set_nonce(addr, nonce)?)
    }

    fn get_code(&self, addr: &Address) -> Result<Vec<u8>, Self::Error> {
        self.tracker.track_code_read(*addr)?;
        Ok(self.inner.get_code(addr)?)
    }

    fn get_code_size(&self, addr: &Address) -> Result<usize, Self::Error> {
        self.tracker.track_code_read(*addr)?;
        Ok(self.inner.get_code_size(addr)?)
    }

    fn get_code_hash(&self, addr: &Address) -> Result<StorageKey, Self::Error> {
        self.tracker.track_code_read(*addr)?;
        Ok(self.inner.get_code_hash(addr)?)
    }

    fn set_code(&mut self, addr: &Address, code: Vec<u8>) -> Result<(), Self::Error> {
        self.tracker.track_code_write(*addr)?;
        Ok(self.inner.set_code(addr, code)?)
    }

    fn get_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        self.tracker.track_storage_read(*addr, *key)?;
        Ok(self.inner.get_state(addr, key)?)
    }

    fn get_committed_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        self.tracker.track_storage_read(*addr, *key)?;
        Ok(self.inner.get_committed_state(addr, key)?)
    }

    fn set_state(&mut self, addr: &Address, key: &StorageKey, value: U256) -> Result<(), Self::Error> {
        self.tracker.track_storage_write(*addr, *key)?;
        Ok(self.inner.set_state(addr, key, value)?)
    }

    fn get_storage_root(&self, addr: &Address) -> Result<StorageKey, Self::Error> {
        let root = self.inner.get_storage_root(addr)?;
        self.tracker.track_storage_read(*addr, root)?;
        Ok(root)
    }

    fn exist(&self, addr: &Address) -> Result<bool, Self::Error> {
        self.tracker.track_balance_read(*addr)?;
        Ok(self.inner.exist(addr)?)
    }

    fn empty(&self, addr: &Address) -> Result<bool, Self::Error> {
        self.tracker.track_balance_read(*addr)?;
        self.tracker.track_nonce_read(*addr)?;
        self.tracker.track_code_read(*addr)?;
        Ok(self.inner.empty(addr)?)
    }

    fn create_account(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.tracker.track_balance_write(*addr)?;
        self.tracker.track_nonce_write(*addr)?;
        self.tracker.track_code_write(*addr)?;
        Ok(self.inner.create_account(addr)?)
    }

    fn create_contract(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.tracker.track_code_write(*addr)?;
        Ok(self.inner.create_contract(addr)?)
    }

    fn self_destruct(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.tracker.track_balance_write(*addr)?;
        self.tracker.track_nonce_write(*addr)?;
        self.tracker.track_code_write(*addr)?;
        Ok(self.inner.self_destruct(addr)?)
    }

    fn self_destruct6780(&mut self, addr: &Address) -> Result<bool, Self::Error> {
        self.tracker.track_balance_write(*addr)?;
        self.tracker.track_nonce_write(*addr)?;
        self.tracker.track_code_write(*addr)?;
        Ok(self.inner.self_destruct6780(addr)?)
    }

    fn add_refund(&mut self, amount: u64) -> Result<(), Self::Error> {
        Ok(self.inner.add_refund(amount)?)
    }

    fn sub_refund(&mut self, amount: u64) -> Result<(), Self::Error> {
        Ok(self.inner.sub_refund(amount)?)
    }

    fn get_refund(&self) -> Result<u64, Self::Error> {
        Ok(self.inner.get_refund()?)
    }

    fn snapshot(&mut self) -> Result<usize, Self::Error> {
        Ok(self.inner.snapshot()?)
    }

    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), Self::Error> {
        Ok(self.inner.revert_to_snapshot(id)?)
    }

    fn get_transient_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        Ok(self.inner.get_transient_state(addr, key)?)
    }

    fn set_transient_state(
        &mut self,
        addr: &Address,
        key: &StorageKey,
        value: U256,
    ) -> Result<(), Self::Error> {
        Ok(self.inner.set_transient_state(addr, key, value)?)
    }

    fn address_in_access_list(&self, addr: &Address) -> Result<bool, Self::Error> {
        Ok(self.inner.address_in_access_list(addr)?)
    }

    fn add_address_to_access_list(&mut self, addr: &Address) -> Result<(), Self::Error> {
        Ok(self.inner.add_address_to_access_list(addr)?)
    }

    fn finalise(&mut self, delete_empty_objects: bool) -> Result<(), Self::Error> {
        Ok(self.inner.finalise(delete_empty_objects)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worldstate::MemoryWorldState;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn test_balance_write_tracks_once_per_call() {
        let (tx, rx) = sync_channel(16);
        let tracker = Arc::new(AccessTracker::new(0, tx));
        let mut shim = TrackingStateShim::new(MemoryWorldState::new(), tracker.clone());
        let addr = Address::new([1u8; 20]);

        shim.add_balance(&addr, U256::from_u64(10)).unwrap();
        assert_eq!(shim.get_balance(&addr).unwrap(), U256::from_u64(10));

        drop(shim);
        drop(tracker);
        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 3); // add_balance: read+write, get_balance: read
    }

    #[test]
    fn test_storage_write_then_read_round_trips_through_inner() {
        let (tx, _rx) = sync_channel(16);
        let tracker = Arc::new(AccessTracker::new(1, tx));
        let mut shim = TrackingStateShim::new(MemoryWorldState::new(), tracker);
        let addr = Address::new([2u8; 20]);
        let key = StorageKey::new([3u8; 32]);

        shim.set_state(&addr, &key, U256::from_u64(7)).unwrap();
        assert_eq!(shim.get_state(&addr, &key).unwrap(), U256::from_u64(7));
    }

    #[test]
    fn test_pass_through_ops_are_untracked() {
        let (tx, rx) = sync_channel(16);
        let tracker = Arc::new(AccessTracker::new(2, tx));
        let mut shim = TrackingStateShim::new(MemoryWorldState::new(), tracker.clone());

        shim.add_refund(5).unwrap();
        assert_eq!(shim.get_refund().unwrap(), 5);
        let _ = shim.snapshot().unwrap();

        drop(shim);
        drop(tracker);
        assert!(rx.try_iter().next().is_none());
    }
}
