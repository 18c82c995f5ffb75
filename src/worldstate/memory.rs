use super::WorldState;
use crate::types::{Address, StorageKey, U256};
use ahash::AHashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
struct Account {
    balance: U256,
    nonce: u64,
    code: Vec<u8>,
    storage: AHashMap<StorageKey, U256>,
    destroyed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    accounts: AHashMap<Address, Account>,
    refund: u64,
    transient: AHashMap<(Address, StorageKey), U256>,
    access_list: std::collections::HashSet<Address>,
    snapshots: Vec<AHashMap<Address, Account>>,
}

/// In-memory [`WorldState`] implementation, backed by a per-account record
/// map behind `Arc<Mutex<_>>`. Never fails, so its associated error is
/// [`Infallible`].
#[derive(Clone)]
pub struct MemoryWorldState {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWorldState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryWorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState for MemoryWorldState {
    type Error = Infallible;

    fn get_balance(&self, addr: &Address) -> Result<U256, Self::Error> {
        Ok(self
            .lock()
            .accounts
            .get(addr)
            .map(|a| a.balance)
            .unwrap_or(U256::ZERO))
    }

    fn add_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        let account = inner.accounts.entry(*addr).or_default();
        account.balance = account.balance.add(&amount);
        Ok(())
    }

    fn sub_balance(&mut self, addr: &Address, amount: U256) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        let account = inner.accounts.entry(*addr).or_default();
        account.balance = account.balance.sub(&amount);
        Ok(())
    }

    fn get_nonce(&self, addr: &Address) -> Result<u64, Self::Error> {
        Ok(self.lock().accounts.get(addr).map(|a| a.nonce).unwrap_or(0))
    }

    fn set_nonce(&mut self, addr: &Address, nonce: u64) -> Result<(), Self::Error> {
        self.lock().accounts.entry(*addr).or_default().nonce = nonce;
        Ok(())
    }

    fn get_code(&self, addr: &Address) -> Result<Vec<u8>, Self::Error> {
        Ok(self
            .lock()
            .accounts
            .get(addr)
            .map(|a| a.code.clone())
            .unwrap_or_default())
    }

    fn get_code_size(&self, addr: &Address) -> Result<usize, Self::Error> {
        Ok(self
            .lock()
            .accounts
            .get(addr)
            .map(|a| a.code.len())
            .unwrap_or(0))
    }

    fn get_code_hash(&self, addr: &Address) -> Result<StorageKey, Self::Error> {
        let code = self.get_code(addr)?;
        // Use blake3 as a fast hash function (in production, use Keccak256).
        let hash = blake3::hash(&code);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(hash.as_bytes());
        Ok(StorageKey::new(bytes))
    }

    fn set_code(&mut self, addr: &Address, code: Vec<u8>) -> Result<(), Self::Error> {
        self.lock().accounts.entry(*addr).or_default().code = code;
        Ok(())
    }

    fn get_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        Ok(self
            .lock()
            .accounts
            .get(addr)
            .and_then(|a| a.storage.get(key))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn get_committed_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        self.get_state(addr, key)
    }

    fn set_state(&mut self, addr: &Address, key: &StorageKey, value: U256) -> Result<(), Self::Error> {
        self.lock()
            .accounts
            .entry(*addr)
            .or_default()
            .storage
            .insert(*key, value);
        Ok(())
    }

    fn get_storage_root(&self, addr: &Address) -> Result<StorageKey, Self::Error> {
        let inner = self.lock();
        let mut bytes = [0u8; 32];
        if let Some(account) = inner.accounts.get(addr) {
            let mut entries: Vec<(StorageKey, U256)> =
                account.storage.iter().map(|(k, v)| (*k, *v)).collect();
            entries.sort_unstable_by_key(|(k, _)| *k);
            // Use blake3 as a fast hash function (in production, use Keccak256).
            let mut hasher = blake3::Hasher::new();
            for (k, v) in entries {
                hasher.update(&k.0);
                hasher.update(&v.0);
            }
            bytes.copy_from_slice(hasher.finalize().as_bytes());
        }
        Ok(StorageKey::new(bytes))
    }

    fn exist(&self, addr: &Address) -> Result<bool, Self::Error> {
        let inner = self.lock();
        Ok(inner
            .accounts
            .get(addr)
            .map(|a| !a.destroyed)
            .unwrap_or(false))
    }

    fn empty(&self, addr: &Address) -> Result<bool, Self::Error> {
        let inner = self.lock();
        Ok(match inner.accounts.get(addr) {
            None => true,
            Some(a) => a.balance == U256::ZERO && a.nonce == 0 && a.code.is_empty(),
        })
    }

    fn create_account(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.lock().accounts.entry(*addr).or_default();
        Ok(())
    }

    fn create_contract(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.lock().accounts.entry(*addr).or_default();
        Ok(())
    }

    fn self_destruct(&mut self, addr: &Address) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        let account = inner.accounts.entry(*addr).or_default();
        account.balance = U256::ZERO;
        account.nonce = 0;
        account.code.clear();
        account.destroyed = true;
        Ok(())
    }

    fn self_destruct6780(&mut self, addr: &Address) -> Result<bool, Self::Error> {
        self.self_destruct(addr)?;
        Ok(true)
    }

    fn add_refund(&mut self, amount: u64) -> Result<(), Self::Error> {
        self.lock().refund += amount;
        Ok(())
    }

    fn sub_refund(&mut self, amount: u64) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        inner.refund = inner.refund.saturating_sub(amount);
        Ok(())
    }

    fn get_refund(&self) -> Result<u64, Self::Error> {
        Ok(self.lock().refund)
    }

    fn snapshot(&mut self) -> Result<usize, Self::Error> {
        let mut inner = self.lock();
        let accounts = inner.accounts.clone();
        inner.snapshots.push(accounts);
        Ok(inner.snapshots.len() - 1)
    }

    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), Self::Error> {
        let mut inner = self.lock();
        if let Some(accounts) = inner.snapshots.get(id).cloned() {
            inner.accounts = accounts;
            inner.snapshots.truncate(id);
        }
        Ok(())
    }

    fn get_transient_state(&self, addr: &Address, key: &StorageKey) -> Result<U256, Self::Error> {
        Ok(self
            .lock()
            .transient
            .get(&(*addr, *key))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    fn set_transient_state(
        &mut self,
        addr: &Address,
        key: &StorageKey,
        value: U256,
    ) -> Result<(), Self::Error> {
        self.lock().transient.insert((*addr, *key), value);
        Ok(())
    }

    fn address_in_access_list(&self, addr: &Address) -> Result<bool, Self::Error> {
        Ok(self.lock().access_list.contains(addr))
    }

    fn add_address_to_access_list(&mut self, addr: &Address) -> Result<(), Self::Error> {
        self.lock().access_list.insert(*addr);
        Ok(())
    }

    fn finalise(&mut self, _delete_empty_objects: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_roundtrip() {
        let mut state = MemoryWorldState::new();
        let addr = Address::new([1u8; 20]);
        state.add_balance(&addr, U256::from_u64(100)).unwrap();
        assert_eq!(state.get_balance(&addr).unwrap(), U256::from_u64(100));
        state.sub_balance(&addr, U256::from_u64(40)).unwrap();
        assert_eq!(state.get_balance(&addr).unwrap(), U256::from_u64(60));
    }

    #[test]
    fn test_storage_roundtrip() {
        let mut state = MemoryWorldState::new();
        let addr = Address::new([1u8; 20]);
        let key = StorageKey::new([2u8; 32]);
        state.set_state(&addr, &key, U256::from_u64(42)).unwrap();
        assert_eq!(state.get_state(&addr, &key).unwrap(), U256::from_u64(42));
    }

    #[test]
    fn test_snapshot_revert() {
        let mut state = MemoryWorldState::new();
        let addr = Address::new([1u8; 20]);
        state.add_balance(&addr, U256::from_u64(10)).unwrap();
        let snap = state.snapshot().unwrap();
        state.add_balance(&addr, U256::from_u64(90)).unwrap();
        assert_eq!(state.get_balance(&addr).unwrap(), U256::from_u64(100));
        state.revert_to_snapshot(snap).unwrap();
        assert_eq!(state.get_balance(&addr).unwrap(), U256::from_u64(10));
    }

    #[test]
    fn test_empty_and_exist() {
        let mut state = MemoryWorldState::new();
        let addr = Address::new([3u8; 20]);
        assert!(state.empty(&addr).unwrap());
        assert!(!state.exist(&addr).unwrap());
        state.create_account(&addr).unwrap();
        assert!(state.exist(&addr).unwrap());
        state.add_balance(&addr, U256::from_u64(1)).unwrap();
        assert!(!state.empty(&addr).unwrap());
    }
}
