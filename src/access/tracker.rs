use super::message::AccessMessage;
use crate::types::{Address, AccessResult, Location, StorageKey};
use ahash::AHashSet;
use std::sync::mpsc::SyncSender;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("access counter channel closed while transaction {0} was still running")]
    ChannelClosed(u32),
}

struct TrackerState {
    addresses: AHashSet<Address>,
    keys: AHashSet<StorageKey>,
}

/// Local, per-transaction collector and one-way forwarder of access events
/// to the shared [`super::counter::AccessCounter`].
///
/// Exclusively owned by the speculative run it serves; the send capability
/// is a clone of the counter's channel sender, never the channel itself.
pub struct AccessTracker {
    tx_idx: u32,
    state: RwLock<TrackerState>,
    channel: SyncSender<AccessMessage>,
}

impl AccessTracker {
    pub fn new(tx_idx: u32, channel: SyncSender<AccessMessage>) -> Self {
        Self {
            tx_idx,
            state: RwLock::new(TrackerState {
                addresses: AHashSet::new(),
                keys: AHashSet::new(),
            }),
            channel,
        }
    }

    fn emit(&self, item: Location) -> Result<(), TrackerError> {
        self.channel
            .send(AccessMessage::new(self.tx_idx, item))
            .map_err(|_| TrackerError::ChannelClosed(self.tx_idx))
    }

    fn record_address(&self, addr: Address) {
        self.state.write().unwrap().addresses.insert(addr);
    }

    fn record_storage(&self, addr: Address, key: StorageKey) {
        let mut state = self.state.write().unwrap();
        state.addresses.insert(addr);
        state.keys.insert(key);
    }

    pub fn track_balance_read(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    pub fn track_balance_write(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    pub fn track_nonce_read(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    pub fn track_nonce_write(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    pub fn track_code_read(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    pub fn track_code_write(&self, addr: Address) -> Result<(), TrackerError> {
        self.emit(Location::Address(addr))?;
        self.record_address(addr);
        Ok(())
    }

    /// Storage ops record both `addr` (locally) and `key`, but only emit the
    /// message keyed on `key`, so storage touches don't alias with
    /// account-level conflicts: two transactions can share an account's
    /// balance or nonce without ever touching the same storage slot.
    pub fn track_storage_read(&self, addr: Address, key: StorageKey) -> Result<(), TrackerError> {
        self.emit(Location::Key(key))?;
        self.record_storage(addr, key);
        Ok(())
    }

    pub fn track_storage_write(&self, addr: Address, key: StorageKey) -> Result<(), TrackerError> {
        self.emit(Location::Key(key))?;
        self.record_storage(addr, key);
        Ok(())
    }

    /// Pure snapshot of this tracker's local sets. Deterministic content,
    /// unspecified iteration order before sorting.
    pub fn to_access_result(&self) -> AccessResult {
        let state = self.state.read().unwrap();
        AccessResult::new(self.tx_idx, state.addresses.clone(), state.keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn test_balance_touch_records_address_only() {
        let (tx, rx) = sync_channel(16);
        let tracker = AccessTracker::new(0, tx);
        let addr = Address::new([1u8; 20]);

        tracker.track_balance_read(addr).unwrap();
        let msg = rx.recv().unwrap();
        assert_eq!(msg.item, Location::Address(addr));

        let result = tracker.to_access_result();
        assert_eq!(result.addresses, vec![addr]);
        assert!(result.keys.is_empty());
    }

    #[test]
    fn test_storage_touch_emits_key_not_address() {
        let (tx, rx) = sync_channel(16);
        let tracker = AccessTracker::new(1, tx);
        let addr = Address::new([2u8; 20]);
        let key = StorageKey::new([9u8; 32]);

        tracker.track_storage_read(addr, key).unwrap();
        let msg = rx.recv().unwrap();
        assert_eq!(msg.item, Location::Key(key));

        let result = tracker.to_access_result();
        assert_eq!(result.addresses, vec![addr]);
        assert_eq!(result.keys, vec![key]);
    }

    #[test]
    fn test_to_access_result_is_pure() {
        let (tx, _rx) = sync_channel(16);
        let tracker = AccessTracker::new(2, tx);
        tracker.track_balance_read(Address::new([3u8; 20])).unwrap();

        let first = tracker.to_access_result();
        let second = tracker.to_access_result();
        assert_eq!(first.addresses, second.addresses);
        assert_eq!(first.keys, second.keys);
    }

    #[test]
    fn test_emit_after_close_fails_loudly() {
        let (tx, rx) = sync_channel(16);
        drop(rx);
        let tracker = AccessTracker::new(3, tx);
        let err = tracker.track_balance_read(Address::new([4u8; 20]));
        assert!(matches!(err, Err(TrackerError::ChannelClosed(3))));
    }
}
