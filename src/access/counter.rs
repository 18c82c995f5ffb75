use super::message::AccessMessage;
use crate::types::{Address, Location, StorageKey};
use ahash::AHashMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error("access counter consumer thread terminated before stop() was called")]
    ClosedPrematurely,
    #[error("access counter was already started")]
    AlreadyStarted,
    #[error("access counter has not been started")]
    NotStarted,
}

const DEFAULT_CAPACITY: usize = 1024;

/// Per-location occupancy record. `count` is kept alongside `access_txs`
/// rather than derived on every read, as an explicit, checked field that
/// must always equal `access_txs.len()`.
#[derive(Debug, Default, Clone)]
struct AccessInfo {
    access_txs: std::collections::HashSet<u32>,
    count: u64,
}

impl AccessInfo {
    fn touch(&mut self, tx_idx: u32) -> bool {
        let inserted = self.access_txs.insert(tx_idx);
        if inserted {
            self.count += 1;
        }
        debug_assert_eq!(self.count as usize, self.access_txs.len());
        inserted
    }
}

#[derive(Debug, Default)]
struct CounterState {
    address_map: AHashMap<Address, AccessInfo>,
    key_map: AHashMap<StorageKey, AccessInfo>,
    tx_max: AHashMap<u32, usize>,
}

impl CounterState {
    /// Processing rule for one message: every transaction currently sharing
    /// `L` has its `tx_max` refreshed, not only the transaction that
    /// triggered this message. A singleton location cannot cause a
    /// conflict, so `tx_max` stays unraised until a second distinct
    /// transaction touches the same location.
    fn process(&mut self, msg: AccessMessage) {
        let info = match msg.item {
            Location::Address(addr) => {
                let info = self.address_map.entry(addr).or_default();
                info.touch(msg.tx_idx);
                info.clone()
            }
            Location::Key(key) => {
                let info = self.key_map.entry(key).or_default();
                info.touch(msg.tx_idx);
                info.clone()
            }
        };

        if info.count > 1 {
            for &participant in &info.access_txs {
                let entry = self.tx_max.entry(participant).or_insert(0);
                *entry = (*entry).max(info.count as usize);
            }
        } else {
            self.tx_max.entry(msg.tx_idx).or_insert(0);
        }
    }
}

/// Single shared aggregator of [`AccessMessage`]s across all concurrently
/// running speculative transactions. Runs as a single consumer thread; its
/// maps are touched only by that thread while messages are flowing, so no
/// internal locking is needed on the hot path.
pub struct AccessCounter {
    sender: Option<SyncSender<AccessMessage>>,
    receiver: Option<Receiver<AccessMessage>>,
    handle: Option<JoinHandle<CounterState>>,
    state: Option<CounterState>,
}

impl AccessCounter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity);
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
            handle: None,
            state: None,
        }
    }

    /// Begin consuming messages on a dedicated thread.
    pub fn start(&mut self) -> Result<(), CounterError> {
        let receiver = self.receiver.take().ok_or(CounterError::AlreadyStarted)?;
        self.handle = Some(thread::spawn(move || {
            let mut state = CounterState::default();
            for msg in receiver {
                state.process(msg);
            }
            state
        }));
        Ok(())
    }

    /// A send-only capability for a new [`super::tracker::AccessTracker`].
    pub fn channel(&self) -> SyncSender<AccessMessage> {
        self.sender
            .as_ref()
            .expect("access counter channel requested after stop()")
            .clone()
    }

    /// Close the channel, drain remaining messages, and join the consumer
    /// thread. Must be called exactly once, after every tracker sharing
    /// this counter's channel has been dropped, and before any query
    /// method is used.
    pub fn stop(&mut self) -> Result<(), CounterError> {
        self.sender.take().ok_or(CounterError::NotStarted)?;
        let handle = self.handle.take().ok_or(CounterError::NotStarted)?;
        let state = handle.join().map_err(|_| CounterError::ClosedPrematurely)?;
        self.state = Some(state);
        Ok(())
    }

    fn state(&self) -> &CounterState {
        self.state
            .as_ref()
            .expect("access counter queried before stop()")
    }

    pub fn is_conflict(&self, tx_idx: u32) -> bool {
        self.state().tx_max.get(&tx_idx).copied().unwrap_or(0) > 1
    }

    pub fn get_address_count(&self, addr: &Address) -> u64 {
        self.state()
            .address_map
            .get(addr)
            .map(|info| info.count)
            .unwrap_or(0)
    }

    pub fn get_key_count(&self, key: &StorageKey) -> u64 {
        self.state()
            .key_map
            .get(key)
            .map(|info| info.count)
            .unwrap_or(0)
    }

    pub fn get_address_access_txs(&self, addr: &Address) -> Vec<u32> {
        self.state()
            .address_map
            .get(addr)
            .map(|info| info.access_txs.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_key_access_txs(&self, key: &StorageKey) -> Vec<u32> {
        self.state()
            .key_map
            .get(key)
            .map(|info| info.access_txs.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All (tx, tx) pairs that share at least one location, deduplicated and
    /// ordered `(lo, hi)` with `lo < hi`. The edge set the conflict graph is
    /// built from.
    pub fn conflicting_pairs(&self) -> Vec<(u32, u32)> {
        let state = self.state();
        let mut pairs = std::collections::BTreeSet::new();
        for info in state.address_map.values().chain(state.key_map.values()) {
            if info.access_txs.len() < 2 {
                continue;
            }
            let mut members: Vec<u32> = info.access_txs.iter().copied().collect();
            members.sort_unstable();
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    pairs.insert((members[i], members[j]));
                }
            }
        }
        pairs.into_iter().collect()
    }
}

impl Default for AccessCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tracker::AccessTracker;

    #[test]
    fn test_three_independent_transfers() {
        let mut counter = AccessCounter::new();
        counter.start().unwrap();

        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let c = Address::new([3u8; 20]);

        {
            let t0 = AccessTracker::new(0, counter.channel());
            let t1 = AccessTracker::new(1, counter.channel());
            let t2 = AccessTracker::new(2, counter.channel());
            t0.track_balance_read(a).unwrap();
            t1.track_balance_read(b).unwrap();
            t2.track_balance_read(c).unwrap();
        }

        counter.stop().unwrap();

        assert!(!counter.is_conflict(0));
        assert!(!counter.is_conflict(1));
        assert!(!counter.is_conflict(2));
        assert!(counter.conflicting_pairs().is_empty());
    }

    #[test]
    fn test_pairwise_conflict_on_one_address() {
        let mut counter = AccessCounter::new();
        counter.start().unwrap();
        let a = Address::new([1u8; 20]);

        {
            let t0 = AccessTracker::new(0, counter.channel());
            let t1 = AccessTracker::new(1, counter.channel());
            t0.track_balance_read(a).unwrap();
            t1.track_balance_read(a).unwrap();
        }

        counter.stop().unwrap();

        assert_eq!(counter.get_address_count(&a), 2);
        assert!(counter.is_conflict(0));
        assert!(counter.is_conflict(1));
        assert_eq!(counter.conflicting_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn test_storage_vs_balance_disjointness() {
        let mut counter = AccessCounter::new();
        counter.start().unwrap();
        let a = Address::new([1u8; 20]);
        let k = StorageKey::new([9u8; 32]);

        {
            let t0 = AccessTracker::new(0, counter.channel());
            let t1 = AccessTracker::new(1, counter.channel());
            t0.track_storage_read(a, k).unwrap();
            t1.track_balance_read(a).unwrap();
        }

        counter.stop().unwrap();

        assert_eq!(counter.get_address_count(&a), 1);
        assert_eq!(counter.get_key_count(&k), 1);
        assert!(!counter.is_conflict(0));
        assert!(!counter.is_conflict(1));
    }

    #[test]
    fn test_counter_idempotence_repeated_sends() {
        let mut counter = AccessCounter::new();
        counter.start().unwrap();
        let a = Address::new([5u8; 20]);

        {
            let t0 = AccessTracker::new(0, counter.channel());
            for _ in 0..5 {
                t0.track_balance_read(a).unwrap();
            }
        }

        counter.stop().unwrap();
        assert_eq!(counter.get_address_count(&a), 1);
        assert!(!counter.is_conflict(0));
    }

    #[test]
    fn test_resolved_txmax_lifts_earlier_participant() {
        // tx 0 touches L first, tx 1 touches it later: tx 0's tx_max must
        // also be lifted, not just tx 1's.
        let mut counter = AccessCounter::new();
        counter.start().unwrap();
        let a = Address::new([6u8; 20]);

        {
            let t0 = AccessTracker::new(0, counter.channel());
            t0.track_balance_read(a).unwrap();
        }
        {
            let t1 = AccessTracker::new(1, counter.channel());
            t1.track_balance_read(a).unwrap();
        }

        counter.stop().unwrap();
        assert!(counter.is_conflict(0));
        assert!(counter.is_conflict(1));
    }

    proptest::proptest! {
        /// Repeating the same touch from the same transaction any number of
        /// times never changes the recorded occupancy.
        #[test]
        fn prop_repeated_touches_count_once(repeats in 1usize..20) {
            let mut counter = AccessCounter::new();
            counter.start().unwrap();
            let addr = Address::new([42u8; 20]);

            {
                let tracker = AccessTracker::new(0, counter.channel());
                for _ in 0..repeats {
                    tracker.track_balance_read(addr).unwrap();
                }
            }

            counter.stop().unwrap();
            proptest::prop_assert_eq!(counter.get_address_count(&addr), 1);
            proptest::prop_assert!(!counter.is_conflict(0));
        }
    }
}
