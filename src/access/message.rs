use crate::types::Location;

/// Emitted once per observed touch of a state location by transaction
/// `tx_idx`. Duplicates within the same transaction are permitted; the
/// counter deduplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMessage {
    pub tx_idx: u32,
    pub item: Location,
}

impl AccessMessage {
    pub fn new(tx_idx: u32, item: Location) -> Self {
        Self { tx_idx, item }
    }
}
