pub mod counter;
pub mod message;
pub mod tracker;

pub use counter::{AccessCounter, CounterError};
pub use message::AccessMessage;
pub use tracker::{AccessTracker, TrackerError};
