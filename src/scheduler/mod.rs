pub mod graph;
pub mod grouping;
pub mod heap;

pub use graph::ConflictGraph;
pub use grouping::{GroupAssigner, GroupResult};
pub use heap::IndexedPriorityQueue;
