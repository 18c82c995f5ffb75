pub mod access;
pub mod analyzer;
pub mod cli;
pub mod engine;
pub mod generator;
pub mod log;
pub mod metrics;
pub mod scheduler;
pub mod types;
pub mod worldstate;

pub use access::{AccessCounter, AccessTracker, CounterError, TrackerError};
pub use analyzer::{analyze_batch, analyze_batch_json, AnalysisError, BatchAnalysis, ConflictAnalyzer};
pub use engine::{EngineError, MicroOpEngine, SpeculativeEngine};
pub use generator::BatchGenerator;
pub use metrics::MetricsCollector;
pub use scheduler::{ConflictGraph, GroupAssigner, GroupResult};
pub use types::{
    Address, AnalysisMetrics, Batch, BatchTransaction, Location, MicroOp, StorageKey, U256,
};
pub use worldstate::{MemoryWorldState, TrackingStateShim, WorldState};
