use crate::access::{AccessCounter, AccessTracker, CounterError};
use crate::engine::{EngineError, MicroOpEngine, SpeculativeEngine};
use crate::scheduler::{ConflictGraph, GroupAssigner, GroupResult};
use crate::types::{AccessResult, AnalysisMetrics, Batch};
use crate::worldstate::{MemoryWorldState, TrackingStateShim};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to decode batch: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("transaction {tx_idx} failed during speculative execution: {source}")]
    Execution { tx_idx: u32, source: EngineError },
    #[error("access counter consumer thread terminated before reporting results")]
    CounterClosedPrematurely(#[from] CounterError),
}

/// Full output of one conflict-analysis pass over a [`Batch`]. A transaction
/// whose speculative run fails is dropped from `per_tx_result` and recorded
/// in `errors` rather than aborting the whole pass; every other
/// transaction's footprint and the resulting schedule are still reported.
#[derive(Debug, Clone)]
pub struct BatchAnalysis {
    pub per_tx_result: AHashMap<u32, AccessResult>,
    pub schedule: GroupResult,
    pub errors: Vec<(u32, String)>,
    pub metrics: AnalysisMetrics,
}

/// `per_tx_result` is re-keyed into a `BTreeMap` purely for deterministic,
/// ascending-txIdx JSON output; `AHashMap` has no `Serialize` impl and its
/// iteration order is unspecified besides.
impl Serialize for BatchAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let per_tx_result: BTreeMap<u32, &AccessResult> =
            self.per_tx_result.iter().map(|(&k, v)| (k, v)).collect();

        let mut state = serializer.serialize_struct("BatchAnalysis", 4)?;
        state.serialize_field("perTxResult", &per_tx_result)?;
        state.serialize_field("schedule", &self.schedule)?;
        state.serialize_field("errors", &self.errors)?;
        state.serialize_field("metrics", &self.metrics)?;
        state.end()
    }
}

/// Orchestrates one conflict-analysis pass: speculative execution of every
/// transaction under tracking, aggregation into a conflict graph, and
/// DSATUR partitioning into parallel-safe groups. Parameterized over the
/// [`SpeculativeEngine`] so alternative interpreters can be substituted
/// without touching the pipeline itself.
pub struct ConflictAnalyzer<E> {
    engine: E,
}

impl<E> ConflictAnalyzer<E>
where
    E: SpeculativeEngine<TrackingStateShim<MemoryWorldState>> + Sync,
{
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn analyze(&self, batch: &Batch) -> Result<BatchAnalysis, AnalysisError> {
        tracing::info!(
            block_number = batch.block_number,
            num_transactions = batch.transactions.len(),
            "starting conflict analysis pass"
        );

        let mut counter = AccessCounter::new();
        counter.start()?;

        // Every transaction runs to completion or failure independently; a
        // failing transaction's tracker still reports whatever footprint it
        // accumulated before the failing op, so the counter sees a partial
        // but real picture of what that transaction touched.
        let outcomes: Vec<(u32, Result<AccessResult, EngineError>)> = batch
            .transactions
            .par_iter()
            .map(|tx| {
                let tracker = Arc::new(AccessTracker::new(tx.tx_idx, counter.channel()));
                let mut state = TrackingStateShim::new(MemoryWorldState::new(), tracker.clone());
                let result = self.engine.run(&mut state, tx);
                (tx.tx_idx, result.map(|_| tracker.to_access_result()))
            })
            .collect();

        counter.stop()?;

        let mut per_tx_result = AHashMap::default();
        let mut errors = Vec::new();
        for (tx_idx, outcome) in outcomes {
            match outcome {
                Ok(access_result) => {
                    per_tx_result.insert(tx_idx, access_result);
                }
                Err(source) => {
                    tracing::warn!(tx_idx, error = %source, "transaction failed during analysis");
                    errors.push((tx_idx, source.to_string()));
                }
            }
        }

        let pairs = counter.conflicting_pairs();
        let conflicting: AHashSet<u32> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        let independent_txs: Vec<u32> = batch
            .transactions
            .iter()
            .map(|t| t.tx_idx)
            .filter(|tx_idx| !conflicting.contains(tx_idx))
            .collect();

        let graph = ConflictGraph::build(&pairs);
        let schedule = GroupAssigner::assign(&graph, &independent_txs);

        let num_transactions = batch.transactions.len();
        let num_groups = schedule.num_groups as usize;
        let largest_group = schedule.groups.values().map(|g| g.len()).max().unwrap_or(0);
        let metrics = AnalysisMetrics {
            num_transactions,
            num_conflicting: conflicting.len(),
            num_groups,
            avg_group_size: if num_groups == 0 {
                0.0
            } else {
                num_transactions as f64 / num_groups as f64
            },
            largest_group,
            conflict_rate: if num_transactions == 0 {
                0.0
            } else {
                conflicting.len() as f64 / num_transactions as f64
            },
        };

        tracing::info!(
            num_conflicting = metrics.num_conflicting,
            num_groups = metrics.num_groups,
            num_errors = errors.len(),
            "conflict analysis pass complete"
        );

        Ok(BatchAnalysis {
            per_tx_result,
            schedule,
            errors,
            metrics,
        })
    }
}

/// Convenience entry point running the default [`MicroOpEngine`] over
/// `batch`.
pub fn analyze_batch(batch: &Batch) -> Result<BatchAnalysis, AnalysisError> {
    ConflictAnalyzer::new(MicroOpEngine::new()).analyze(batch)
}

/// Decode a batch from JSON and analyze it in one step, surfacing decode
/// failures through [`AnalysisError::Encoding`] rather than a bare
/// `serde_json::Error` at the CLI boundary.
pub fn analyze_batch_json(json: &str) -> Result<BatchAnalysis, AnalysisError> {
    let batch: Batch = serde_json::from_str(json)?;
    analyze_batch(&batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Address, BatchTransaction, MicroOp, StorageKey, U256};

    fn transfer(tx_idx: u32, from: Address, to: Address) -> BatchTransaction {
        BatchTransaction {
            tx_idx,
            from,
            to: Some(to),
            value: U256::from_u64(1),
            program: vec![
                MicroOp::SubBalance(from, U256::from_u64(1)),
                MicroOp::AddBalance(to, U256::from_u64(1)),
            ],
            access_list: vec![],
            nonce: 0,
        }
    }

    #[test]
    fn test_independent_transfers_land_in_group_zero() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let c = Address::new([3u8; 20]);
        let d = Address::new([4u8; 20]);

        let batch = Batch::new(1, vec![transfer(0, a, b), transfer(1, c, d)]);
        let analysis = analyze_batch(&batch).unwrap();

        assert_eq!(analysis.metrics.num_conflicting, 0);
        assert_eq!(analysis.metrics.num_groups, 1);
        assert_eq!(analysis.schedule.tx_to_group[&0], 0);
        assert_eq!(analysis.schedule.tx_to_group[&1], 0);
        assert!(analysis.errors.is_empty());
        assert_eq!(analysis.per_tx_result.len(), 2);
    }

    #[test]
    fn test_shared_account_forces_separate_groups() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let c = Address::new([3u8; 20]);

        let batch = Batch::new(1, vec![transfer(0, a, b), transfer(1, a, c)]);
        let analysis = analyze_batch(&batch).unwrap();

        assert_eq!(analysis.metrics.num_conflicting, 2);
        assert_ne!(
            analysis.schedule.tx_to_group[&0],
            analysis.schedule.tx_to_group[&1]
        );
    }

    #[test]
    fn test_distinct_storage_keys_do_not_conflict() {
        let a = Address::new([1u8; 20]);
        let k1 = StorageKey::new([1u8; 32]);
        let k2 = StorageKey::new([2u8; 32]);

        let batch = Batch::new(
            1,
            vec![
                BatchTransaction {
                    tx_idx: 0,
                    from: a,
                    to: None,
                    value: U256::ZERO,
                    program: vec![MicroOp::SStore(k1, U256::from_u64(1))],
                    access_list: vec![],
                    nonce: 0,
                },
                BatchTransaction {
                    tx_idx: 1,
                    from: a,
                    to: None,
                    value: U256::ZERO,
                    program: vec![MicroOp::SStore(k2, U256::from_u64(2))],
                    access_list: vec![],
                    nonce: 0,
                },
            ],
        );
        let analysis = analyze_batch(&batch).unwrap();
        assert_eq!(analysis.metrics.num_conflicting, 0);
    }

    #[test]
    fn test_failing_transaction_is_reported_not_fatal() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);

        let batch = Batch::new(
            1,
            vec![
                // Stack underflow: ADD with nothing pushed first.
                BatchTransaction {
                    tx_idx: 0,
                    from: a,
                    to: None,
                    value: U256::ZERO,
                    program: vec![MicroOp::Add(U256::from_u64(1))],
                    access_list: vec![],
                    nonce: 0,
                },
                transfer(1, a, b),
            ],
        );
        let analysis = analyze_batch(&batch).unwrap();
        assert_eq!(analysis.errors.len(), 1);
        assert_eq!(analysis.errors[0].0, 0);
        assert!(analysis.per_tx_result.contains_key(&1));
        assert!(!analysis.per_tx_result.contains_key(&0));
    }

    #[test]
    fn test_analyze_batch_json_round_trips() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let batch = Batch::new(1, vec![transfer(0, a, b)]);
        let json = serde_json::to_string(&batch).unwrap();
        let analysis = analyze_batch_json(&json).unwrap();
        assert_eq!(analysis.metrics.num_transactions, 1);
    }

    #[test]
    fn test_analyze_batch_json_reports_encoding_error() {
        let err = analyze_batch_json("not json").unwrap_err();
        assert!(matches!(err, AnalysisError::Encoding(_)));
    }

    #[test]
    fn test_batch_analysis_serializes_expected_shape() {
        let a = Address::new([1u8; 20]);
        let b = Address::new([2u8; 20]);
        let c = Address::new([3u8; 20]);
        let batch = Batch::new(1, vec![transfer(0, a, b), transfer(1, a, c)]);
        let analysis = analyze_batch(&batch).unwrap();

        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json["perTxResult"]["0"]["addresses"].is_array());
        assert!(json["schedule"]["groups"].is_array());
        assert!(json["schedule"]["txToGroup"].is_object());
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
