use crate::analyzer::BatchAnalysis;
use crate::info;
use crate::types::AnalysisMetrics;

/// Thin reporting layer over a completed [`BatchAnalysis`]. Nothing in this
/// crate executes transactions for effect, so there is no speedup-vs-serial
/// figure to report, only the structural metrics a conflict-analysis pass
/// actually produces.
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    pub fn collect(&self, analysis: &BatchAnalysis) -> AnalysisMetrics {
        analysis.metrics.clone()
    }

    pub fn export_json(&self, metrics: &AnalysisMetrics, path: &str) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(metrics)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn print_metrics(&self, metrics: &AnalysisMetrics) {
        info!("\nAnalysis Summary:");
        info!("  Transactions: {}", metrics.num_transactions);
        info!("  Conflicting: {}", metrics.num_conflicting);
        info!("  Groups: {}", metrics.num_groups);
        info!("  Avg Group Size: {:.2}", metrics.avg_group_size);
        info!("  Largest Group: {}", metrics.largest_group);
        info!("  Conflict Rate: {:.3}%", metrics.conflict_rate * 100.0);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
