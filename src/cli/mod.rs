use crate::analyzer::analyze_batch;
use crate::generator::BatchGenerator;
use crate::metrics::MetricsCollector;
use crate::types::Batch;
use clap::{Parser, Subcommand};
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "preconflict")]
#[command(about = "Pre-execution conflict analysis for parallel transaction batches", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a batch with a controllable conflict ratio.
    Generate {
        #[arg(long, default_value = "1000")]
        n_tx: usize,

        #[arg(long, default_value = "200")]
        address_space: usize,

        #[arg(long, default_value = "10000")]
        key_space: usize,

        #[arg(long, default_value = "0.2")]
        conflict_ratio: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "batch.json")]
        output: String,
    },

    /// Run the conflict-analysis pipeline over a batch and report grouping.
    Analyze {
        #[arg(long)]
        input: Option<String>,

        #[arg(long)]
        preset: Option<String>,

        #[arg(long, default_value = "analysis.json")]
        output: String,
    },
}

pub fn handle_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Generate {
            n_tx,
            address_space,
            key_space,
            conflict_ratio,
            seed,
            output,
        } => handle_generate(n_tx, address_space, key_space, conflict_ratio, seed, &output),

        Commands::Analyze {
            input,
            preset,
            output,
        } => handle_analyze(input, preset, &output),
    }
}

fn handle_generate(
    n_tx: usize,
    address_space: usize,
    key_space: usize,
    conflict_ratio: f64,
    seed: u64,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let generator = BatchGenerator::new(n_tx, address_space, key_space, conflict_ratio, seed);
    let batch = generator.generate();

    let json = serde_json::to_string_pretty(&batch)?;
    std::fs::write(output, json)?;

    info!(
        "Generated {} transactions to {}",
        batch.transactions.len(),
        output
    );
    Ok(())
}

fn load_batch(input: Option<String>, preset: Option<String>) -> Result<Batch, Box<dyn std::error::Error>> {
    if let Some(input_path) = input {
        let json = std::fs::read_to_string(&input_path)?;
        Ok(serde_json::from_str(&json)?)
    } else if let Some(preset_name) = preset {
        let generator = match preset_name.as_str() {
            "small" => BatchGenerator::small(),
            "medium" => BatchGenerator::medium(),
            "large" => BatchGenerator::large(),
            _ => return Err(format!("Unknown preset: {}", preset_name).into()),
        };
        Ok(generator.generate())
    } else {
        Ok(BatchGenerator::medium().generate())
    }
}

fn handle_analyze(
    input: Option<String>,
    preset: Option<String>,
    output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let batch = load_batch(input, preset)?;

    let start = Instant::now();
    let analysis = analyze_batch(&batch).map_err(|e| {
        error!("analysis failed: {}", e);
        e
    })?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    info!(
        "Analyzed {} transactions in {:.2} ms: {} groups, {:.3}% conflict rate",
        batch.transactions.len(),
        elapsed_ms,
        analysis.metrics.num_groups,
        analysis.metrics.conflict_rate * 100.0
    );

    let collector = MetricsCollector::new();
    collector.print_metrics(&analysis.metrics);

    if !analysis.errors.is_empty() {
        for (tx_idx, cause) in &analysis.errors {
            error!("tx {} excluded from schedule: {}", tx_idx, cause);
        }
    }

    let json = serde_json::to_string_pretty(&analysis)?;
    std::fs::write(output, json)?;

    Ok(())
}
