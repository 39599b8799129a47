#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use pir_bench::StrategyKind;
use pir_bench::engine::DriverOptions;
use pir_bench::storage::RecordFilter;
use pir_bench::{baseline_cmd, export_cmd, gen_trace_cmd, run_cmd, suite_cmd};

#[derive(Parser, Debug)]
#[command(name = "pir-bench")]
#[command(about = "Trace-driven benchmarks for private information retrieval", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set PIR_BENCH_LOG)
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a trace against one strategy
    Run {
        /// Path to the trace file
        #[arg(long)]
        trace: PathBuf,
        /// Strategy to benchmark
        #[arg(long, value_enum)]
        strategy: StrategyKind,
        /// Emit a progress line every N queries
        #[arg(long, default_value_t = 100)]
        progress_every: usize,
        /// Seed for strategy-side randomness
        #[arg(long, default_value_t = 17)]
        seed: u64,
        /// Per-query error lines before further errors are suppressed
        #[arg(long, default_value_t = 20)]
        max_diagnostic_errors: usize,
        /// Append a BenchRecord to this JSONL file
        #[arg(long)]
        jsonl: Option<PathBuf>,
        /// Failures tolerated before exiting non-zero
        #[arg(long, default_value_t = 0)]
        max_failures: usize,
    },

    /// Run the fixed reference workload
    Baseline {
        /// Append a BenchRecord to this JSONL file
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },

    /// Run every trace x strategy pair listed in a TOML config
    Suite {
        /// Path to the suite config (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Append one BenchRecord per run to this JSONL file
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },

    /// Write a synthetic trace
    GenTrace {
        /// Dataset rows
        #[arg(long)]
        rows: usize,
        /// Bytes per row
        #[arg(long)]
        row_len: usize,
        /// Number of queries
        #[arg(long)]
        queries: usize,
        /// Dataset seed
        #[arg(long, default_value_t = 17)]
        seed: u64,
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Export JSONL records to CSV
    Export {
        /// Input JSONL file
        #[arg(long)]
        jsonl: PathBuf,
        /// Output CSV file
        #[arg(long)]
        csv: PathBuf,
        /// Only export records of this trace
        #[arg(long)]
        trace: Option<String>,
        /// Only export records of this strategy
        #[arg(long)]
        strategy: Option<String>,
        /// Skip aborted runs and runs with failures
        #[arg(long)]
        successful_only: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("PIR_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "pir_bench=debug".to_string() } else { "pir_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { trace, strategy, progress_every, seed, max_diagnostic_errors, jsonl, max_failures } => {
            let options = DriverOptions { progress_every, max_diagnostic_errors, seed };
            run_cmd::run(trace, strategy, options, jsonl, max_failures)
        }
        Commands::Baseline { jsonl } => baseline_cmd::run(jsonl),
        Commands::Suite { config, jsonl } => suite_cmd::run(config, jsonl),
        Commands::GenTrace { rows, row_len, queries, seed, out } => {
            gen_trace_cmd::run(rows, row_len, queries, seed, out)
        }
        Commands::Export { jsonl, csv, trace, strategy, successful_only } => {
            let filter = RecordFilter { trace, strategy, successful_only };
            export_cmd::run(jsonl, csv, filter)
        }
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
