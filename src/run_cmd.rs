//! Replay one trace file against one strategy.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::{BenchRecord, EnvironmentInfo};
use crate::engine::{BenchmarkDriver, BenchmarkOutcome, DriverOptions, RunStatus};
use crate::pir::StrategyKind;
use crate::sink::{Sinks, WriterSink};
use crate::storage::RecordStore;
use crate::{BenchError, BenchResult};

pub fn run(
    trace: PathBuf,
    strategy: StrategyKind,
    options: DriverOptions,
    jsonl: Option<PathBuf>,
    max_failures: usize,
) -> BenchResult<()> {
    let text = std::fs::read_to_string(&trace)
        .map_err(|e| BenchError::Message(format!("failed to read trace {}: {e}", trace.display())))?;
    let name = trace_name(&trace);
    info!(trace = %name, %strategy, "running benchmark");

    let primary = WriterSink::stdout();
    let diagnostic = WriterSink::stderr();
    let mut driver = BenchmarkDriver::new(options);
    let outcome = driver.run_text(&text, strategy, Sinks::new(&primary, &diagnostic));

    persist(&outcome, &name, &options, jsonl.as_deref())?;
    check_outcome(&outcome, max_failures)
}

/// Trace name recorded for a file: its stem.
pub(crate) fn trace_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string())
}

pub(crate) fn make_record(outcome: &BenchmarkOutcome, trace_name: &str, options: &DriverOptions) -> BenchRecord {
    let env = EnvironmentInfo::detect();
    if !env.is_release() {
        warn!("debug build: recorded timings are not comparable with release runs");
    }
    if let Some(shape) = outcome.dataset {
        if env.fits_in_memory(shape.bytes()) == Some(false) {
            warn!(bytes = shape.bytes(), "dataset exceeds physical memory, timings include paging");
        }
    }
    let mut record = outcome.to_record(trace_name, env, options.run_config());
    record.cli_args = std::env::args().collect();
    record
}

pub(crate) fn persist(
    outcome: &BenchmarkOutcome,
    trace_name: &str,
    options: &DriverOptions,
    jsonl: Option<&Path>,
) -> BenchResult<()> {
    if let Some(path) = jsonl {
        let record = make_record(outcome, trace_name, options);
        RecordStore::new(path).append(&record)?;
        info!(path = %path.display(), record_id = %record.record_id, "appended record");
    }
    Ok(())
}

/// Fatal outcomes and failure counts above `max_failures` become errors.
pub(crate) fn check_outcome(outcome: &BenchmarkOutcome, max_failures: usize) -> BenchResult<()> {
    if let RunStatus::Aborted(kind) = outcome.status {
        return Err(BenchError::Message(format!(
            "{}: {kind}: {}",
            outcome.strategy,
            outcome.error.as_deref().unwrap_or("aborted")
        )));
    }
    if !outcome.passes(max_failures) {
        return Err(BenchError::Message(format!(
            "{}: {} failures exceed the allowed {max_failures}",
            outcome.strategy,
            outcome.failure_count()
        )));
    }
    Ok(())
}
