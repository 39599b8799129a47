pub mod baseline_cmd;
pub mod export_cmd;
pub mod gen_trace_cmd;
pub mod run_cmd;
pub mod suite_cmd;

pub mod bench;
pub mod core;
pub mod engine;
pub mod pir;
pub mod sink;
pub mod storage;
pub mod trace;

use thiserror::Error;

pub use engine::{BenchmarkDriver, BenchmarkOutcome, CancellationToken, run_baseline, run_benchmark};
pub use pir::StrategyKind;
pub use sink::{Channel, Sink, Sinks};

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{0}")]
    Message(String),
    #[error("malformed trace at line {line}, field `{field}`: {reason}")]
    MalformedTrace {
        line: u64,
        field: &'static str,
        reason: String,
    },
    #[error("setup failed: {0}")]
    Setup(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type BenchResult<T> = Result<T, BenchError>;

impl BenchError {
    pub(crate) fn malformed(line: u64, field: &'static str, reason: impl Into<String>) -> Self {
        BenchError::MalformedTrace { line, field, reason: reason.into() }
    }
}

pub(crate) fn now_string() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".to_string())
}
