use std::path::PathBuf;

use tracing::info;

use crate::BenchResult;
use crate::engine::{BenchmarkDriver, DriverOptions, baseline_outcome};
use crate::run_cmd::{check_outcome, persist};
use crate::sink::{Sinks, WriterSink};

pub const BASELINE_TRACE_NAME: &str = "baseline";

pub fn run(jsonl: Option<PathBuf>) -> BenchResult<()> {
    info!("running reference baseline");
    let options = DriverOptions::default();
    let primary = WriterSink::stdout();
    let diagnostic = WriterSink::stderr();
    let mut driver = BenchmarkDriver::new(options);
    let outcome = baseline_outcome(&mut driver, Sinks::new(&primary, &diagnostic))?;

    persist(&outcome, BASELINE_TRACE_NAME, &options, jsonl.as_deref())?;
    check_outcome(&outcome, 0)
}
