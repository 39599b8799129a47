//! Reference baseline: a fixed synthetic workload through a direct lookup.
//!
//! It measures the driver and machine overhead that every strategy pays, so
//! strategy numbers can be read relative to it. No trace is involved.

use std::sync::Arc;

use crate::BenchResult;
use crate::pir::{DatasetSpec, RetrieveError, Row, StaticDb, Strategy};
use crate::sink::{Sink, Sinks};
use crate::trace::synthetic_queries;

use super::driver::{BenchmarkDriver, DriverOptions};
use super::outcome::BenchmarkOutcome;

pub const BASELINE_ROWS: usize = 1024;
pub const BASELINE_ROW_LEN: usize = 32;
pub const BASELINE_QUERIES: usize = 1000;
pub const BASELINE_SEED: u64 = 0x5EED;

pub const BASELINE_DATASET: DatasetSpec = DatasetSpec {
    rows: BASELINE_ROWS,
    row_len: BASELINE_ROW_LEN,
    seed: BASELINE_SEED,
};

/// In-memory lookup with no transcript.
#[derive(Default)]
struct DirectLookup {
    db: Option<Arc<StaticDb>>,
}

impl Strategy for DirectLookup {
    fn name(&self) -> &str {
        "Reference"
    }

    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()> {
        self.db = Some(db);
        Ok(())
    }

    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError> {
        let db = self.db.as_ref().ok_or(RetrieveError::NotPrepared)?;
        db.row(key)
            .map(<[u8]>::to_vec)
            .ok_or(RetrieveError::OutOfRange { key, rows: db.num_rows() })
    }
}

/// Run the baseline on `driver`. The driver's options control progress cadence only.
pub fn baseline_outcome(driver: &mut BenchmarkDriver, sinks: Sinks<'_>) -> BenchResult<BenchmarkOutcome> {
    let db = StaticDb::synthetic(&BASELINE_DATASET)?;
    let queries = synthetic_queries(&db, BASELINE_QUERIES, BASELINE_SEED);
    Ok(driver.run_queries(Arc::new(db), &queries, Box::new(DirectLookup::default()), sinks))
}

/// Run the baseline with default options. True on a clean run.
pub fn run_baseline(primary: &dyn Sink, diagnostic: &dyn Sink) -> bool {
    let mut driver = BenchmarkDriver::new(DriverOptions::default());
    match baseline_outcome(&mut driver, Sinks::new(primary, diagnostic)) {
        Ok(outcome) => outcome.success(),
        Err(e) => {
            diagnostic.emit(&format!("SetupError: {e}"));
            false
        }
    }
}
