use std::path::PathBuf;

use tracing::info;

use crate::BenchResult;
use crate::storage::{CsvExporter, RecordFilter, RecordStore};

/// Export the records selected by `filter` to CSV.
pub fn run(jsonl: PathBuf, csv: PathBuf, filter: RecordFilter) -> BenchResult<()> {
    let records = RecordStore::new(&jsonl).read(&filter)?;
    CsvExporter::new().export(&records, &csv)?;
    info!(records = records.len(), path = %csv.display(), "exported records");
    Ok(())
}
