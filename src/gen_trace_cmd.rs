use std::path::PathBuf;

use tracing::info;

use crate::pir::DatasetSpec;
use crate::trace::Trace;
use crate::{BenchError, BenchResult};

/// Write a synthetic trace of `queries` uniformly random keys.
pub fn run(rows: usize, row_len: usize, queries: usize, seed: u64, out: PathBuf) -> BenchResult<()> {
    if rows == 0 || row_len == 0 {
        return Err(BenchError::Message("rows and row length must be non-zero".into()));
    }
    let spec = DatasetSpec { rows, row_len, seed };
    let trace = Trace::synthetic(spec, queries, seed.wrapping_add(1))?;

    if let Some(dir) = out.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
        }
    }
    std::fs::write(&out, trace.render())
        .map_err(|e| BenchError::Message(format!("failed to write {}: {e}", out.display())))?;
    info!(path = %out.display(), rows, row_len, queries, "wrote trace");
    Ok(())
}
