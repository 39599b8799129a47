//! Append-only JSON Lines log of benchmark records.
//!
//! One record per line. Records are checked on the way in and on the way
//! out, so a hand-edited or truncated log is reported with its line number
//! instead of turning into a bogus CSV row later.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::core::schema::{BenchRecord, SCHEMA_VERSION};
use crate::engine::RunStatus;
use crate::pir::{StrategyKind, normalize_name};
use crate::{BenchError, BenchResult};

/// Consistency rules every stored record obeys.
pub fn validate(record: &BenchRecord) -> Result<(), String> {
    if record.schema_version != SCHEMA_VERSION {
        return Err(format!(
            "schema version mismatch: record has v{}, expected v{SCHEMA_VERSION}",
            record.schema_version
        ));
    }
    if record.trace_name.is_empty() {
        return Err("empty trace name".into());
    }
    if record.strategy.name.is_empty() {
        return Err("empty strategy name".into());
    }
    let Some(status) = RunStatus::parse(&record.status) else {
        return Err(format!("unknown status `{}`", record.status));
    };
    if let Some(kind) = &record.strategy.kind {
        kind.parse::<StrategyKind>()
            .map_err(|_| format!("unknown strategy kind `{kind}`"))?;
    }
    if record.queries_processed > record.queries_total {
        return Err(format!(
            "{} queries processed out of {}",
            record.queries_processed, record.queries_total
        ));
    }
    if record.success && (status != RunStatus::Completed || record.failures() > 0) {
        return Err(format!(
            "marked successful with status `{}` and {} failures",
            record.status,
            record.failures()
        ));
    }
    Ok(())
}

/// Which records to read back. The default selects everything.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub trace: Option<String>,
    /// Matched like CLI strategy names: case, `-` and `_` are ignored
    pub strategy: Option<String>,
    pub successful_only: bool,
}

impl RecordFilter {
    pub fn trace(mut self, name: impl Into<String>) -> Self {
        self.trace = Some(name.into());
        self
    }

    pub fn strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    pub fn successful_only(mut self) -> Self {
        self.successful_only = true;
        self
    }

    pub fn matches(&self, record: &BenchRecord) -> bool {
        self.trace.as_ref().is_none_or(|t| *t == record.trace_name)
            && self
                .strategy
                .as_ref()
                .is_none_or(|s| normalize_name(s) == normalize_name(&record.strategy.name))
            && (!self.successful_only || record.success)
    }
}

/// A record log on disk.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// The file is created on first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        RecordStore { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate `record` and append it as one line.
    pub fn append(&self, record: &BenchRecord) -> BenchResult<()> {
        validate(record).map_err(|reason| {
            BenchError::Message(format!("refusing to store record {}: {reason}", record.record_id))
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error("create directory for", e))?;
            }
        }
        let line = serde_json::to_string(record)
            .map_err(|e| BenchError::Message(format!("failed to serialize record: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error("open", e))?;
        writeln!(file, "{line}").map_err(|e| self.io_error("write", e))
    }

    pub fn read_all(&self) -> BenchResult<Vec<BenchRecord>> {
        self.read(&RecordFilter::default())
    }

    /// Records matching `filter`, in file order. Any unparsable or
    /// inconsistent line fails the whole read.
    pub fn read(&self, filter: &RecordFilter) -> BenchResult<Vec<BenchRecord>> {
        if !self.path.exists() {
            return Err(BenchError::Message(format!("file not found: {}", self.path.display())));
        }
        let file = File::open(&self.path).map_err(|e| self.io_error("open", e))?;

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| self.io_error(&format!("read line {line_no} of"), e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: BenchRecord = serde_json::from_str(&line)
                .map_err(|e| BenchError::Message(format!("failed to parse line {line_no}: {e}")))?;
            validate(&record).map_err(|reason| BenchError::Message(format!("line {line_no}: {reason}")))?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Non-empty lines in the log; zero if it does not exist yet.
    pub fn count(&self) -> BenchResult<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        let file = File::open(&self.path).map_err(|e| self.io_error("open", e))?;
        Ok(BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count())
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> BenchError {
        BenchError::Message(format!("failed to {action} {}: {e}", self.path.display()))
    }
}
