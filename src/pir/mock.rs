//! Mock strategy for testing.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::engine::CancellationToken;
use crate::{BenchError, BenchResult};

use super::{RetrieveError, Row, StaticDb, Strategy, Transcript, check_limits};

#[derive(Debug, Default)]
struct Calls {
    prepares: usize,
    keys: Vec<usize>,
}

/// Calls made on a mock, in order. Cloned handles share the log.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Calls>>);

impl CallLog {
    fn with<T>(&self, f: impl FnOnce(&mut Calls) -> T) -> T {
        let mut calls = match self.0.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *calls)
    }

    /// Keys passed to `retrieve`.
    pub fn keys(&self) -> Vec<usize> {
        self.with(|c| c.keys.clone())
    }

    pub fn len(&self) -> usize {
        self.with(|c| c.keys.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `prepare` calls, successful or not.
    pub fn prepares(&self) -> usize {
        self.with(|c| c.prepares)
    }

    fn push(&self, key: usize) {
        self.with(|c| c.keys.push(key))
    }
}

/// Configuration for mock strategy responses.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Name to report
    pub name: String,
    /// Whether prepare should fail
    pub prepare_fails: bool,
    /// Keys for which retrieve returns an internal error
    pub fail_keys: BTreeSet<usize>,
    /// Keys for which retrieve returns a wrong row
    pub corrupt_keys: BTreeSet<usize>,
    /// Cancel the token once this many retrievals have completed
    pub cancel_after: Option<(usize, CancellationToken)>,
    /// Reject datasets with more rows than this in `check_shape`
    pub max_rows: Option<usize>,
}

impl MockConfig {
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig { name: name.into(), ..Default::default() }
    }

    pub fn prepare_fails(mut self) -> Self {
        self.prepare_fails = true;
        self
    }

    pub fn fail_on(mut self, key: usize) -> Self {
        self.fail_keys.insert(key);
        self
    }

    pub fn corrupt_on(mut self, key: usize) -> Self {
        self.corrupt_keys.insert(key);
        self
    }

    pub fn max_rows(mut self, rows: usize) -> Self {
        self.max_rows = Some(rows);
        self
    }

    /// Trip `token` after `count` retrievals, as if the user pressed Ctrl-C.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }
}

/// Strategy that reads rows straight from the dataset and records every call.
pub struct MockStrategy {
    config: MockConfig,
    db: Option<Arc<StaticDb>>,
    calls: CallLog,
    transcript: Transcript,
}

impl MockStrategy {
    pub fn new(config: MockConfig) -> Self {
        MockStrategy {
            config,
            db: None,
            calls: CallLog::default(),
            transcript: Transcript::default(),
        }
    }

    pub fn default_mock() -> Self {
        Self::new(MockConfig::new("mock"))
    }

    /// Handle on the call log that stays valid after the strategy is boxed.
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }
}

impl Strategy for MockStrategy {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn check_shape(&self, rows: usize, row_len: usize) -> BenchResult<()> {
        match self.config.max_rows {
            Some(max) => check_limits(self.name(), rows, row_len, 0, max),
            None => Ok(()),
        }
    }

    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()> {
        self.calls.with(|c| c.prepares += 1);
        self.check_shape(db.num_rows(), db.row_len())?;
        if self.config.prepare_fails {
            return Err(BenchError::Setup("mock prepare failed".into()));
        }
        self.db = Some(db);
        Ok(())
    }

    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError> {
        self.calls.push(key);
        let result = self.lookup(key);
        if let Some((count, token)) = &self.config.cancel_after {
            if self.calls.len() >= *count {
                token.cancel();
            }
        }
        result
    }

    fn transcript(&self) -> Transcript {
        self.transcript
    }
}

impl MockStrategy {
    fn lookup(&mut self, key: usize) -> Result<Row, RetrieveError> {
        let db = self.db.as_ref().ok_or(RetrieveError::NotPrepared)?;
        if self.config.fail_keys.contains(&key) {
            return Err(RetrieveError::Internal(format!("mock failure for key {key}")));
        }
        let mut row = db
            .row(key)
            .ok_or(RetrieveError::OutOfRange { key, rows: db.num_rows() })?
            .to_vec();
        if self.config.corrupt_keys.contains(&key) {
            if let Some(b) = row.first_mut() {
                *b ^= 0xFF;
            }
        }
        self.transcript.add_online(row.len());
        Ok(row)
    }
}
