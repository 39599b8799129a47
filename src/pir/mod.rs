//! Retrieval strategies benchmarked by the engine.
//!
//! A `Strategy` is prepared once against a `StaticDb` and then answers
//! single-key retrievals. The built-in kinds are a closed set
//! (`StrategyKind`) resolved by `new_strategy`; `registry` is the internal
//! extension point for anything else (test doubles, experimental schemes).
//!
//! Every built-in strategy talks to two in-process servers holding the same
//! database and counts the bytes it would have put on the wire.

pub mod db;
pub mod dpf;
pub mod mock;
pub mod non_private;
pub mod prg;
pub mod punc;
pub mod registry;
pub mod set_gen;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BenchError, BenchResult};

pub use db::{DatasetSpec, Row, StaticDb};
pub use dpf::DpfStrategy;
pub use mock::{CallLog, MockConfig, MockStrategy};
pub use non_private::NonPrivateStrategy;
pub use punc::PuncStrategy;
pub use registry::StrategyRegistry;

/// Security parameter in bits.
pub const SEC_PARAM: usize = 128;

/// Built-in retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum StrategyKind {
    /// Offline/online scheme with pseudo-random hint sets
    Punc,
    /// Two-server distributed point function
    Dpf,
    /// Direct lookup, no privacy
    NonPrivate,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [StrategyKind::Punc, StrategyKind::Dpf, StrategyKind::NonPrivate];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Punc => "Punc",
            StrategyKind::Dpf => "DPF",
            StrategyKind::NonPrivate => "NonPrivate",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase with `-` and `_` dropped, so `NonPrivate`, `non-private` and `non_private` agree.
pub(crate) fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for StrategyKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "punc" => Ok(StrategyKind::Punc),
            "dpf" => Ok(StrategyKind::Dpf),
            "nonprivate" => Ok(StrategyKind::NonPrivate),
            _ => Err(BenchError::Message(format!("unknown strategy: {s}"))),
        }
    }
}

/// Failure of a single retrieval. Recoverable: the driver counts it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrieveError {
    #[error("strategy not prepared")]
    NotPrepared,
    #[error("key {key} outside dataset of {rows} rows")]
    OutOfRange { key: usize, rows: usize },
    #[error("{0}")]
    Internal(String),
}

/// Bytes exchanged with the servers and the time the servers spent answering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Setup traffic (hint requests and responses)
    pub offline_bytes: u64,
    /// Per-query traffic
    pub online_bytes: u64,
    /// Server work during setup
    pub offline_server_time: Duration,
    /// Server work across all queries
    pub online_server_time: Duration,
}

impl Transcript {
    pub fn add_offline(&mut self, bytes: usize) {
        self.offline_bytes += bytes as u64;
    }

    pub fn add_online(&mut self, bytes: usize) {
        self.online_bytes += bytes as u64;
    }

    /// Run server-side setup work, charging its wall time to the offline phase.
    pub fn serve_offline<T>(&mut self, serve: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = serve();
        self.offline_server_time += start.elapsed();
        out
    }

    /// Run server-side query work, charging its wall time to the online phase.
    pub fn serve_online<T>(&mut self, serve: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = serve();
        self.online_server_time += start.elapsed();
        out
    }
}

/// A retrieval strategy under benchmark.
///
/// Implementations need not be safe for concurrent use; the driver owns
/// each instance exclusively and calls it from one thread.
pub trait Strategy: Send {
    /// Name reported in progress lines and records.
    fn name(&self) -> &str;

    /// Built-in kind, if any.
    fn kind(&self) -> Option<StrategyKind> {
        None
    }

    /// Reject dataset shapes the strategy cannot serve. Called before the
    /// dataset is materialised, so it must not depend on row contents.
    fn check_shape(&self, _rows: usize, _row_len: usize) -> BenchResult<()> {
        Ok(())
    }

    /// One-time setup against the dataset.
    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()>;

    /// Retrieve row `key`.
    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError>;

    fn transcript(&self) -> Transcript {
        Transcript::default()
    }

    /// Bytes of state the client keeps between queries.
    fn client_storage_bytes(&self) -> u64 {
        0
    }
}

/// Resolve a built-in kind to a fresh, unprepared strategy.
///
/// `seed` drives the client-side randomness so runs are reproducible.
pub fn new_strategy(kind: StrategyKind, seed: u64) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Punc => Box::new(PuncStrategy::new(seed)),
        StrategyKind::Dpf => Box::new(DpfStrategy::new(seed)),
        StrategyKind::NonPrivate => Box::new(NonPrivateStrategy::new()),
    }
}

/// Common shape checks: non-zero row length, between `min_rows` (at least 1) and `max_rows` rows.
pub fn check_limits(name: &str, rows: usize, row_len: usize, min_rows: usize, max_rows: usize) -> BenchResult<()> {
    if row_len == 0 {
        return Err(BenchError::Setup(format!("{name}: row length must be non-zero")));
    }
    if rows < min_rows.max(1) {
        return Err(BenchError::Setup(format!(
            "{name}: dataset has {rows} rows, needs at least {}",
            min_rows.max(1)
        )));
    }
    if rows > max_rows {
        return Err(BenchError::Setup(format!(
            "{name}: dataset has {rows} rows, supported domain is {max_rows}"
        )));
    }
    Ok(())
}
