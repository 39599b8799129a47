//! Result of one benchmark invocation.

use std::fmt;
use std::time::Duration;

use crate::core::{BenchRecord, DatasetShape, EnvironmentInfo, RunConfig, StrategyInfo, TimingStat};
use crate::pir::{StrategyKind, Transcript};

/// Error taxonomy of a run. The first two and `Cancelled` abort it; the rest are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    MalformedTrace,
    SetupError,
    RetrievalMismatch,
    StrategyInternalError,
    Cancelled,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::MalformedTrace,
        FailureKind::SetupError,
        FailureKind::RetrievalMismatch,
        FailureKind::StrategyInternalError,
        FailureKind::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::MalformedTrace => "MalformedTrace",
            FailureKind::SetupError => "SetupError",
            FailureKind::RetrievalMismatch => "RetrievalMismatch",
            FailureKind::StrategyInternalError => "StrategyInternalError",
            FailureKind::Cancelled => "Cancelled",
        }
    }

    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            FailureKind::MalformedTrace | FailureKind::SetupError | FailureKind::Cancelled
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Preparing,
    Running,
    Reporting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every query was attempted; individual failures are in the counters
    Completed,
    Aborted(FailureKind),
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted(kind) => kind.as_str(),
        }
    }

    /// Inverse of `as_str`. Only fatal kinds can abort a run.
    pub fn parse(s: &str) -> Option<RunStatus> {
        if s == "completed" {
            return Some(RunStatus::Completed);
        }
        FailureKind::ALL
            .into_iter()
            .find(|k| k.is_fatal() && k.as_str() == s)
            .map(RunStatus::Aborted)
    }
}

#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub strategy: String,
    pub kind: Option<StrategyKind>,
    pub status: RunStatus,
    pub final_state: DriverState,
    pub dataset: Option<DatasetShape>,
    pub setup_elapsed: Duration,
    pub run_elapsed: Duration,
    pub total_queries: usize,
    pub queries_processed: usize,
    pub mismatches: usize,
    pub internal_errors: usize,
    /// Wall time of each `retrieve`, in trace order
    pub retrieve_times: Vec<Duration>,
    pub transcript: Transcript,
    /// Client state after the last query
    pub client_storage_bytes: u64,
    /// Message of the fatal error, if any
    pub error: Option<String>,
}

impl BenchmarkOutcome {
    pub(crate) fn new(strategy: &str, kind: Option<StrategyKind>, total_queries: usize) -> Self {
        BenchmarkOutcome {
            strategy: strategy.to_string(),
            kind,
            status: RunStatus::Completed,
            final_state: DriverState::Idle,
            dataset: None,
            setup_elapsed: Duration::ZERO,
            run_elapsed: Duration::ZERO,
            total_queries,
            queries_processed: 0,
            mismatches: 0,
            internal_errors: 0,
            retrieve_times: Vec::new(),
            transcript: Transcript::default(),
            client_storage_bytes: 0,
            error: None,
        }
    }

    pub fn failure_count(&self) -> usize {
        self.mismatches + self.internal_errors
    }

    pub fn successes(&self) -> usize {
        self.queries_processed.saturating_sub(self.failure_count())
    }

    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed && self.failure_count() == 0
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Aborted(FailureKind::Cancelled)
    }

    /// Completed with at most `max_failures` counted failures.
    pub fn passes(&self, max_failures: usize) -> bool {
        self.status == RunStatus::Completed && self.failure_count() <= max_failures
    }

    /// Server work across all queries.
    pub fn server_time(&self) -> Duration {
        self.transcript.online_server_time
    }

    /// Query time spent on the client: total retrieve time minus server work.
    pub fn client_time(&self) -> Duration {
        let total: Duration = self.retrieve_times.iter().sum();
        total.saturating_sub(self.server_time())
    }

    pub fn retrieve_stats(&self) -> TimingStat {
        TimingStat::from_durations(&self.retrieve_times)
    }

    pub fn to_record(&self, trace_name: &str, env: EnvironmentInfo, config: RunConfig) -> BenchRecord {
        let strategy = StrategyInfo {
            name: self.strategy.clone(),
            kind: self.kind.map(|k| k.as_str().to_string()),
        };
        let mut record = BenchRecord::new(trace_name.to_string(), env, strategy, config);
        record.dataset = self.dataset;
        record.status = self.status.as_str().to_string();
        record.success = self.success();
        record.setup_ms = self.setup_elapsed.as_secs_f64() * 1000.0;
        record.total_ms = (self.setup_elapsed + self.run_elapsed).as_secs_f64() * 1000.0;
        if !self.retrieve_times.is_empty() {
            record.retrieve_stats = Some(self.retrieve_stats());
        }
        record.queries_total = self.total_queries;
        record.queries_processed = self.queries_processed;
        record.mismatches = self.mismatches;
        record.internal_errors = self.internal_errors;
        record.offline_server_ms = self.transcript.offline_server_time.as_secs_f64() * 1000.0;
        record.online_server_ms = self.server_time().as_secs_f64() * 1000.0;
        record.client_ms = self.client_time().as_secs_f64() * 1000.0;
        record.offline_bytes = self.transcript.offline_bytes;
        record.online_bytes = self.transcript.online_bytes;
        record.client_storage_bytes = self.client_storage_bytes;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(FailureKind::MalformedTrace.is_fatal());
        assert!(FailureKind::SetupError.is_fatal());
        assert!(FailureKind::Cancelled.is_fatal());
        assert!(!FailureKind::RetrievalMismatch.is_fatal());
        assert!(!FailureKind::StrategyInternalError.is_fatal());
    }

    #[test]
    fn test_status_names_parse_back() {
        assert_eq!(RunStatus::parse("completed"), Some(RunStatus::Completed));
        for kind in FailureKind::ALL.into_iter().filter(|k| k.is_fatal()) {
            assert_eq!(RunStatus::parse(kind.as_str()), Some(RunStatus::Aborted(kind)));
        }
        assert_eq!(RunStatus::parse("RetrievalMismatch"), None);
        assert_eq!(RunStatus::parse("done"), None);
    }

    #[test]
    fn test_counts_and_success() {
        let mut outcome = BenchmarkOutcome::new("mock", None, 10);
        outcome.queries_processed = 10;
        assert!(outcome.success());

        outcome.mismatches = 1;
        outcome.internal_errors = 2;
        assert_eq!(outcome.failure_count(), 3);
        assert_eq!(outcome.successes(), 7);
        assert!(!outcome.success());
        assert!(outcome.passes(3));
        assert!(!outcome.passes(2));

        outcome.status = RunStatus::Aborted(FailureKind::Cancelled);
        assert!(outcome.is_cancelled());
        assert!(!outcome.passes(100));
    }

    #[test]
    fn test_to_record() {
        let mut outcome = BenchmarkOutcome::new("DPF", Some(StrategyKind::Dpf), 2);
        outcome.queries_processed = 2;
        outcome.retrieve_times = vec![Duration::from_millis(1), Duration::from_millis(3)];
        outcome.setup_elapsed = Duration::from_millis(10);
        outcome.transcript.online_bytes = 64;
        outcome.transcript.online_server_time = Duration::from_millis(1);
        outcome.client_storage_bytes = 512;
        outcome.dataset = Some(DatasetShape { rows: 8, row_len: 4 });

        let record = outcome.to_record("t", EnvironmentInfo::default(), RunConfig::default());
        assert!((record.online_server_ms - 1.0).abs() < 1e-9);
        assert!((record.client_ms - 3.0).abs() < 1e-9);
        assert_eq!(record.client_storage_bytes, 512);
        assert_eq!(record.strategy.kind.as_deref(), Some("DPF"));
        assert_eq!(record.status, "completed");
        assert!(record.success);
        assert!((record.setup_ms - 10.0).abs() < 1e-9);
        assert_eq!(record.retrieve_stats.unwrap().iterations, 2);
        assert_eq!(record.online_bytes, 64);
        assert_eq!(record.dataset, Some(DatasetShape { rows: 8, row_len: 4 }));
    }

    #[test]
    fn test_aborted_record_status() {
        let mut outcome = BenchmarkOutcome::new("Punc", Some(StrategyKind::Punc), 5);
        outcome.status = RunStatus::Aborted(FailureKind::SetupError);
        let record = outcome.to_record("t", EnvironmentInfo::default(), RunConfig::default());
        assert_eq!(record.status, "SetupError");
        assert!(!record.success);
        assert!(record.retrieve_stats.is_none());
    }

    #[test]
    fn test_client_time_never_negative() {
        let mut outcome = BenchmarkOutcome::new("mock", None, 1);
        outcome.retrieve_times = vec![Duration::from_micros(5)];
        outcome.transcript.online_server_time = Duration::from_micros(9);
        assert_eq!(outcome.client_time(), Duration::ZERO);
    }
}
