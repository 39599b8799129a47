//! BenchRecord schema v1 - canonical schema for persisted benchmark outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env::EnvironmentInfo;

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Latency distribution of per-query retrievals, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStat {
    pub iterations: u32,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
    /// Tail latency; a single slow hint refresh shows up here first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p99_ms: Option<f64>,
}

impl TimingStat {
    pub fn from_durations(samples: &[Duration]) -> Self {
        let mut ms: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        ms.sort_by(f64::total_cmp);
        Self::from_sorted(&ms)
    }

    fn from_sorted(sorted: &[f64]) -> Self {
        let (Some(&min_ms), Some(&max_ms)) = (sorted.first(), sorted.last()) else {
            return TimingStat::default();
        };
        let n = sorted.len() as f64;
        let mean_ms = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|x| (x - mean_ms).powi(2)).sum::<f64>() / n;

        TimingStat {
            iterations: sorted.len() as u32,
            mean_ms,
            min_ms,
            max_ms,
            median_ms: Some(median(sorted)),
            stddev_ms: Some(variance.sqrt()),
            p95_ms: Some(nearest_rank(sorted, 0.95)),
            p99_ms: Some(nearest_rank(sorted, 0.99)),
        }
    }
}

/// Even lengths take the midpoint of the two central samples.
fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile: the `ceil(q * n)`-th smallest sample.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Strategy that produced the record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub name: String,
    /// Built-in kind, absent for registry-provided or test strategies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Shape of the dataset the strategy was prepared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetShape {
    pub rows: usize,
    pub row_len: usize,
}

impl DatasetShape {
    pub fn bytes(&self) -> u64 {
        (self.rows as u64).saturating_mul(self.row_len as u64)
    }
}

/// Run configuration for benchmarks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub progress_every: usize,
    pub max_diagnostic_errors: usize,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            progress_every: 100,
            max_diagnostic_errors: 20,
            seed: 17,
        }
    }
}

/// Canonical benchmark record - the unified output schema for every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Unique identifier for this record
    pub record_id: String,

    /// ISO 8601 timestamp
    pub timestamp: String,

    /// Trace name (file stem, suite entry name, or "baseline")
    pub trace_name: String,

    pub env: EnvironmentInfo,

    pub strategy: StrategyInfo,

    pub config: RunConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetShape>,

    /// "completed", or the name of the fatal failure kind
    pub status: String,

    pub success: bool,

    // --- Timing ---
    pub setup_ms: f64,

    pub total_ms: f64,

    /// Per-query retrieve timing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieve_stats: Option<TimingStat>,

    // --- Counters ---
    pub queries_total: usize,

    pub queries_processed: usize,

    pub mismatches: usize,

    pub internal_errors: usize,

    /// Server work answering setup requests
    #[serde(default)]
    pub offline_server_ms: f64,

    /// Server work answering queries
    #[serde(default)]
    pub online_server_ms: f64,

    /// Query time spent on the client (retrieve time minus server work)
    #[serde(default)]
    pub client_ms: f64,

    // --- Communication and state ---
    pub offline_bytes: u64,

    pub online_bytes: u64,

    /// Client-side state kept between queries
    #[serde(default)]
    pub client_storage_bytes: u64,

    /// Command line arguments used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cli_args: Vec<String>,
}

impl BenchRecord {
    /// Create a new BenchRecord with required fields and zeroed metrics
    pub fn new(
        trace_name: String,
        env: EnvironmentInfo,
        strategy: StrategyInfo,
        config: RunConfig,
    ) -> Self {
        let timestamp = crate::now_string();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let stamp: String = timestamp
            .chars()
            .take(19)
            .filter(|c| !matches!(c, ':' | '-' | 'T'))
            .collect();
        let record_id = format!("{:x}-{}", nanos, stamp);

        BenchRecord {
            schema_version: SCHEMA_VERSION,
            record_id,
            timestamp,
            trace_name,
            env,
            strategy,
            config,
            dataset: None,
            status: "completed".to_string(),
            success: false,
            setup_ms: 0.0,
            total_ms: 0.0,
            retrieve_stats: None,
            queries_total: 0,
            queries_processed: 0,
            mismatches: 0,
            internal_errors: 0,
            offline_server_ms: 0.0,
            online_server_ms: 0.0,
            client_ms: 0.0,
            offline_bytes: 0,
            online_bytes: 0,
            client_storage_bytes: 0,
            cli_args: Vec::new(),
        }
    }

    pub fn failures(&self) -> usize {
        self.mismatches + self.internal_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|v| Duration::from_millis(*v)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_timing_stat_from_durations() {
        let stat = TimingStat::from_durations(&ms(&[100, 110, 105, 115, 120]));

        assert_eq!(stat.iterations, 5);
        assert!(close(stat.mean_ms, 110.0));
        assert!(close(stat.min_ms, 100.0));
        assert!(close(stat.max_ms, 120.0));
        assert!(close(stat.median_ms.unwrap(), 110.0));

        // sqrt((100 + 0 + 25 + 25 + 100) / 5) = sqrt(50)
        assert!((stat.stddev_ms.unwrap() - 7.071).abs() < 0.01);

        // ceil(0.95 * 5) = 5th smallest
        assert!(close(stat.p95_ms.unwrap(), 120.0));
        assert!(close(stat.p99_ms.unwrap(), 120.0));
    }

    #[test]
    fn test_timing_stat_tail_and_even_median() {
        let mut samples: Vec<u64> = (1..=100).collect();
        samples.reverse();
        let stat = TimingStat::from_durations(&ms(&samples));
        assert!(close(stat.median_ms.unwrap(), 50.5));
        assert!(close(stat.p95_ms.unwrap(), 95.0));
        assert!(close(stat.p99_ms.unwrap(), 99.0));
        assert!(close(stat.min_ms, 1.0));
    }

    #[test]
    fn test_timing_stat_empty() {
        let stat = TimingStat::from_durations(&[]);

        assert_eq!(stat, TimingStat::default());
        assert!(stat.median_ms.is_none());
        assert!(stat.p99_ms.is_none());
    }

    #[test]
    fn test_record_id_and_defaults() {
        let record = BenchRecord::new(
            "trace".to_string(),
            EnvironmentInfo::default(),
            StrategyInfo { name: "NonPrivate".to_string(), kind: None },
            RunConfig::default(),
        );
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(!record.record_id.is_empty());
        assert_eq!(record.failures(), 0);
        assert_eq!(record.status, "completed");
    }
}
