//! Behavioural properties of the benchmark driver, checked through the
//! public API with recording test doubles and in-memory sinks.

use pir_bench::engine::{BenchmarkDriver, DriverOptions, DriverState, FailureKind, RunStatus};
use pir_bench::pir::{DatasetSpec, MockConfig, MockStrategy, StaticDb};
use pir_bench::sink::{MemorySink, Sinks};
use pir_bench::trace::Trace;
use pir_bench::{CancellationToken, StrategyKind, run_baseline, run_benchmark};

fn spec() -> DatasetSpec {
    DatasetSpec { rows: 32, row_len: 8, seed: 5 }
}

/// Trace text for `keys` over `spec()`, with correct expected rows.
fn trace_for(keys: &[usize]) -> String {
    let db = StaticDb::synthetic(&spec()).unwrap();
    let mut text = format!("version,1\ndataset,{},{},{}\n", spec().rows, spec().row_len, spec().seed);
    for &k in keys {
        text.push_str(&format!("query,{k},{}\n", hex::encode(db.row(k).unwrap())));
    }
    text
}

#[test]
fn test_queries_run_in_trace_order() {
    let keys = [7, 3, 31, 0, 3, 12];
    let mock = MockStrategy::default_mock();
    let calls = mock.calls();
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());

    let outcome = BenchmarkDriver::new(DriverOptions::default()).run_text_with(
        &trace_for(&keys),
        Box::new(mock),
        Sinks::new(&primary, &diagnostic),
    );

    assert!(outcome.success());
    assert_eq!(calls.keys(), keys.to_vec());
}

#[test]
fn test_failures_plus_successes_equal_total() {
    let keys: Vec<usize> = (0..20).collect();
    let mock = MockStrategy::new(MockConfig::new("mixed").fail_on(2).fail_on(9).corrupt_on(15));
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());

    let outcome = BenchmarkDriver::new(DriverOptions::default()).run_text_with(
        &trace_for(&keys),
        Box::new(mock),
        Sinks::new(&primary, &diagnostic),
    );

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.failure_count() + outcome.successes(), outcome.total_queries);
    assert_eq!(outcome.internal_errors, 2);
    assert_eq!(outcome.mismatches, 1);
    assert!(!outcome.success());

    let lines = diagnostic.lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| l.starts_with("StrategyInternalError")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("RetrievalMismatch")).count(), 1);
}

#[test]
fn test_out_of_range_key_is_malformed_and_runs_nothing() {
    let mut text = trace_for(&[1, 2]);
    text.push_str(&format!("query,32,{}\n", "00".repeat(8)));
    let mock = MockStrategy::default_mock();
    let calls = mock.calls();
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());

    let mut driver = BenchmarkDriver::new(DriverOptions::default());
    let outcome = driver.run_text_with(&text, Box::new(mock), Sinks::new(&primary, &diagnostic));

    assert_eq!(outcome.status, RunStatus::Aborted(FailureKind::MalformedTrace));
    assert_eq!(outcome.queries_processed, 0);
    assert!(calls.is_empty());
    assert_eq!(driver.state(), DriverState::Failed);
    assert!(primary.is_empty());
    assert_eq!(diagnostic.len(), 1);
    let line = &diagnostic.lines()[0];
    assert!(line.starts_with("MalformedTrace"));
    assert!(line.contains("line 5"), "{line}");
}

#[test]
fn test_cancel_after_k_queries() {
    let keys: Vec<usize> = (0..10).collect();
    let token = CancellationToken::new();
    let mock = MockStrategy::new(MockConfig::new("mock").cancel_after(4, token.clone()));
    let calls = mock.calls();
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());

    let mut driver = BenchmarkDriver::new(DriverOptions { progress_every: 1, ..Default::default() })
        .with_cancellation(token);
    let outcome = driver.run_text_with(&trace_for(&keys), Box::new(mock), Sinks::new(&primary, &diagnostic));

    assert!(outcome.is_cancelled());
    assert!(!outcome.success());
    assert_eq!(outcome.queries_processed, 4);
    assert_eq!(calls.len(), 4);
    assert_eq!(driver.state(), DriverState::Failed);

    // One progress line per completed query, no summary
    let lines = primary.lines();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|l| !l.contains("queries=")));
    assert_eq!(diagnostic.lines().len(), 1);
    assert!(diagnostic.lines()[0].starts_with("Cancelled"));
}

#[test]
fn test_cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());
    let outcome = BenchmarkDriver::new(DriverOptions::default())
        .with_cancellation(token)
        .run_text(&trace_for(&[1, 2, 3]), StrategyKind::NonPrivate, Sinks::new(&primary, &diagnostic));

    assert!(outcome.is_cancelled());
    assert_eq!(outcome.queries_processed, 0);
    assert!(primary.is_empty());
}

#[test]
fn test_non_private_five_queries_summary() {
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());
    assert!(run_benchmark(&trace_for(&[0, 5, 10, 15, 20]), StrategyKind::NonPrivate, &primary, &diagnostic));

    let summary = primary.lines().pop().unwrap();
    assert!(summary.contains("queries=5"), "{summary}");
    assert!(summary.contains("failures=0"), "{summary}");
    assert!(diagnostic.is_empty());
}

#[test]
fn test_one_corrupted_expected_value() {
    let good = trace_for(&[0, 5, 10, 15, 20]);
    let db = StaticDb::synthetic(&spec()).unwrap();
    let original = format!("query,10,{}", hex::encode(db.row(10).unwrap()));
    let mut bad_row = db.row(10).unwrap().to_vec();
    bad_row[7] ^= 0x01;
    let corrupted = good.replace(&original, &format!("query,10,{}", hex::encode(&bad_row)));
    assert_ne!(good, corrupted);

    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());
    let outcome = BenchmarkDriver::new(DriverOptions::default()).run_text(
        &corrupted,
        StrategyKind::NonPrivate,
        Sinks::new(&primary, &diagnostic),
    );

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.failure_count(), 1);
    assert_eq!(outcome.mismatches, 1);
    assert!(!outcome.success());
    assert!(primary.lines().last().unwrap().contains("failures=1"));
    assert_eq!(diagnostic.len(), 1);
}

#[test]
fn test_baseline_runs_are_independent() {
    let (p1, d1) = (MemorySink::new(), MemorySink::new());
    let (p2, d2) = (MemorySink::new(), MemorySink::new());
    assert!(run_baseline(&p1, &d1));
    assert!(run_baseline(&p2, &d2));
    assert_eq!(p1.len(), p2.len());
    assert!(d1.is_empty() && d2.is_empty());
}

#[test]
fn test_render_then_run() {
    let trace = Trace::synthetic(spec(), 50, 8).unwrap();
    let (primary, diagnostic) = (MemorySink::new(), MemorySink::new());
    assert!(run_benchmark(&trace.render(), StrategyKind::Dpf, &primary, &diagnostic));
}
