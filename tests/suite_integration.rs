//! Suite command against traces written to a temp directory.

use std::path::Path;

use pir_bench::pir::DatasetSpec;
use pir_bench::storage::{RecordFilter, RecordStore};
use pir_bench::trace::Trace;
use pir_bench::{gen_trace_cmd, suite_cmd};

fn write_trace(dir: &Path, name: &str, rows: usize) {
    let trace = Trace::synthetic(DatasetSpec { rows, row_len: 16, seed: 1 }, 12, 2).unwrap();
    std::fs::write(dir.join(name), trace.render()).unwrap();
}

#[test]
fn test_suite_runs_all_pairs() {
    let dir = tempfile::tempdir().unwrap();
    write_trace(dir.path(), "a.csv", 50);
    gen_trace_cmd::run(30, 8, 5, 3, dir.path().join("traces").join("b.csv")).unwrap();

    let config = dir.path().join("suite.toml");
    std::fs::write(
        &config,
        r#"
[settings]
progress_every = 4

[[trace]]
path = "a.csv"

[[trace]]
name = "second"
path = "traces/b.csv"
strategies = ["non-private"]
"#,
    )
    .unwrap();

    let jsonl = dir.path().join("suite.jsonl");
    suite_cmd::run(config, Some(jsonl.clone())).unwrap();

    let records = RecordStore::new(&jsonl).read_all().unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.success));
    assert_eq!(RecordStore::new(&jsonl).read(&RecordFilter::default().trace("a")).unwrap().len(), 3);
    assert_eq!(records[3].trace_name, "second");
    assert_eq!(records[3].config.progress_every, 4);
}

#[test]
fn test_suite_unknown_strategy() {
    let dir = tempfile::tempdir().unwrap();
    write_trace(dir.path(), "a.csv", 50);
    let config = dir.path().join("suite.toml");
    std::fs::write(&config, "[[trace]]\npath = \"a.csv\"\nstrategies = [\"matrix\"]\n").unwrap();

    let err = suite_cmd::run(config, None).unwrap_err().to_string();
    assert!(err.contains("unknown strategy `matrix`"), "{err}");
}

#[test]
fn test_suite_reports_failed_runs() {
    let dir = tempfile::tempdir().unwrap();
    // Too small for Punc; DPF still runs
    write_trace(dir.path(), "tiny.csv", 3);
    let config = dir.path().join("suite.toml");
    std::fs::write(&config, "[[trace]]\npath = \"tiny.csv\"\nstrategies = [\"punc\", \"dpf\"]\n").unwrap();

    let jsonl = dir.path().join("out.jsonl");
    let err = suite_cmd::run(config, Some(jsonl.clone())).unwrap_err().to_string();
    assert!(err.contains("1 of 2 suite runs failed"), "{err}");

    let records = RecordStore::new(&jsonl).read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, "SetupError");
    assert!(records[1].success);
}
