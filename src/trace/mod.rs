//! Query traces: the recorded workload a benchmark replays.
//!
//! Text format (version 1) is CSV with one tagged record per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! version,1
//! dataset,<rows>,<row_len>,<seed>
//! query,<key>,<expected row as hex>
//! ```
//!
//! The dataset record is enough to regenerate every row, so a trace is
//! self-contained. Parsing is all-or-nothing: the first bad record aborts
//! with `BenchError::MalformedTrace` naming its line and field.

use std::fmt::{Display, Write as _};
use std::str::FromStr;

use csv::StringRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pir::{DatasetSpec, Row, StaticDb};
use crate::{BenchError, BenchResult};

pub const TRACE_FORMAT_VERSION: u32 = 1;

/// One retrieval and the row it must return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub key: usize,
    pub expected: Row,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub dataset: DatasetSpec,
    pub queries: Vec<Query>,
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn field<'r>(record: &'r StringRecord, idx: usize, name: &'static str) -> BenchResult<&'r str> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BenchError::malformed(line_of(record), name, "missing value"))
}

fn number<T>(record: &StringRecord, idx: usize, name: &'static str) -> BenchResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = field(record, idx, name)?;
    raw.parse()
        .map_err(|e| BenchError::malformed(line_of(record), name, format!("`{raw}`: {e}")))
}

fn expect_fields(record: &StringRecord, count: usize) -> BenchResult<()> {
    if record.len() > count {
        return Err(BenchError::malformed(
            line_of(record),
            "record",
            format!("expected {count} fields, found {}", record.len()),
        ));
    }
    Ok(())
}

impl Trace {
    /// Parse format-v1 trace text.
    pub fn parse(text: &str) -> BenchResult<Trace> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut version_seen = false;
        let mut dataset: Option<DatasetSpec> = None;
        let mut queries = Vec::new();
        let mut last_line = 0;

        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line());
                BenchError::malformed(line, "record", e.to_string())
            })?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = line_of(&record);
            last_line = line;
            let tag = field(&record, 0, "tag")?;

            if !version_seen && tag != "version" {
                return Err(BenchError::malformed(line, "tag", "first record must be `version`"));
            }

            match tag {
                "version" => {
                    if version_seen {
                        return Err(BenchError::malformed(line, "tag", "duplicate `version` record"));
                    }
                    expect_fields(&record, 2)?;
                    let version: u32 = number(&record, 1, "version")?;
                    if version != TRACE_FORMAT_VERSION {
                        return Err(BenchError::malformed(
                            line,
                            "version",
                            format!("unsupported version {version}, expected {TRACE_FORMAT_VERSION}"),
                        ));
                    }
                    version_seen = true;
                }
                "dataset" => {
                    if dataset.is_some() {
                        return Err(BenchError::malformed(line, "tag", "duplicate `dataset` record"));
                    }
                    expect_fields(&record, 4)?;
                    dataset = Some(DatasetSpec {
                        rows: number(&record, 1, "rows")?,
                        row_len: number(&record, 2, "row_len")?,
                        seed: number(&record, 3, "seed")?,
                    });
                }
                "query" => {
                    let spec = dataset.ok_or_else(|| {
                        BenchError::malformed(line, "tag", "`query` before `dataset` record")
                    })?;
                    expect_fields(&record, 3)?;
                    let key: usize = number(&record, 1, "key")?;
                    if key >= spec.rows {
                        return Err(BenchError::malformed(
                            line,
                            "key",
                            format!("key {key} out of range for {} rows", spec.rows),
                        ));
                    }
                    let hex_value = field(&record, 2, "expected")?;
                    let expected = hex::decode(hex_value)
                        .map_err(|e| BenchError::malformed(line, "expected", e.to_string()))?;
                    if expected.len() != spec.row_len {
                        return Err(BenchError::malformed(
                            line,
                            "expected",
                            format!("{} bytes, row length is {}", expected.len(), spec.row_len),
                        ));
                    }
                    queries.push(Query { key, expected });
                }
                other => {
                    return Err(BenchError::malformed(line, "tag", format!("unknown record `{other}`")));
                }
            }
        }

        if !version_seen {
            return Err(BenchError::malformed(1, "version", "empty trace"));
        }
        let dataset = dataset
            .ok_or_else(|| BenchError::malformed(last_line, "dataset", "missing `dataset` record"))?;
        Ok(Trace { dataset, queries })
    }

    /// Format-v1 text that `parse` reads back into an equal trace.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "version,{TRACE_FORMAT_VERSION}");
        let _ = writeln!(
            out,
            "dataset,{},{},{}",
            self.dataset.rows, self.dataset.row_len, self.dataset.seed
        );
        for q in &self.queries {
            let _ = writeln!(out, "query,{},{}", q.key, hex::encode(&q.expected));
        }
        out
    }

    /// `count` uniformly random keys over the dataset `spec` describes.
    pub fn synthetic(spec: DatasetSpec, count: usize, seed: u64) -> BenchResult<Trace> {
        let db = StaticDb::synthetic(&spec)?;
        Ok(Trace {
            dataset: spec,
            queries: synthetic_queries(&db, count, seed),
        })
    }

    /// Rebuild the dataset the queries refer to.
    pub fn build_db(&self) -> BenchResult<StaticDb> {
        StaticDb::synthetic(&self.dataset)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Random-key queries with expected values read from `db`. Empty for an empty database.
pub fn synthetic_queries(db: &StaticDb, count: usize, seed: u64) -> Vec<Query> {
    if db.num_rows() == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .filter_map(|_| {
            let key = rng.gen_range(0..db.num_rows());
            db.row(key).map(|row| Query { key, expected: row.to_vec() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn malformed_at(text: &str) -> (u64, &'static str) {
        match Trace::parse(text) {
            Err(BenchError::MalformedTrace { line, field, .. }) => (line, field),
            other => panic!("expected MalformedTrace, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_minimal() {
        let text = "# header\nversion,1\n\ndataset, 4, 2, 9\nquery,3,0344\nquery,0,0041\n";
        let trace = Trace::parse(text).unwrap();
        assert_eq!(trace.dataset, DatasetSpec { rows: 4, row_len: 2, seed: 9 });
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.queries[0], Query { key: 3, expected: vec![0x03, 0x44] });
    }

    #[test]
    fn test_zero_queries_is_well_formed() {
        let trace = Trace::parse("version,1\ndataset,10,4,1\n").unwrap();
        assert!(trace.is_empty());
    }

    #[test]
    fn test_out_of_range_key() {
        assert_eq!(malformed_at("version,1\ndataset,4,1,0\nquery,4,00\n"), (3, "key"));
    }

    #[test]
    fn test_malformed_fields() {
        assert_eq!(malformed_at("dataset,4,1,0\n"), (1, "tag"));
        assert_eq!(malformed_at("version,2\n"), (1, "version"));
        assert_eq!(malformed_at("version,1\nquery,0,00\n"), (2, "tag"));
        assert_eq!(malformed_at("version,1\ndataset,x,1,0\n"), (2, "rows"));
        assert_eq!(malformed_at("version,1\ndataset,4,1,0\nquery,1,zz\n"), (3, "expected"));
        assert_eq!(malformed_at("version,1\ndataset,4,2,0\nquery,1,00\n"), (3, "expected"));
        assert_eq!(malformed_at("version,1\ndataset,4,1,0\nquery,1\n"), (3, "expected"));
        assert_eq!(malformed_at("version,1\ndataset,4,1,0\nfetch,1,00\n"), (3, "tag"));
        assert_eq!(malformed_at("version,1\ndataset,4,1,0\ndataset,4,1,0\n"), (3, "tag"));
        assert_eq!(malformed_at("version,1\n# no dataset\n"), (1, "dataset"));
        assert_eq!(malformed_at("# nothing\n"), (1, "version"));
    }

    #[test]
    fn test_render_parses_back() {
        let spec = DatasetSpec { rows: 50, row_len: 8, seed: 4 };
        let trace = Trace::synthetic(spec, 25, 99).unwrap();
        assert_eq!(Trace::parse(&trace.render()).unwrap(), trace);
    }

    #[test]
    fn test_synthetic_expected_matches_dataset() {
        let spec = DatasetSpec { rows: 20, row_len: 6, seed: 1 };
        let trace = Trace::synthetic(spec, 40, 5).unwrap();
        let db = trace.build_db().unwrap();
        assert_eq!(trace.len(), 40);
        for q in &trace.queries {
            assert_eq!(db.row(q.key).unwrap(), q.expected.as_slice());
        }
    }

    #[test]
    fn test_synthetic_on_empty_dataset() {
        let db = StaticDb::synthetic(&DatasetSpec { rows: 0, row_len: 4, seed: 1 }).unwrap();
        assert!(synthetic_queries(&db, 10, 1).is_empty());
    }
}
