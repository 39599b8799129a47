//! Direct lookup. The server sees the requested index; kept as the
//! cost/leakage floor the private strategies are compared against.

use std::sync::Arc;

use crate::BenchResult;

use super::{RetrieveError, Row, StaticDb, Strategy, StrategyKind, Transcript, check_limits};

/// Index sent on the wire.
#[derive(Debug, Clone, Copy)]
pub struct NonPrivateQuery {
    pub index: u64,
}

impl NonPrivateQuery {
    const WIRE_BYTES: usize = 8;

    /// Server side: return the row verbatim.
    pub fn process(&self, db: &StaticDb) -> Option<Row> {
        let idx = usize::try_from(self.index).ok()?;
        db.row(idx).map(<[u8]>::to_vec)
    }
}

#[derive(Debug, Default)]
pub struct NonPrivateStrategy {
    server: Option<Arc<StaticDb>>,
    transcript: Transcript,
}

impl NonPrivateStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for NonPrivateStrategy {
    fn name(&self) -> &str {
        StrategyKind::NonPrivate.as_str()
    }

    fn kind(&self) -> Option<StrategyKind> {
        Some(StrategyKind::NonPrivate)
    }

    fn check_shape(&self, rows: usize, row_len: usize) -> BenchResult<()> {
        check_limits(self.name(), rows, row_len, 1, usize::MAX)
    }

    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()> {
        self.check_shape(db.num_rows(), db.row_len())?;
        self.server = Some(db);
        Ok(())
    }

    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError> {
        let db = self.server.as_ref().ok_or(RetrieveError::NotPrepared)?;
        let query = NonPrivateQuery { index: key as u64 };
        let row = self
            .transcript
            .serve_online(|| query.process(db))
            .ok_or(RetrieveError::OutOfRange { key, rows: db.num_rows() })?;
        self.transcript.add_online(NonPrivateQuery::WIRE_BYTES + row.len());
        Ok(row)
    }

    fn transcript(&self) -> Transcript {
        self.transcript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pir::DatasetSpec;

    fn db() -> Arc<StaticDb> {
        Arc::new(StaticDb::synthetic(&DatasetSpec { rows: 10, row_len: 16, seed: 3 }).unwrap())
    }

    #[test]
    fn test_retrieves_exact_rows() {
        let db = db();
        let mut s = NonPrivateStrategy::new();
        s.prepare(db.clone()).unwrap();
        for i in 0..10 {
            assert_eq!(s.retrieve(i).unwrap(), db.row(i).unwrap());
        }
        assert_eq!(s.transcript().online_bytes, 10 * (8 + 16));
        assert_eq!(s.transcript().offline_bytes, 0);
    }

    #[test]
    fn test_unprepared_and_out_of_range() {
        let mut s = NonPrivateStrategy::new();
        assert_eq!(s.retrieve(0), Err(RetrieveError::NotPrepared));
        s.prepare(db()).unwrap();
        assert_eq!(s.retrieve(10), Err(RetrieveError::OutOfRange { key: 10, rows: 10 }));
    }

    #[test]
    fn test_empty_dataset_fails_setup() {
        let empty = Arc::new(StaticDb::synthetic(&DatasetSpec { rows: 0, row_len: 16, seed: 3 }).unwrap());
        assert!(NonPrivateStrategy::new().prepare(empty).is_err());
    }
}
