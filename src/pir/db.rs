//! In-memory row store shared by the strategies and their in-process servers.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::{BenchError, BenchResult};

/// One database row.
pub type Row = Vec<u8>;

/// Largest dataset the engine will materialise in memory.
pub const MAX_DATASET_BYTES: usize = 1 << 32;

/// Parameters from which a dataset is regenerated deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub rows: usize,
    pub row_len: usize,
    pub seed: u64,
}

/// Flat, fixed-width row store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDb {
    num_rows: usize,
    row_len: usize,
    flat: Vec<u8>,
}

impl StaticDb {
    /// Build a database from equally sized rows.
    pub fn from_rows(rows: &[Row]) -> BenchResult<Self> {
        let Some(first) = rows.first() else {
            return Ok(StaticDb { num_rows: 0, row_len: 0, flat: Vec::new() });
        };
        let row_len = first.len();
        let mut flat = Vec::with_capacity(row_len * rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != row_len {
                return Err(BenchError::Setup(format!(
                    "row {i} has length {}, expected {row_len}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        Ok(StaticDb { num_rows: rows.len(), row_len, flat })
    }

    /// Regenerate the dataset described by `spec`.
    ///
    /// Row `i` starts with `i mod 256` and `'A' + i mod 256` so that rows are
    /// recognisable in dumps; the remaining bytes come from a seeded RNG.
    pub fn synthetic(spec: &DatasetSpec) -> BenchResult<Self> {
        let total = spec
            .rows
            .checked_mul(spec.row_len)
            .filter(|t| *t <= MAX_DATASET_BYTES)
            .ok_or_else(|| {
                BenchError::Setup(format!(
                    "dataset of {} rows x {} bytes exceeds the {} byte limit",
                    spec.rows, spec.row_len, MAX_DATASET_BYTES
                ))
            })?;

        let mut rng = StdRng::seed_from_u64(spec.seed);
        let mut flat = vec![0u8; total];
        for (i, row) in flat.chunks_mut(spec.row_len.max(1)).enumerate() {
            rng.fill_bytes(row);
            if let Some(b) = row.get_mut(0) {
                *b = (i % 256) as u8;
            }
            if let Some(b) = row.get_mut(1) {
                *b = b'A'.wrapping_add((i % 256) as u8);
            }
        }

        Ok(StaticDb { num_rows: spec.rows, row_len: spec.row_len, flat })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn row(&self, i: usize) -> Option<&[u8]> {
        if i >= self.num_rows {
            return None;
        }
        Some(&self.flat[i * self.row_len..(i + 1) * self.row_len])
    }

    /// XOR the rows at `indices` into `out`. Out-of-range indices are skipped.
    pub fn xor_rows_into(&self, indices: impl IntoIterator<Item = usize>, out: &mut [u8]) {
        for i in indices {
            if let Some(row) = self.row(i) {
                xor_into(out, row);
            }
        }
    }

    /// XOR of the rows whose bit is set in `selection`.
    pub fn xor_selected(&self, selection: &[bool]) -> Row {
        let mut out = vec![0u8; self.row_len];
        self.xor_rows_into(
            selection
                .iter()
                .enumerate()
                .filter_map(|(i, bit)| bit.then_some(i)),
            &mut out,
        );
        out
    }
}

/// `a ^= b` over the common prefix.
pub fn xor_into(a: &mut [u8], b: &[u8]) {
    debug_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= *y;
    }
}
