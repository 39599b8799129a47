//! Two-server offline/online PIR with pseudo-random hint sets.
//!
//! Offline, the left server XORs many pseudo-random sets of about
//! `sqrt(rows)` rows each into hints that the client keeps. Online, the
//! client picks a hint set containing the wanted index, sends that set with
//! the index removed to the right server and a fresh set with the index
//! removed to the left server, and recovers the row from the hint and the
//! right answer. The left answer refreshes the consumed hint. Two decoy
//! cases, chosen with small probability, make the left server's view
//! independent of the index.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::BenchResult;

use super::db::xor_into;
use super::prg::{PRF_KEY_LEN, Prf, PrfKey};
use super::set_gen::{PseudoSet, SetGenerator, SetKey};
use super::{RetrieveError, Row, SEC_PARAM, StaticDb, Strategy, StrategyKind, Transcript, check_limits};

/// Smallest dataset for which every set has at least two elements.
pub const MIN_ROWS: usize = 4;

/// Set ids and shifts are 32-bit.
pub const MAX_ROWS: usize = 1 << 31;

/// Hints per `rows / set_size`: `floor(SEC_PARAM * ln 2)`.
pub fn hint_multiplier() -> usize {
    (SEC_PARAM as f64 * std::f64::consts::LN_2) as usize
}

/// A set key on the client: 32-bit id and 32-bit shift.
pub const SET_KEY_BYTES: usize = 8;

pub fn set_size_for(rows: usize) -> usize {
    ((rows as f64).sqrt().round() as usize).max(2)
}

/// Client to left server: the key the hint sets are derived from.
#[derive(Debug, Clone)]
pub struct PuncHintRequest {
    pub set_key: PrfKey,
    pub num_hints_multiplier: usize,
}

#[derive(Debug, Clone)]
pub struct PuncHintResponse {
    pub set_size: usize,
    pub hints: Vec<Row>,
}

impl PuncHintRequest {
    pub fn num_hints(&self, rows: usize) -> usize {
        self.num_hints_multiplier * rows / set_size_for(rows)
    }

    /// Server side: XOR each generated set into a hint.
    pub fn process(&self, db: &StaticDb) -> PuncHintResponse {
        let rows = db.num_rows();
        let set_size = set_size_for(rows);
        let mut set_gen = SetGenerator::new(Prf::new(self.set_key), 0, rows, set_size);
        let hints = (0..self.num_hints(rows))
            .map(|_| {
                let set = set_gen.next_set();
                let mut hint = vec![0u8; db.row_len()];
                db.xor_rows_into(set.elems.iter().copied(), &mut hint);
                hint
            })
            .collect();
        PuncHintResponse { set_size, hints }
    }
}

/// Online query: a punctured set plus one extra index whose row is returned in the clear.
#[derive(Debug, Clone)]
pub struct PuncQuery {
    pub elems: Vec<usize>,
    pub extra: usize,
}

#[derive(Debug, Clone)]
pub struct PuncAnswer {
    pub parity: Row,
    pub extra: Row,
}

impl PuncQuery {
    pub fn wire_bytes(&self) -> usize {
        4 * (self.elems.len() + 1)
    }

    pub fn process(&self, db: &StaticDb) -> Result<PuncAnswer, RetrieveError> {
        let mut parity = vec![0u8; db.row_len()];
        db.xor_rows_into(self.elems.iter().copied(), &mut parity);
        let extra = db
            .row(self.extra)
            .ok_or(RetrieveError::OutOfRange { key: self.extra, rows: db.num_rows() })?
            .to_vec();
        Ok(PuncAnswer { parity, extra })
    }
}

struct PuncClient {
    left: Arc<StaticDb>,
    right: Arc<StaticDb>,
    rows: usize,
    sets: Vec<SetKey>,
    hints: Vec<Row>,
    orig_gen: SetGenerator,
    fresh_gen: SetGenerator,
    fresh_start: u32,
    idx_to_set: Vec<Option<u32>>,
}

impl PuncClient {
    fn eval(&self, set_idx: usize) -> PseudoSet {
        let key = self.sets[set_idx];
        if key.id < self.fresh_start {
            self.orig_gen.eval(key)
        } else {
            self.fresh_gen.eval(key)
        }
    }

    /// Hint set containing `i`; falls back to a scan that also repairs stale pointers.
    fn find_index(&mut self, i: usize) -> Option<usize> {
        if let Some(set_idx) = self.idx_to_set[i] {
            return Some(set_idx as usize);
        }
        for j in 0..self.sets.len() {
            let set = self.eval(j);
            for &e in &set.elems {
                if self.idx_to_set[e].is_none() {
                    self.idx_to_set[e] = Some(j as u32);
                }
            }
            if set.contains(i) {
                return Some(j);
            }
        }
        None
    }

    fn replace_set(&mut self, set_idx: usize, old: &PseudoSet, new: &PseudoSet) {
        for &e in &old.elems {
            if self.idx_to_set[e] == Some(set_idx as u32) {
                self.idx_to_set[e] = None;
            }
        }
        self.sets[set_idx] = new.key;
        for &e in &new.elems {
            self.idx_to_set[e] = Some(set_idx as u32);
        }
    }

    /// Hints, one set key per hint, and the index-to-set map at
    /// `ceil(log2(hints))` bits per row.
    fn storage_bytes(&self) -> u64 {
        let bits_per_row = usize::BITS - self.sets.len().saturating_sub(1).leading_zeros();
        let index_bytes = (self.rows as u64 * bits_per_row as u64).div_ceil(8);
        (self.hints.len() * self.left.row_len() + self.sets.len() * SET_KEY_BYTES) as u64 + index_bytes
    }

    fn ask(&self, left: &PuncQuery, right: &PuncQuery) -> Result<(PuncAnswer, PuncAnswer), RetrieveError> {
        Ok((left.process(&self.left)?, right.process(&self.right)?))
    }
}

fn punctured(set: &PseudoSet, hole: usize) -> Result<Vec<usize>, RetrieveError> {
    set.puncture(hole)
        .ok_or_else(|| RetrieveError::Internal(format!("index {hole} missing from set {}", set.key.id)))
}

/// Uniform member of `set` other than `idx`. Sets have at least two distinct elements.
fn random_member_except(rng: &mut StdRng, set: &PseudoSet, idx: usize) -> usize {
    loop {
        let val = set.elems[rng.gen_range(0..set.elems.len())];
        if val != idx {
            return val;
        }
    }
}

/// 1 with probability `odd1/total`, 2 with `odd2/total`, else 0.
fn sample(rng: &mut StdRng, odd1: usize, odd2: usize, total: usize) -> u8 {
    let coin = rng.gen_range(0..total);
    if coin < odd1 {
        1
    } else if coin < odd1 + odd2 {
        2
    } else {
        0
    }
}

pub struct PuncStrategy {
    rng: StdRng,
    client: Option<PuncClient>,
    transcript: Transcript,
}

impl PuncStrategy {
    pub fn new(seed: u64) -> Self {
        PuncStrategy {
            rng: StdRng::seed_from_u64(seed),
            client: None,
            transcript: Transcript::default(),
        }
    }

    /// Number of hints held by the client, zero before `prepare`.
    pub fn num_hints(&self) -> usize {
        self.client.as_ref().map_or(0, |c| c.hints.len())
    }
}

impl Strategy for PuncStrategy {
    fn name(&self) -> &str {
        StrategyKind::Punc.as_str()
    }

    fn kind(&self) -> Option<StrategyKind> {
        Some(StrategyKind::Punc)
    }

    fn check_shape(&self, rows: usize, row_len: usize) -> BenchResult<()> {
        check_limits(self.name(), rows, row_len, MIN_ROWS, MAX_ROWS)
    }

    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()> {
        self.check_shape(db.num_rows(), db.row_len())?;
        let rows = db.num_rows();

        let set_prf = Prf::random(&mut self.rng);
        let request = PuncHintRequest {
            set_key: *set_prf.key(),
            num_hints_multiplier: hint_multiplier(),
        };
        let response = self.transcript.serve_offline(|| request.process(&db));
        self.transcript.add_offline(PRF_KEY_LEN + 8);
        self.transcript.add_offline(response.hints.len() * db.row_len());

        let mut orig_gen = SetGenerator::new(set_prf, 0, rows, response.set_size);
        let mut sets = Vec::with_capacity(response.hints.len());
        let mut idx_to_set = vec![None; rows];
        for j in 0..response.hints.len() {
            let set = orig_gen.next_set();
            for &e in &set.elems {
                idx_to_set[e] = Some(j as u32);
            }
            sets.push(set.key);
        }

        // Later sets use a key the left server never saw.
        let fresh_start = orig_gen.next_id();
        let fresh_gen = SetGenerator::new(Prf::random(&mut self.rng), fresh_start, rows, response.set_size);

        self.client = Some(PuncClient {
            left: db.clone(),
            right: db,
            rows,
            sets,
            hints: response.hints,
            orig_gen,
            fresh_gen,
            fresh_start,
            idx_to_set,
        });
        Ok(())
    }

    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError> {
        let client = self.client.as_mut().ok_or(RetrieveError::NotPrepared)?;
        if key >= client.rows {
            return Err(RetrieveError::OutOfRange { key, rows: client.rows });
        }
        let set_idx = client
            .find_index(key)
            .ok_or_else(|| RetrieveError::Internal(format!("no hint set covers index {key}")))?;

        let rng = &mut self.rng;
        let set_size = client.fresh_gen.set_size();
        let new_set = client.fresh_gen.next_set_with(key);

        let (out, left_q, right_q) = match sample(rng, set_size - 1, set_size - 1, client.rows) {
            0 => {
                let current = client.eval(set_idx);
                let left_q = PuncQuery {
                    elems: punctured(&new_set, key)?,
                    extra: random_member_except(rng, &new_set, key),
                };
                let right_q = PuncQuery {
                    elems: punctured(&current, key)?,
                    extra: random_member_except(rng, &current, key),
                };
                let (left_a, right_a) = self.transcript.serve_online(|| client.ask(&left_q, &right_q))?;

                let mut out = client.hints[set_idx].clone();
                xor_into(&mut out, &right_a.parity);

                // The fresh set plus `key` becomes the new hint.
                let mut refreshed = left_a.parity;
                xor_into(&mut refreshed, &out);
                client.hints[set_idx] = refreshed;
                client.replace_set(set_idx, &current, &new_set);
                (out, left_q, right_q)
            }
            1 => {
                let extra_r = random_member_except(rng, &new_set, key);
                let extra_l = random_member_except(rng, &new_set, extra_r);
                let left_q = PuncQuery { elems: punctured(&new_set, extra_r)?, extra: extra_l };
                let right_q = PuncQuery { elems: punctured(&new_set, key)?, extra: extra_r };
                let (left_a, right_a) = self.transcript.serve_online(|| client.ask(&left_q, &right_q))?;

                let mut out = left_a.parity;
                xor_into(&mut out, &right_a.parity);
                xor_into(&mut out, &right_a.extra);
                (out, left_q, right_q)
            }
            _ => {
                let extra_l = random_member_except(rng, &new_set, key);
                let extra_r = random_member_except(rng, &new_set, extra_l);
                let left_q = PuncQuery { elems: punctured(&new_set, key)?, extra: extra_l };
                let right_q = PuncQuery { elems: punctured(&new_set, extra_l)?, extra: extra_r };
                let (left_a, right_a) = self.transcript.serve_online(|| client.ask(&left_q, &right_q))?;

                let mut out = left_a.parity;
                xor_into(&mut out, &right_a.parity);
                xor_into(&mut out, &left_a.extra);
                (out, left_q, right_q)
            }
        };

        let row_len = client.left.row_len();
        self.transcript
            .add_online(left_q.wire_bytes() + right_q.wire_bytes() + 4 * row_len);
        Ok(out)
    }

    fn transcript(&self) -> Transcript {
        self.transcript
    }

    fn client_storage_bytes(&self) -> u64 {
        self.client.as_ref().map_or(0, PuncClient::storage_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BenchError;
    use crate::pir::DatasetSpec;

    fn db(rows: usize, row_len: usize) -> Arc<StaticDb> {
        Arc::new(StaticDb::synthetic(&DatasetSpec { rows, row_len, seed: 17 }).unwrap())
    }

    #[test]
    fn test_parameters() {
        assert_eq!(hint_multiplier(), 88);
        assert_eq!(set_size_for(256), 16);
        assert_eq!(set_size_for(4), 2);
    }

    #[test]
    fn test_sample_extremes() {
        let mut rng = StdRng::seed_from_u64(17);
        assert_eq!(sample(&mut rng, 10, 0, 10), 1);
        assert_eq!(sample(&mut rng, 0, 10, 10), 2);
        assert_eq!(sample(&mut rng, 0, 0, 10), 0);
    }

    #[test]
    fn test_sample_distribution() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut count = [0usize; 3];
        for _ in 0..1000 {
            count[sample(&mut rng, 10, 10, 30) as usize] += 1;
        }
        for c in count {
            assert!(c > 280 && c < 380, "{count:?}");
        }
    }

    #[test]
    fn test_hints_match_sets() {
        let db = db(64, 8);
        let request = PuncHintRequest { set_key: [3u8; 32], num_hints_multiplier: 2 };
        let response = request.process(&db);
        assert_eq!(response.set_size, 8);
        assert_eq!(response.hints.len(), 2 * 64 / 8);

        let mut set_gen = SetGenerator::new(Prf::new([3u8; 32]), 0, 64, 8);
        let first = set_gen.next_set();
        let mut expected = vec![0u8; 8];
        db.xor_rows_into(first.elems.iter().copied(), &mut expected);
        assert_eq!(response.hints[0], expected);
    }

    #[test]
    fn test_read_every_row() {
        let db = db(256, 32);
        let mut s = PuncStrategy::new(17);
        s.prepare(db.clone()).unwrap();
        assert_eq!(s.num_hints(), 88 * 256 / 16);
        for i in 0..256 {
            assert_eq!(s.retrieve(i).unwrap(), db.row(i).unwrap(), "row {i}");
        }
        assert!(s.transcript().offline_bytes > 0);
        assert!(s.transcript().online_bytes > 0);
    }

    #[test]
    fn test_client_storage_and_server_time() {
        let mut s = PuncStrategy::new(3);
        assert_eq!(s.client_storage_bytes(), 0);
        s.prepare(db(256, 32)).unwrap();

        // 1408 hints: rows need 11 bits each to name their set
        let hints = 88 * 256 / 16;
        let expected = hints * 32 + hints * SET_KEY_BYTES + (256 * 11) / 8;
        assert_eq!(s.client_storage_bytes(), expected as u64);
        assert!(s.transcript().offline_server_time > std::time::Duration::ZERO);

        s.retrieve(9).unwrap();
        assert!(s.transcript().online_server_time > std::time::Duration::ZERO);
        assert_eq!(s.client_storage_bytes(), expected as u64);
    }

    #[test]
    fn test_repeated_reads_refresh_hints() {
        let db = db(100, 16);
        let mut s = PuncStrategy::new(5);
        s.prepare(db.clone()).unwrap();
        for _ in 0..20 {
            assert_eq!(s.retrieve(7).unwrap(), db.row(7).unwrap());
        }
    }

    #[test]
    fn test_setup_rejects_tiny_dataset() {
        let mut s = PuncStrategy::new(1);
        let err = s.prepare(db(3, 8)).unwrap_err();
        assert!(matches!(err, BenchError::Setup(_)));
        assert_eq!(s.retrieve(0), Err(RetrieveError::NotPrepared));
    }

    #[test]
    fn test_out_of_range_key() {
        let mut s = PuncStrategy::new(1);
        s.prepare(db(16, 8)).unwrap();
        assert_eq!(s.retrieve(16), Err(RetrieveError::OutOfRange { key: 16, rows: 16 }));
    }
}
