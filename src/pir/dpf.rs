//! Two-server PIR from a distributed point function.
//!
//! The client splits the point function `f(x) = [x == key]` over a domain of
//! `ceil(log2(rows))` bits into two keys. Each server expands its key over the
//! full domain into a selection vector and returns the XOR of the selected
//! rows; the two selection vectors differ only at `key`, so XORing the answers
//! yields the row. A single key is pseudo-random and hides `key`.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::BenchResult;

use super::prg::{Seed, expand_seed};
use super::{RetrieveError, Row, StaticDb, Strategy, StrategyKind, Transcript, check_limits};

/// Largest supported domain, in bits.
pub const MAX_DOMAIN_BITS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionWord {
    pub seed: Seed,
    pub t_left: bool,
    pub t_right: bool,
}

/// One party's share of the point function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpfKey {
    pub root: Seed,
    pub root_t: bool,
    pub correction: Vec<CorrectionWord>,
}

impl DpfKey {
    pub fn domain_bits(&self) -> u32 {
        self.correction.len() as u32
    }

    /// Serialized size: root seed + control bit, 18 bytes per level.
    pub fn wire_bytes(&self) -> usize {
        17 + self.correction.len() * 18
    }
}

/// Number of bits needed to address `rows` leaves.
pub fn domain_bits(rows: usize) -> u32 {
    if rows <= 1 {
        0
    } else {
        usize::BITS - (rows - 1).leading_zeros()
    }
}

fn xor_seed(a: &Seed, b: &Seed) -> Seed {
    let mut out = *a;
    for (x, y) in out.iter_mut().zip(b) {
        *x ^= *y;
    }
    out
}

/// Split the point function at `alpha` over `bits` bits into two keys.
pub fn gen_keys(alpha: u64, bits: u32, rng: &mut impl RngCore) -> (DpfKey, DpfKey) {
    debug_assert!(bits == 64 || alpha < (1u64 << bits));

    let mut s0: Seed = [0u8; 16];
    let mut s1: Seed = [0u8; 16];
    rng.fill_bytes(&mut s0);
    rng.fill_bytes(&mut s1);
    let (mut t0, mut t1) = (false, true);

    let key0_root = s0;
    let key1_root = s1;
    let mut correction = Vec::with_capacity(bits as usize);

    for level in 0..bits {
        let (s0l, t0l, s0r, t0r) = expand_seed(&s0);
        let (s1l, t1l, s1r, t1r) = expand_seed(&s1);
        let go_right = (alpha >> (bits - 1 - level)) & 1 == 1;

        // The "lose" side is zeroed out; the "keep" side keeps differing.
        let (seed_cw, t_left, t_right) = if go_right {
            (xor_seed(&s0l, &s1l), t0l ^ t1l, t0r ^ t1r ^ true)
        } else {
            (xor_seed(&s0r, &s1r), t0l ^ t1l ^ true, t0r ^ t1r)
        };
        let (keep0, keep_t0, keep1, keep_t1, t_keep_cw) = if go_right {
            (s0r, t0r, s1r, t1r, t_right)
        } else {
            (s0l, t0l, s1l, t1l, t_left)
        };

        s0 = if t0 { xor_seed(&keep0, &seed_cw) } else { keep0 };
        s1 = if t1 { xor_seed(&keep1, &seed_cw) } else { keep1 };
        let next_t0 = keep_t0 ^ (t0 & t_keep_cw);
        let next_t1 = keep_t1 ^ (t1 & t_keep_cw);
        t0 = next_t0;
        t1 = next_t1;

        correction.push(CorrectionWord { seed: seed_cw, t_left, t_right });
    }

    (
        DpfKey { root: key0_root, root_t: false, correction: correction.clone() },
        DpfKey { root: key1_root, root_t: true, correction },
    )
}

/// Expand a key over the whole domain, truncated to `len` leaves.
pub fn eval_full(key: &DpfKey, len: usize) -> Vec<bool> {
    let mut level: Vec<(Seed, bool)> = vec![(key.root, key.root_t)];
    for cw in &key.correction {
        let mut next = Vec::with_capacity(level.len() * 2);
        for (seed, t) in &level {
            let (mut sl, mut tl, mut sr, mut tr) = expand_seed(seed);
            if *t {
                sl = xor_seed(&sl, &cw.seed);
                sr = xor_seed(&sr, &cw.seed);
                tl ^= cw.t_left;
                tr ^= cw.t_right;
            }
            next.push((sl, tl));
            next.push((sr, tr));
            if next.len() >= len {
                break;
            }
        }
        level = next;
    }
    level.into_iter().take(len).map(|(_, t)| t).collect()
}

/// Query sent to one server.
#[derive(Debug, Clone)]
pub struct DpfQuery {
    pub key: DpfKey,
}

impl DpfQuery {
    /// Server side: XOR of the rows selected by the expanded key.
    pub fn process(&self, db: &StaticDb) -> Row {
        db.xor_selected(&eval_full(&self.key, db.num_rows()))
    }
}

pub struct DpfStrategy {
    rng: StdRng,
    servers: Option<[Arc<StaticDb>; 2]>,
    bits: u32,
    transcript: Transcript,
}

impl DpfStrategy {
    pub fn new(seed: u64) -> Self {
        DpfStrategy {
            rng: StdRng::seed_from_u64(seed),
            servers: None,
            bits: 0,
            transcript: Transcript::default(),
        }
    }
}

impl Strategy for DpfStrategy {
    fn name(&self) -> &str {
        StrategyKind::Dpf.as_str()
    }

    fn kind(&self) -> Option<StrategyKind> {
        Some(StrategyKind::Dpf)
    }

    fn check_shape(&self, rows: usize, row_len: usize) -> BenchResult<()> {
        check_limits(self.name(), rows, row_len, 1, 1usize << MAX_DOMAIN_BITS)
    }

    fn prepare(&mut self, db: Arc<StaticDb>) -> BenchResult<()> {
        self.check_shape(db.num_rows(), db.row_len())?;
        self.bits = domain_bits(db.num_rows());
        // Only the dataset shape is exchanged at setup.
        self.transcript.add_offline(16);
        self.servers = Some([db.clone(), db]);
        Ok(())
    }

    fn retrieve(&mut self, key: usize) -> Result<Row, RetrieveError> {
        let [left, right] = self.servers.as_ref().ok_or(RetrieveError::NotPrepared)?;
        if key >= left.num_rows() {
            return Err(RetrieveError::OutOfRange { key, rows: left.num_rows() });
        }

        let (k0, k1) = gen_keys(key as u64, self.bits, &mut self.rng);
        let q0 = DpfQuery { key: k0 };
        let q1 = DpfQuery { key: k1 };
        let (a0, a1) = self
            .transcript
            .serve_online(|| (q0.process(left), q1.process(right)));
        if a0.len() != a1.len() {
            return Err(RetrieveError::Internal(format!(
                "answer length mismatch: {} vs {}",
                a0.len(),
                a1.len()
            )));
        }
        self.transcript
            .add_online(q0.key.wire_bytes() + q1.key.wire_bytes() + a0.len() + a1.len());

        let mut out = a0;
        super::db::xor_into(&mut out, &a1);
        Ok(out)
    }

    fn transcript(&self) -> Transcript {
        self.transcript
    }
}
