//! Keyed BLAKE3 as the pseudo-random function behind set generation and the DPF tree.

use rand::RngCore;

/// PRF key length in bytes.
pub const PRF_KEY_LEN: usize = 32;

pub type PrfKey = [u8; PRF_KEY_LEN];

/// Domain-separated PRF mapping small integer tuples to 64-bit outputs.
#[derive(Clone)]
pub struct Prf {
    key: PrfKey,
}

impl std::fmt::Debug for Prf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prf").finish_non_exhaustive()
    }
}

impl Prf {
    pub fn new(key: PrfKey) -> Self {
        Prf { key }
    }

    pub fn random(rng: &mut impl RngCore) -> Self {
        let mut key = [0u8; PRF_KEY_LEN];
        rng.fill_bytes(&mut key);
        Prf { key }
    }

    pub fn key(&self) -> &PrfKey {
        &self.key
    }

    pub fn eval(&self, domain: u8, a: u64, b: u64) -> u64 {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&[domain]);
        hasher.update(&a.to_le_bytes());
        hasher.update(&b.to_le_bytes());
        let out = hasher.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&out.as_bytes()[..8]);
        u64::from_le_bytes(word)
    }
}

/// A 128-bit GGM tree seed.
pub type Seed = [u8; 16];

const TREE_PRG_KEY: PrfKey = *b"pir-bench/dpf/length-doubling-v1";

/// Length-doubling PRG: expands a seed into left/right child seeds and control bits.
pub fn expand_seed(seed: &Seed) -> (Seed, bool, Seed, bool) {
    let mut hasher = blake3::Hasher::new_keyed(&TREE_PRG_KEY);
    hasher.update(seed);
    let mut buf = [0u8; 33];
    hasher.finalize_xof().fill(&mut buf);

    let mut left = [0u8; 16];
    let mut right = [0u8; 16];
    left.copy_from_slice(&buf[..16]);
    right.copy_from_slice(&buf[16..32]);
    (left, buf[32] & 1 == 1, right, buf[32] & 2 == 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_prf_is_deterministic_and_domain_separated() {
        let prf = Prf::random(&mut StdRng::seed_from_u64(1));
        assert_eq!(prf.eval(1, 2, 3), prf.eval(1, 2, 3));
        assert_ne!(prf.eval(1, 2, 3), prf.eval(2, 2, 3));
        assert_ne!(prf.eval(1, 2, 3), prf.eval(1, 3, 2));
    }

    #[test]
    fn test_expand_seed_children_differ() {
        let (l, _, r, _) = expand_seed(&[7u8; 16]);
        assert_ne!(l, r);
        assert_eq!(expand_seed(&[7u8; 16]).0, l);
    }
}
