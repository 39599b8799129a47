//! Pseudo-random subsets of `[0, univ_size)` with succinct keys.
//!
//! A set is identified by `(id, shift)`: the PRF expands `id` into
//! `set_size` distinct base offsets, and every element is shifted by
//! `shift` modulo the universe. `next_set_with` picks the shift so that the set
//! contains a chosen element at a pseudo-random position.

use std::collections::HashSet;

use super::prg::Prf;

const DOMAIN_ELEM: u8 = 0xAA;
const DOMAIN_SHIFT: u8 = 0xBB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetKey {
    pub id: u32,
    pub shift: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoSet {
    pub key: SetKey,
    pub elems: Vec<usize>,
}

impl PseudoSet {
    pub fn contains(&self, val: usize) -> bool {
        self.elems.contains(&val)
    }

    /// The set with `hole` removed, sorted so element order carries no position information.
    pub fn puncture(&self, hole: usize) -> Option<Vec<usize>> {
        let pos = self.elems.iter().position(|e| *e == hole)?;
        let mut rest: Vec<usize> = self
            .elems
            .iter()
            .enumerate()
            .filter_map(|(i, e)| (i != pos).then_some(*e))
            .collect();
        rest.sort_unstable();
        Some(rest)
    }
}

#[derive(Debug, Clone)]
pub struct SetGenerator {
    prf: Prf,
    next_id: u32,
    univ_size: usize,
    set_size: usize,
}

impl SetGenerator {
    pub fn new(prf: Prf, start_id: u32, univ_size: usize, set_size: usize) -> Self {
        debug_assert!(set_size <= univ_size);
        SetGenerator { prf, next_id: start_id, univ_size, set_size }
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn set_size(&self) -> usize {
        self.set_size
    }

    /// Fresh set with a pseudo-random shift.
    pub fn next_set(&mut self) -> PseudoSet {
        let id = self.take_id();
        let shift = (self.prf.eval(DOMAIN_SHIFT, id as u64, 0) % self.univ_size as u64) as u32;
        self.eval(SetKey { id, shift })
    }

    /// Fresh set guaranteed to contain `val`.
    pub fn next_set_with(&mut self, val: usize) -> PseudoSet {
        let id = self.take_id();
        let base = self.base_elems(id);
        let pos = (self.prf.eval(DOMAIN_SHIFT, id as u64, 0) % self.set_size as u64) as usize;
        let shift = ((val % self.univ_size) + self.univ_size - base[pos]) % self.univ_size;
        self.shifted(SetKey { id, shift: shift as u32 }, base)
    }

    pub fn eval(&self, key: SetKey) -> PseudoSet {
        self.shifted(key, self.base_elems(key.id))
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    fn shifted(&self, key: SetKey, mut elems: Vec<usize>) -> PseudoSet {
        let shift = key.shift as usize;
        for e in elems.iter_mut() {
            *e = (*e + shift) % self.univ_size;
        }
        PseudoSet { key, elems }
    }

    /// `set_size` distinct offsets; collisions are resolved by re-drawing with a counter.
    fn base_elems(&self, id: u32) -> Vec<usize> {
        let mut seen = HashSet::with_capacity(self.set_size);
        let mut elems = Vec::with_capacity(self.set_size);
        let mut counter = 0u64;
        while elems.len() < self.set_size {
            let candidate = (self.prf.eval(DOMAIN_ELEM, id as u64, counter) % self.univ_size as u64) as usize;
            counter += 1;
            if seen.insert(candidate) {
                elems.push(candidate);
            }
        }
        elems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn generator(univ: usize, size: usize) -> SetGenerator {
        SetGenerator::new(Prf::random(&mut StdRng::seed_from_u64(11)), 0, univ, size)
    }

    #[test]
    fn test_sets_are_distinct_and_in_range() {
        let mut g = generator(100, 10);
        for _ in 0..50 {
            let set = g.next_set();
            let unique: HashSet<_> = set.elems.iter().collect();
            assert_eq!(unique.len(), 10);
            assert!(set.elems.iter().all(|e| *e < 100));
        }
    }

    #[test]
    fn test_eval_reproduces_generated_set() {
        let mut g = generator(1000, 32);
        let set = g.next_set();
        assert_eq!(g.eval(set.key), set);
        assert_eq!(g.next_id(), 1);
    }

    #[test]
    fn test_next_set_with_contains_value() {
        let mut g = generator(64, 8);
        for val in 0..64 {
            let set = g.next_set_with(val);
            assert!(set.contains(val), "val {val} missing from {:?}", set.elems);
            assert_eq!(g.eval(set.key), set);
        }
    }

    #[test]
    fn test_puncture_removes_only_hole() {
        let mut g = generator(50, 7);
        let set = g.next_set_with(3);
        let punctured = set.puncture(3).unwrap();
        assert_eq!(punctured.len(), 6);
        assert!(!punctured.contains(&3));
        assert!(punctured.windows(2).all(|w| w[0] < w[1]));
        assert!(set.puncture(set.elems.iter().max().unwrap() + 1000).is_none());
    }
}
