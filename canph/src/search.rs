//! Randomized search for collision-free salts.

use std::time::{SystemTime, UNIX_EPOCH};

use bitm::{BitAccess, BitVec};
use butils::XorShift32;

use crate::error::BuildError;
use crate::family::HashKind;
use crate::stats::SearchStatsCollector;

/// Default number of salts tried per hash family before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000_000;

/// Configuration of the flat salt search.
#[derive(Copy, Clone)]
pub struct SearchConf {
    /// Salt attempts per hash family before the search gives up (default: [`DEFAULT_MAX_ATTEMPTS`]).
    pub max_attempts: u32,

    /// Seed of the salt sampler; `None` (the default) draws a seed from the system clock.
    ///
    /// Construction is a one-shot offline step, so salts may differ between runs.
    /// Pass `Some` to make the search reproducible; a given seed always yields the
    /// same function for the same key set.
    pub seed: Option<u64>,
}

impl Default for SearchConf {
    fn default() -> Self { Self { max_attempts: DEFAULT_MAX_ATTEMPTS, seed: None } }
}

impl SearchConf {
    /// Returns a configuration with the given attempt budget per family.
    pub fn attempts(max_attempts: u32) -> Self { Self { max_attempts, ..Default::default() } }

    /// Returns a reproducible configuration with the given sampler seed.
    pub fn seeded(seed: u64) -> Self { Self { seed: Some(seed), ..Default::default() } }

    /// Returns a reproducible configuration with the given attempt budget and sampler seed.
    pub fn attempts_seeded(max_attempts: u32, seed: u64) -> Self {
        Self { max_attempts, seed: Some(seed) }
    }

    /// Salt stream for one family search. Yields values in `[1, 2^32-1]`.
    fn salts(&self) -> XorShift32 {
        let seed = self.seed.unwrap_or_else(clock_seed);
        // fold to the nonzero 32-bit state the generator needs
        XorShift32(((seed ^ (seed >> 32)) as u32).max(1))
    }
}

/// Seed for runs that do not ask for reproducibility.
fn clock_seed() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => since_epoch.as_nanos() as u64,
        Err(_) => 0x9E37_79B9_7F4A_7C15, // clock set before the epoch
    }
}

/// A collision-free assignment found by the salt search.
#[derive(Clone, Debug)]
pub struct Assignment {
    /// Hash family of the winning salt.
    pub kind: HashKind,
    /// The winning salt.
    pub salt: u32,
    /// Slot assigned to each key, parallel to the searched key slice.
    pub indices: Box<[u32]>,
}

/// Searches for a salt under which `kind` maps all `keys` to distinct slots of a
/// table with `table_size` slots.
///
/// Draws up to `conf.max_attempts` salts. Each attempt walks `keys` in slice order
/// and aborts at the first slot already taken, so failed attempts cost time
/// proportional to the keys actually probed. Returns the first collision-free
/// assignment, or `None` once the budget is exhausted.
///
/// `keys` must not contain duplicates; duplicates collide under every salt.
pub fn search<S>(keys: &[u32], kind: HashKind, table_size: u32, conf: SearchConf, stats: &mut S)
    -> Option<Assignment>
    where S: SearchStatsCollector
{
    stats.family_start(kind);
    let mut taken = Box::<[u64]>::with_zeroed_bits(table_size as usize);
    let mut indices = Vec::with_capacity(keys.len());
    for (attempt, salt) in (1..=conf.max_attempts).zip(conf.salts()) {
        indices.clear();
        let mut collided = false;
        for &key in keys {
            let slot = kind.hash(key, salt, table_size);
            if taken.get_bit(slot as usize) { collided = true; break; }
            taken.set_bit(slot as usize);
            indices.push(slot);
        }
        if !collided {
            stats.found(kind, salt, attempt);
            return Some(Assignment { kind, salt, indices: indices.into_boxed_slice() });
        }
        // undo exactly the bits this attempt set
        for &slot in &indices { taken.clear_bit(slot as usize); }
        stats.attempt(attempt);
    }
    stats.exhausted(kind, conf.max_attempts);
    None
}

/// Tries every family of [`HashKind::ALL`] in order via [`search`] and returns the
/// first collision-free assignment found.
///
/// Fails only when all families exhaust `conf.max_attempts`; the table is then too
/// tight for this key set and the caller has to grow it or switch to the two-level
/// builder, the search itself never escalates.
pub fn best_assignment<S>(keys: &[u32], table_size: u32, conf: SearchConf, stats: &mut S)
    -> Result<Assignment, BuildError>
    where S: SearchStatsCollector
{
    for kind in HashKind::ALL {
        if let Some(found) = search(keys, kind, table_size, conf, stats) {
            return Ok(found);
        }
    }
    Err(BuildError::SaltsExhausted {
        table_size,
        max_attempts: conf.max_attempts,
        families_tried: HashKind::ALL.len() as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{SearchStatsPrinter, REPORT_INTERVAL};

    #[derive(Default)]
    struct CountingStats { families: u32, failed: u32, found: u32, exhausted: u32 }

    impl SearchStatsCollector for CountingStats {
        fn family_start(&mut self, _kind: HashKind) { self.families += 1; }
        fn attempt(&mut self, _attempts: u32) { self.failed += 1; }
        fn found(&mut self, _kind: HashKind, _salt: u32, _attempts: u32) { self.found += 1; }
        fn exhausted(&mut self, _kind: HashKind, _attempts: u32) { self.exhausted += 1; }
    }

    fn assert_injective(keys: &[u32], found: &Assignment, table_size: u32) {
        let mut seen = vec![false; table_size as usize];
        for (&key, &slot) in keys.iter().zip(found.indices.iter()) {
            assert!(slot < table_size);
            assert!(!seen[slot as usize], "slot {} assigned twice", slot);
            seen[slot as usize] = true;
            assert_eq!(found.kind.hash(key, found.salt, table_size), slot);
        }
    }

    #[test]
    fn three_keys_in_four_slots() {
        let keys = [0x100, 0x101, 0x102];
        let found = best_assignment(&keys, 4, SearchConf::seeded(1234), &mut ()).unwrap();
        assert!(found.salt >= 1);
        assert_injective(&keys, &found, 4);
    }

    #[test]
    fn single_family_search() {
        let keys: Vec<u32> = (0..16).map(|i| 0x200 + i * 3).collect();
        let found = search(&keys, HashKind::Murmur, 64, SearchConf::seeded(7), &mut ()).unwrap();
        assert_eq!(found.kind, HashKind::Murmur);
        assert_injective(&keys, &found, 64);
    }

    #[test]
    fn same_seed_same_assignment() {
        let keys: Vec<u32> = (0..32).map(|i| 0x400 + i * 7).collect();
        let conf = SearchConf::seeded(99);
        let first = best_assignment(&keys, 64, conf, &mut ()).unwrap();
        let second = best_assignment(&keys, 64, conf, &mut ()).unwrap();
        assert_eq!(first.kind, second.kind);
        assert_eq!(first.salt, second.salt);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn duplicates_exhaust_every_family() {
        let keys = [7u32, 7];
        let mut stats = CountingStats::default();
        let err = best_assignment(&keys, 8, SearchConf::attempts_seeded(50, 42), &mut stats).unwrap_err();
        assert_eq!(err, BuildError::SaltsExhausted { table_size: 8, max_attempts: 50, families_tried: 3 });
        assert_eq!(stats.families, 3);
        assert_eq!(stats.exhausted, 3);
        assert_eq!(stats.failed, 150);
        assert_eq!(stats.found, 0);
    }

    #[test]
    fn zero_budget_never_searches() {
        let mut stats = CountingStats::default();
        assert!(search(&[1, 2, 3], HashKind::Jenkins, 8, SearchConf::attempts_seeded(0, 1), &mut stats).is_none());
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.exhausted, 1);
    }

    #[test]
    fn printer_reports_progress() {
        let mut out = Vec::new();
        let conf = SearchConf::attempts_seeded(REPORT_INTERVAL, 5);
        let result = search(&[3u32, 3], HashKind::Multiplicative, 4, conf, &mut SearchStatsPrinter::new(&mut out));
        assert!(result.is_none());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# Searching for multiplicative"));
        assert!(text.contains("# Tried 100000 salts..."));
        assert!(text.contains("# Gave up on multiplicative after 100000 attempts"));
    }
}
