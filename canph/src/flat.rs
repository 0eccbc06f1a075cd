//! Flat perfect hash function over a fixed key set.

use std::io;

use binout::{AsIs, Serializer, VByte};
use dyn_size_of::GetSize;

use crate::error::BuildError;
use crate::family::HashKind;
use crate::search::{best_assignment, Assignment, SearchConf};
use crate::sizer::{PaddedPow2, TableSizer};
use crate::stats::SearchStatsCollector;
use crate::utils::normalize_keys;

/// Perfect hash function over a fixed set of identifiers, found by salted search.
///
/// Maps every key of the input set to a distinct slot of a table with
/// [`table_size`](Self::table_size) slots (a power of two for the default sizer).
/// The reverse table maps slots back to keys, which gives lookups a membership
/// check and emitted artifacts a validation path.
///
/// Construction with the same keys, configuration and seed yields byte-for-byte
/// the same function.
pub struct FlatFunction {
    kind: HashKind,
    salt: u32,
    table_size: u32,
    key_count: u32,
    /// Slot to key, `0` in unused slots.
    reverse: Box<[u32]>,
}

impl FlatFunction {
    /// Hash family of the function.
    #[inline] pub fn kind(&self) -> HashKind { self.kind }

    /// Salt under which the family maps the key set without collisions.
    #[inline] pub fn salt(&self) -> u32 { self.salt }

    /// Number of slots of the table.
    #[inline] pub fn table_size(&self) -> u32 { self.table_size }

    /// Number of keys of the input set.
    #[inline] pub fn len(&self) -> usize { self.key_count as usize }

    /// Ratio of keys to slots, always below 1.
    pub fn load_factor(&self) -> f64 { self.key_count as f64 / self.table_size as f64 }

    /// Table mapping each slot back to its key, with `0` in unused slots.
    #[inline] pub fn reverse_table(&self) -> &[u32] { &self.reverse }

    /// Returns the slot of `key`, which is distinct per key for keys of the input set.
    ///
    /// The function is total: keys outside the input set get an arbitrary in-range
    /// slot. Gate with [`contains`](Self::contains) when membership is not known.
    #[inline] pub fn get(&self, key: u32) -> u32 {
        self.kind.hash(key, self.salt, self.table_size)
    }

    /// Checks membership of `key` through the reverse table.
    ///
    /// Unused slots hold `0`, so an input set that relies on this check should not
    /// leave the key `0` out while expecting it to be rejected: `contains(0)` is
    /// true whenever slot `get(0)` is unused.
    #[inline] pub fn contains(&self, key: u32) -> bool {
        // get is always below table_size, so the slot access cannot be out of bounds
        self.reverse[self.get(key) as usize] == key
    }

    /// Builds the function for `keys` with the given search configuration,
    /// reporting search events to `stats`.
    ///
    /// Keys are normalized first: sorted ascending with duplicates removed.
    /// The table is sized by the default [`PaddedPow2`] sizer.
    pub fn try_from_keys_stats<S>(keys: Vec<u32>, conf: SearchConf, stats: &mut S) -> Result<Self, BuildError>
        where S: SearchStatsCollector
    {
        Self::try_with_sizer_stats(keys, &PaddedPow2::default(), conf, stats)
    }

    /// Builds the function for `keys` with a custom table sizer.
    pub fn try_with_sizer_stats<TS, S>(mut keys: Vec<u32>, sizer: &TS, conf: SearchConf, stats: &mut S)
        -> Result<Self, BuildError>
        where TS: TableSizer + ?Sized, S: SearchStatsCollector
    {
        normalize_keys(&mut keys);
        if keys.is_empty() { return Err(BuildError::EmptyKeySet); }
        let table_size = sizer.table_size(keys.len());
        if (table_size as usize) <= keys.len() {
            return Err(BuildError::TableTooSmall { table_size, key_count: keys.len() as u32 });
        }
        let found = best_assignment(&keys, table_size, conf, stats)?;
        Ok(Self::with_assignment(&keys, found, table_size))
    }

    /// Builds the function for `keys` with the given search configuration.
    pub fn try_from_keys(keys: Vec<u32>, conf: SearchConf) -> Result<Self, BuildError> {
        Self::try_from_keys_stats(keys, conf, &mut ())
    }

    /// Builds the function for `keys` with the default configuration.
    /// Panics when construction fails.
    pub fn from_keys(keys: Vec<u32>) -> Self {
        Self::try_from_keys(keys, SearchConf::default())
            .expect("Constructing canph::FlatFunction failed. Either the key set is empty or the table is too tight for it.")
    }

    /// Builds the function for `keys`, doubling the table up to `max_doublings`
    /// times whenever all families exhaust their budget at the current size.
    ///
    /// Growing trades memory for search time: each doubling roughly squares the
    /// per-salt success probability. Returns the error of the last size tried
    /// when even the largest table fails.
    pub fn with_table_growth<S>(keys: Vec<u32>, conf: SearchConf, max_doublings: u32, stats: &mut S)
        -> Result<Self, BuildError>
        where S: SearchStatsCollector
    {
        let mut keys = keys;
        normalize_keys(&mut keys);
        if keys.is_empty() { return Err(BuildError::EmptyKeySet); }
        let mut table_size = PaddedPow2::default().table_size(keys.len());
        let mut result = best_assignment(&keys, table_size, conf, stats);
        let mut doublings = 0;
        while result.is_err() && doublings < max_doublings {
            match table_size.checked_mul(2) {
                Some(doubled) => table_size = doubled,
                None => break,
            }
            result = best_assignment(&keys, table_size, conf, stats);
            doublings += 1;
        }
        result.map(|found| Self::with_assignment(&keys, found, table_size))
    }

    fn with_assignment(keys: &[u32], found: Assignment, table_size: u32) -> Self {
        let mut reverse = vec![0u32; table_size as usize].into_boxed_slice();
        for (&key, &slot) in keys.iter().zip(found.indices.iter()) {
            reverse[slot as usize] = key;
        }
        Self { kind: found.kind, salt: found.salt, table_size, key_count: keys.len() as u32, reverse }
    }

    /// Returns the number of bytes which [`write`](Self::write) writes.
    pub fn write_bytes(&self) -> usize {
        AsIs::size(self.kind as u8)
            + AsIs::size(self.salt)
            + VByte::size(self.table_size)
            + VByte::size(self.key_count)
            + AsIs::array_content_size(&self.reverse)
    }

    /// Writes `self` to the `output`.
    pub fn write(&self, output: &mut dyn io::Write) -> io::Result<()> {
        AsIs::write(output, self.kind as u8)?;
        AsIs::write(output, self.salt)?;
        VByte::write(output, self.table_size)?;
        VByte::write(output, self.key_count)?;
        AsIs::write_all(output, self.reverse.iter())
    }

    /// Reads `Self` from the `input`, as written by [`write`](Self::write).
    pub fn read(input: &mut dyn io::Read) -> io::Result<Self> {
        let tag: u8 = AsIs::read(input)?;
        let kind = HashKind::try_from(tag)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
        let salt: u32 = AsIs::read(input)?;
        let table_size: u32 = VByte::read(input)?;
        let key_count: u32 = VByte::read(input)?;
        if key_count >= table_size {
            return Err(io::ErrorKind::InvalidData.into());
        }
        let reverse = AsIs::read_n(input, table_size as usize)?;
        Ok(Self { kind, salt, table_size, key_count, reverse })
    }
}

impl From<Vec<u32>> for FlatFunction {
    fn from(keys: Vec<u32>) -> Self { Self::from_keys(keys) }
}

impl From<&[u32]> for FlatFunction {
    fn from(keys: &[u32]) -> Self { Self::from_keys(keys.to_vec()) }
}

impl GetSize for FlatFunction {
    fn size_bytes_dyn(&self) -> usize { self.reverse.size_bytes_dyn() }
    fn size_bytes_content_dyn(&self) -> usize { self.reverse.size_bytes_content_dyn() }
    const USES_DYN_MEM: bool = true;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sizer::Fixed;
    use bitm::{BitAccess, BitVec};

    /// Asserts that `f` maps every key of `keys` to its own slot and that the
    /// reverse table and the membership check agree with the mapping.
    pub(crate) fn test_flat_function(keys: &[u32], f: &FlatFunction) {
        assert_eq!(f.len(), keys.len());
        let mut seen = Box::<[u64]>::with_zeroed_bits(f.table_size() as usize);
        for &key in keys {
            let slot = f.get(key);
            assert!(slot < f.table_size(), "slot {} of key 0x{:X} above {}", slot, key, f.table_size());
            assert!(!seen.get_bit(slot as usize), "key 0x{:X} shares slot {}", key, slot);
            seen.set_bit(slot as usize);
            assert_eq!(f.reverse_table()[slot as usize], key);
            assert!(f.contains(key));
        }
    }

    fn test_read_write(f: &FlatFunction) {
        let mut buff = Vec::new();
        f.write(&mut buff).unwrap();
        assert_eq!(buff.len(), f.write_bytes());
        let read = FlatFunction::read(&mut &buff[..]).unwrap();
        assert_eq!(read.kind(), f.kind());
        assert_eq!(read.salt(), f.salt());
        assert_eq!(read.len(), f.len());
        assert_eq!(read.reverse_table(), f.reverse_table());
    }

    #[test]
    fn empty_key_set_is_rejected() {
        assert!(matches!(FlatFunction::try_from_keys(Vec::new(), SearchConf::default()),
            Err(BuildError::EmptyKeySet)));
    }

    #[test]
    fn three_consecutive_ids() {
        let keys = vec![0x100, 0x101, 0x102];
        let f = FlatFunction::try_from_keys_stats(keys.clone(), SearchConf::seeded(1234), &mut ()).unwrap();
        assert_eq!(f.table_size(), 4);
        assert!(f.load_factor() < 1.0);
        test_flat_function(&keys, &f);
        test_read_write(&f);
    }

    #[test]
    fn input_is_normalized() {
        let f = FlatFunction::try_from_keys(vec![0x102, 0x100, 0x101, 0x100], SearchConf::seeded(1)).unwrap();
        assert_eq!(f.len(), 3);
        test_flat_function(&[0x100, 0x101, 0x102], &f);
    }

    #[test]
    fn absent_keys_fail_the_membership_check() {
        let f = FlatFunction::try_from_keys(vec![0x100, 0x101, 0x102], SearchConf::seeded(1234)).unwrap();
        for absent in [0x103u32, 0x1FF, 0xFFFF, 0x1FFF_FFFF] {
            assert!(!f.contains(absent), "0x{:X} accepted", absent);
        }
    }

    #[test]
    fn same_seed_gives_identical_bytes() {
        let keys: Vec<u32> = (0..64).map(|i| 0x200 + i * 3).collect();
        let conf = SearchConf::seeded(5);
        let first = FlatFunction::try_from_keys(keys.clone(), conf).unwrap();
        let second = FlatFunction::try_from_keys(keys, conf).unwrap();
        let (mut a, mut b) = (Vec::new(), Vec::new());
        first.write(&mut a).unwrap();
        second.write(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fixed_table_must_exceed_the_key_count() {
        let too_small = FlatFunction::try_with_sizer_stats(vec![1, 2, 3], &Fixed(3), SearchConf::seeded(1), &mut ());
        assert!(matches!(too_small, Err(BuildError::TableTooSmall { table_size: 3, key_count: 3 })));
        let f = FlatFunction::try_with_sizer_stats(vec![1, 2, 3], &Fixed(16), SearchConf::seeded(1), &mut ()).unwrap();
        assert_eq!(f.table_size(), 16);
        test_flat_function(&[1, 2, 3], &f);
    }

    #[test]
    fn growth_doubles_until_the_budget_allows() {
        // a zero budget can never succeed, so the ladder is walked to the end
        let err = FlatFunction::with_table_growth(vec![1, 2, 3], SearchConf::attempts_seeded(0, 1), 3, &mut ());
        assert!(matches!(err, Err(BuildError::SaltsExhausted { table_size: 32, .. })));
        // with a real budget the base size suffices and no growth happens
        let f = FlatFunction::with_table_growth(vec![0x100, 0x101, 0x102], SearchConf::seeded(1234), 3, &mut ()).unwrap();
        assert_eq!(f.table_size(), 4);
    }

    #[test]
    fn truncated_input_fails_to_read() {
        let f = FlatFunction::try_from_keys(vec![10, 20, 30], SearchConf::seeded(2)).unwrap();
        let mut buff = Vec::new();
        f.write(&mut buff).unwrap();
        assert!(FlatFunction::read(&mut &buff[..buff.len() - 1]).is_err());
    }
}
