//! Two-level bucketed hash for key sets too large for a flat salt search.

use std::fmt::{self, Display, Formatter};
use std::io;

use binout::{Serializer, VByte};
use bitm::{BitAccess, BitVec};
use dyn_size_of::GetSize;
use rayon::prelude::*;

use crate::error::BuildError;
use crate::family::HashKind;
use crate::utils::normalize_keys;

/// Default number of salts tried per bucket before falling back.
pub const DEFAULT_BUCKET_ATTEMPTS: u32 = 1000;

/// Salt kept, together with its collisions, by buckets that exhaust their budget.
pub const FALLBACK_SALT: u32 = 42;

/// Average number of keys per first-level bucket.
const KEYS_PER_BUCKET: usize = 10;

/// Family used inside the buckets. The sequential salts stay below 2^10 and only
/// perturb the low key bits, so the family has to avalanche them; under the
/// multiplicative family such salts give heavily correlated mappings and most
/// buckets never separate within their budget.
const BUCKET_KIND: HashKind = HashKind::Murmur;

/// Bucket tables of at most this many slots are searched with a single-word slot mask.
const SMALL_BUCKET_SLOTS: u32 = 64;

/// Build configuration of [`TwoLevelFunction`].
#[derive(Copy, Clone)]
pub struct TwoLevelConf {
    /// Salts tried per bucket, in order starting from 1, before falling back
    /// (default: [`DEFAULT_BUCKET_ATTEMPTS`]).
    pub bucket_attempts: u32,

    /// Salt accepted once the budget is exhausted, collisions included
    /// (default: [`FALLBACK_SALT`]).
    pub fallback_salt: u32,

    /// Whether to search the buckets in parallel on the rayon thread pool (default: `true`).
    ///
    /// Bucket salts are tried in a fixed order, so the parallel build yields
    /// exactly the same function as the sequential one.
    pub use_multiple_threads: bool,
}

impl Default for TwoLevelConf {
    fn default() -> Self {
        Self {
            bucket_attempts: DEFAULT_BUCKET_ATTEMPTS,
            fallback_salt: FALLBACK_SALT,
            use_multiple_threads: true,
        }
    }
}

impl TwoLevelConf {
    /// Returns a configuration that potentially uses multiple threads to build the function.
    pub fn mt(use_multiple_threads: bool) -> Self {
        Self { use_multiple_threads, ..Default::default() }
    }

    /// Returns a configuration with the given per-bucket attempt budget.
    pub fn attempts(bucket_attempts: u32) -> Self {
        Self { bucket_attempts, ..Default::default() }
    }

    /// Returns a configuration with the given per-bucket attempt budget and threading choice.
    pub fn attempts_mt(bucket_attempts: u32, use_multiple_threads: bool) -> Self {
        Self { bucket_attempts, use_multiple_threads, ..Default::default() }
    }
}

/// Parameters of one first-level bucket. Every bucket hashes with [`BUCKET_KIND`].
#[derive(Copy, Clone)]
struct Bucket {
    /// Salt of the bucket, either found by the search or the fallback.
    salt: u32,
    /// Slots of the bucket table: twice the bucket's key count, 0 for empty buckets.
    size: u32,
    /// First slot of this bucket in the flattened reverse table.
    offset: u32,
    /// Whether the salt maps the bucket's keys to distinct slots.
    perfect: bool,
}

impl GetSize for Bucket {}

/// Hash built in two levels: keys are split into `len/10+1` buckets and each
/// non-empty bucket gets its own salted table of twice its key count.
///
/// Unlike [`FlatFunction`](crate::FlatFunction), construction cannot fail on a
/// tight table: a bucket whose attempt budget runs out keeps the fallback salt
/// and its residual collisions, and is reported as imperfect in [`stats`](Self::stats).
/// Lookups go through a membership check against the stored key set, so keys
/// outside the input set are rejected instead of aliasing a member's slot.
pub struct TwoLevelFunction {
    /// Input keys, ascending; the membership authority for lookups.
    keys: Box<[u32]>,
    buckets: Box<[Bucket]>,
    /// Concatenated bucket tables mapping slots back to keys, `0` in unused slots.
    reverse: Box<[u32]>,
}

/// First-level bucket of `key`. Identifiers spread well enough that identity
/// serves as the first-level hash; only within-bucket collisions matter.
#[inline(always)] fn bucket_of(key: u32, bucket_count: u32) -> u32 {
    key % bucket_count
}

/// Splits normalized `keys` into `bucket_count` groups, preserving the ascending
/// order within each group.
fn partition(keys: &[u32], bucket_count: usize) -> Vec<Vec<u32>> {
    let mut grouped = vec![Vec::new(); bucket_count];
    for &key in keys {
        grouped[bucket_of(key, bucket_count as u32) as usize].push(key);
    }
    grouped
}

/// Result of building one bucket, before flattening.
struct BuiltBucket {
    salt: u32,
    perfect: bool,
    reverse: Box<[u32]>,
}

/// Builds the bucket table for the given salt and checks it for collisions.
///
/// On collisions the last key in ascending order wins the contested slot,
/// which keeps the table independent of the build schedule.
fn bucket_with_salt(bucket_keys: &[u32], salt: u32) -> BuiltBucket {
    let size = 2 * bucket_keys.len();
    let mut reverse = vec![0u32; size].into_boxed_slice();
    let mut taken = Box::<[u64]>::with_zeroed_bits(size);
    let mut perfect = true;
    for &key in bucket_keys {
        let slot = BUCKET_KIND.hash(key, salt, size as u32) as usize;
        if taken.get_bit(slot) { perfect = false; }
        taken.set_bit(slot);
        reverse[slot] = key;
    }
    BuiltBucket { salt, perfect, reverse }
}

/// Sequential salt search over small bucket tables, with taken slots kept in one word.
fn find_salt_small(bucket_keys: &[u32], size: u32, attempts: u32) -> Option<u32> {
    'salts: for salt in 1..=attempts {
        let mut taken = 0u64;
        for &key in bucket_keys {
            let slot = 1u64 << BUCKET_KIND.hash(key, salt, size);
            if taken & slot != 0 { continue 'salts; }
            taken |= slot;
        }
        return Some(salt);
    }
    None
}

/// Sequential salt search for buckets above [`SMALL_BUCKET_SLOTS`] slots.
fn find_salt_big(bucket_keys: &[u32], size: u32, attempts: u32) -> Option<u32> {
    let mut taken = Box::<[u64]>::with_zeroed_bits(size as usize);
    let mut touched = Vec::with_capacity(bucket_keys.len());
    for salt in 1..=attempts {
        touched.clear();
        let mut collided = false;
        for &key in bucket_keys {
            let slot = BUCKET_KIND.hash(key, salt, size) as usize;
            if taken.get_bit(slot) { collided = true; break; }
            taken.set_bit(slot);
            touched.push(slot);
        }
        for &slot in &touched { taken.clear_bit(slot); }
        if !collided { return Some(salt); }
    }
    None
}

/// Runs the bounded salt search for one bucket, falling back when it exhausts.
fn build_bucket(bucket_keys: &[u32], conf: &TwoLevelConf) -> BuiltBucket {
    if bucket_keys.is_empty() {
        return BuiltBucket { salt: 0, perfect: true, reverse: Box::new([]) };
    }
    let size = 2 * bucket_keys.len() as u32;
    let found = if size <= SMALL_BUCKET_SLOTS {
        find_salt_small(bucket_keys, size, conf.bucket_attempts)
    } else {
        find_salt_big(bucket_keys, size, conf.bucket_attempts)
    };
    bucket_with_salt(bucket_keys, found.unwrap_or(conf.fallback_salt))
}

impl TwoLevelFunction {
    /// Number of keys of the input set.
    #[inline] pub fn len(&self) -> usize { self.keys.len() }

    /// Number of first-level buckets, `len/10+1`.
    #[inline] pub fn bucket_count(&self) -> usize { self.buckets.len() }

    /// Total slots across all bucket tables; every slot from [`get`](Self::get) is below this.
    #[inline] pub fn capacity(&self) -> usize { self.reverse.len() }

    /// Input keys, ascending.
    #[inline] pub fn keys(&self) -> &[u32] { &self.keys }

    /// Returns the slot of `key`, or `None` for keys outside the input set.
    ///
    /// The slot is global: the bucket's offset into the flattened table plus the
    /// in-bucket slot. Keys of distinct buckets never share a slot; two keys of the
    /// same bucket share one only when that bucket is imperfect.
    pub fn get(&self, key: u32) -> Option<u32> {
        self.keys.binary_search(&key).ok()?;
        let bucket = &self.buckets[bucket_of(key, self.buckets.len() as u32) as usize];
        // the bucket of a member key is never empty, so its size is nonzero
        Some(bucket.offset + BUCKET_KIND.hash(key, bucket.salt, bucket.size))
    }

    /// Share of non-empty buckets whose mapping is collision-free, see [`TwoLevelStats`].
    pub fn perfect_bucket_ratio(&self) -> f64 { self.stats().perfect_ratio() }

    /// Quality statistics of the function.
    pub fn stats(&self) -> TwoLevelStats {
        let nonempty = self.buckets.iter().filter(|b| b.size != 0).count();
        let perfect = self.buckets.iter().filter(|b| b.size != 0 && b.perfect).count();
        TwoLevelStats {
            total_keys: self.keys.len(),
            bucket_count: self.buckets.len(),
            nonempty_buckets: nonempty,
            perfect_buckets: perfect,
            imperfect_buckets: nonempty - perfect,
        }
    }

    /// Builds the function for `keys` (sorted and deduplicated first) with the given
    /// configuration. Fails only on an empty key set.
    pub fn try_from_keys(keys: Vec<u32>, conf: &TwoLevelConf) -> Result<Self, BuildError> {
        let mut keys = keys;
        normalize_keys(&mut keys);
        if keys.is_empty() { return Err(BuildError::EmptyKeySet); }
        let bucket_count = keys.len() / KEYS_PER_BUCKET + 1;
        let grouped = partition(&keys, bucket_count);
        let built: Vec<BuiltBucket> = if conf.use_multiple_threads {
            grouped.par_iter().map(|bucket_keys| build_bucket(bucket_keys, conf)).collect()
        } else {
            grouped.iter().map(|bucket_keys| build_bucket(bucket_keys, conf)).collect()
        };
        Ok(Self::assemble(keys.into_boxed_slice(), built))
    }

    /// Builds the function for `keys` with the given configuration.
    /// Panics when the key set is empty.
    pub fn with_conf(keys: Vec<u32>, conf: &TwoLevelConf) -> Self {
        Self::try_from_keys(keys, conf)
            .expect("Constructing canph::TwoLevelFunction failed. The key set is empty.")
    }

    /// Builds the function for `keys` with the default configuration.
    /// Panics when the key set is empty.
    pub fn from_keys(keys: Vec<u32>) -> Self {
        Self::with_conf(keys, &TwoLevelConf::default())
    }

    /// Flattens per-bucket results into one reverse table with bucket offsets.
    fn assemble(keys: Box<[u32]>, built: Vec<BuiltBucket>) -> Self {
        let capacity = built.iter().map(|b| b.reverse.len()).sum();
        let mut reverse = Vec::with_capacity(capacity);
        let mut buckets = Vec::with_capacity(built.len());
        for b in built {
            buckets.push(Bucket {
                salt: b.salt,
                size: b.reverse.len() as u32,
                offset: reverse.len() as u32,
                perfect: b.perfect,
            });
            reverse.extend_from_slice(&b.reverse);
        }
        Self { keys, buckets: buckets.into_boxed_slice(), reverse: reverse.into_boxed_slice() }
    }

    /// Returns the number of bytes which [`write`](Self::write) writes.
    pub fn write_bytes(&self) -> usize {
        let salts: Vec<u32> = self.buckets.iter().map(|b| b.salt).collect();
        VByte::array_size(&self.keys) + VByte::array_size(&salts)
    }

    /// Writes `self` to the `output`: the key set plus one salt per bucket.
    /// Bucket layout and collision flags are rebuilt on read.
    pub fn write(&self, output: &mut dyn io::Write) -> io::Result<()> {
        VByte::write_array(output, &self.keys)?;
        let salts: Vec<u32> = self.buckets.iter().map(|b| b.salt).collect();
        VByte::write_array(output, &salts)
    }

    /// Reads `Self` from the `input`, as written by [`write`](Self::write).
    pub fn read(input: &mut dyn io::Read) -> io::Result<Self> {
        let keys: Box<[u32]> = VByte::read_array(input)?;
        let salts: Box<[u32]> = VByte::read_array(input)?;
        if keys.is_empty() || salts.len() != keys.len() / KEYS_PER_BUCKET + 1
            || keys.windows(2).any(|w| w[0] >= w[1])   // get binary-searches the keys
        {
            return Err(io::ErrorKind::InvalidData.into());
        }
        let grouped = partition(&keys, salts.len());
        let built = grouped.iter().zip(salts.iter())
            .map(|(bucket_keys, &salt)| bucket_with_salt(bucket_keys, salt))
            .collect();
        Ok(Self::assemble(keys, built))
    }
}

impl GetSize for TwoLevelFunction {
    fn size_bytes_dyn(&self) -> usize {
        self.keys.size_bytes_dyn() + self.buckets.size_bytes_dyn() + self.reverse.size_bytes_dyn()
    }
    fn size_bytes_content_dyn(&self) -> usize {
        self.keys.size_bytes_content_dyn() + self.buckets.size_bytes_content_dyn()
            + self.reverse.size_bytes_content_dyn()
    }
    const USES_DYN_MEM: bool = true;
}

/// Quality statistics of a [`TwoLevelFunction`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwoLevelStats {
    /// Number of keys of the input set.
    pub total_keys: usize,
    /// Number of first-level buckets, empty ones included.
    pub bucket_count: usize,
    /// Buckets holding at least one key.
    pub nonempty_buckets: usize,
    /// Non-empty buckets whose mapping is collision-free.
    pub perfect_buckets: usize,
    /// Non-empty buckets that kept residual collisions.
    pub imperfect_buckets: usize,
}

impl TwoLevelStats {
    /// Share of non-empty buckets whose mapping is collision-free.
    pub fn perfect_ratio(&self) -> f64 {
        if self.nonempty_buckets == 0 { return 0.0; }
        self.perfect_buckets as f64 / self.nonempty_buckets as f64
    }
}

impl Display for TwoLevelStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} keys in {} buckets ({} non-empty), {} perfect ({:.1}%)",
            self.total_keys, self.bucket_count, self.nonempty_buckets,
            self.perfect_buckets, 100.0 * self.perfect_ratio())
    }
}
