//! Strategies for choosing the hash table size.

use std::fmt::{self, Display, Formatter};

use bitm::ceiling_div;

/// Chooses the number of slots of the hash table built for a given number of keys.
pub trait TableSizer {
    /// Returns the table size to use for `key_count` keys.
    fn table_size(&self, key_count: usize) -> u32;
}

/// Pads the key count by a percentage and rounds up to a power of two.
///
/// The result is always strictly greater than `key_count`, so the load factor of the
/// table stays below 1 even when the padded count is itself a power of two.
#[derive(Copy, Clone)]
pub struct PaddedPow2 {
    /// Padded table size, as a percent of the key count.
    pub percent: u16,
}

impl PaddedPow2 {
    /// Default padding percent, giving a load factor of at most about 0.83.
    pub const DEFAULT_PERCENT: u16 = 120;

    /// Returns a sizer that pads the key count to the given percent.
    pub fn with_percent(percent: u16) -> Self { Self { percent } }
}

impl Default for PaddedPow2 {
    fn default() -> Self { Self::with_percent(Self::DEFAULT_PERCENT) }
}

impl TableSizer for PaddedPow2 {
    fn table_size(&self, key_count: usize) -> u32 {
        let padded = ceiling_div(key_count * self.percent as usize, 100);
        padded.max(key_count + 1).next_power_of_two() as u32
    }
}

impl Display for PaddedPow2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "pow2_{}percent", self.percent)
    }
}

/// Fixed, caller-chosen table size, ignoring the key count.
///
/// Constructors taking a sizer reject tables that cannot hold the key set,
/// so a `Fixed` size must still exceed the number of keys.
#[derive(Copy, Clone)]
pub struct Fixed(pub u32);

impl TableSizer for Fixed {
    fn table_size(&self, _key_count: usize) -> u32 { self.0 }
}

impl Display for Fixed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fixed_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_pow2_sizes() {
        let sizer = PaddedPow2::default();
        for (keys, size) in [(1, 2), (2, 4), (3, 4), (4, 8), (10, 16), (16, 32),
                             (100, 128), (853, 1024), (854, 2048), (10_000, 16_384)] {
            assert_eq!(sizer.table_size(keys), size, "for {} keys", keys);
        }
    }

    #[test]
    fn always_a_power_of_two_above_the_key_count() {
        let sizer = PaddedPow2::default();
        for keys in 1..=4096 {
            let size = sizer.table_size(keys);
            assert!(size.is_power_of_two());
            assert!(size as usize > keys, "{} slots for {} keys", size, keys);
        }
        // strict even without padding headroom
        let tight = PaddedPow2::with_percent(100);
        for keys in [1usize, 4, 64, 1024] {
            assert!(tight.table_size(keys) as usize > keys);
        }
    }

    #[test]
    fn fixed_ignores_key_count() {
        assert_eq!(Fixed(4096).table_size(3), 4096);
        assert_eq!(Fixed(4096).table_size(4000), 4096);
    }

    #[test]
    fn display_names() {
        assert_eq!(PaddedPow2::default().to_string(), "pow2_120percent");
        assert_eq!(Fixed(64).to_string(), "fixed_64");
    }
}
