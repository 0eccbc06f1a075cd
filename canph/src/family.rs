//! Hash families available to the salt search.

use std::fmt;

/// Salted integer hash families, listed in the order [`best_assignment`](crate::search::best_assignment) tries them.
///
/// Every family is a pure function of `(key, salt, table_size)`, defined entirely
/// over wrapping 32-bit unsigned arithmetic, so a `(kind, salt, table_size)` triple
/// denotes exactly the same mapping on every platform and in every emitted artifact.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HashKind {
    /// Multiplies the salted key by the 32-bit golden ratio: `(key ^ salt) * 0x9E3779B9 mod table_size`.
    Multiplicative,
    /// Jenkins-style avalanche: seven shift/add/xor rounds over the salted key.
    Jenkins,
    /// Murmur-style finalizer: two multiplication rounds interleaved with xor-shifts.
    Murmur,
}

impl HashKind {
    /// All families, cheapest first; the search tries them in this order.
    pub const ALL: [HashKind; 3] = [HashKind::Multiplicative, HashKind::Jenkins, HashKind::Murmur];

    /// Returns the slot of `key` salted with `salt` in a table of `table_size` slots.
    ///
    /// The result is always in `[0, table_size)`. `table_size` must be nonzero.
    #[inline(always)]
    pub fn hash(self, key: u32, salt: u32, table_size: u32) -> u32 {
        let mixed = match self {
            HashKind::Multiplicative => multiplicative(key ^ salt),
            HashKind::Jenkins => jenkins(key ^ salt),
            HashKind::Murmur => murmur(key ^ salt),
        };
        mixed % table_size
    }

    /// Name of the family, used as the algorithm tag in emitted artifacts.
    pub fn name(self) -> &'static str {
        match self {
            HashKind::Multiplicative => "multiplicative",
            HashKind::Jenkins => "jenkins",
            HashKind::Murmur => "murmur",
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for HashKind {
    type Error = u8;

    /// Converts a serialized tag back to the family; yields the tag itself on unknown values.
    fn try_from(tag: u8) -> Result<Self, u8> {
        match tag {
            0 => Ok(HashKind::Multiplicative),
            1 => Ok(HashKind::Jenkins),
            2 => Ok(HashKind::Murmur),
            _ => Err(tag),
        }
    }
}

#[inline(always)] fn multiplicative(key: u32) -> u32 {
    key.wrapping_mul(0x9E37_79B9)
}

#[inline(always)] fn jenkins(mut key: u32) -> u32 {
    key = (!key).wrapping_add(key << 21);
    key ^= key >> 24;
    key = key.wrapping_add(key << 3).wrapping_add(key << 8);
    key ^= key >> 14;
    key = key.wrapping_add(key << 2).wrapping_add(key << 4);
    key ^= key >> 28;
    key.wrapping_add(key << 31)
}

#[inline(always)] fn murmur(mut key: u32) -> u32 {
    key ^= key >> 16;
    key = key.wrapping_mul(0x85EB_CA6B);
    key ^= key >> 13;
    key = key.wrapping_mul(0xC2B2_AE35);
    key ^ (key >> 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_are_in_range() {
        for kind in HashKind::ALL {
            for table_size in [1, 2, 3, 4, 20, 64, 1000, 1024] {
                for key in [0u32, 1, 0x100, 0x7FF, 0x18DA_00F1, 0x1FFF_FFFF] {
                    let slot = kind.hash(key, 0xDEAD_BEEF, table_size);
                    assert!(slot < table_size, "{} gave {} for table of {}", kind, slot, table_size);
                }
            }
        }
    }

    #[test]
    fn pure_in_all_arguments() {
        for kind in HashKind::ALL {
            assert_eq!(kind.hash(0x123, 77, 64), kind.hash(0x123, 77, 64));
        }
    }

    #[test]
    fn salt_changes_most_slots() {
        for kind in HashKind::ALL {
            let moved = (0u32..1024).filter(|&key| {
                kind.hash(key, 1, 1024) != kind.hash(key, 2, 1024)
            }).count();
            assert!(moved > 512, "{} moved only {} of 1024 keys", kind, moved);
        }
    }

    #[test]
    fn families_are_distinct_functions() {
        let disagree = (0u32..256).any(|key| {
            let m = HashKind::Multiplicative.hash(key, 12345, 1024);
            let j = HashKind::Jenkins.hash(key, 12345, 1024);
            let u = HashKind::Murmur.hash(key, 12345, 1024);
            m != j || j != u
        });
        assert!(disagree);
    }

    #[test]
    fn multiplicative_zeroes_key_equal_to_salt() {
        // key ^ salt == 0 forces the product, and so the slot, to 0
        assert_eq!(HashKind::Multiplicative.hash(0x1AB, 0x1AB, 16), 0);
    }

    #[test]
    fn tags_round_trip() {
        for kind in HashKind::ALL {
            assert_eq!(HashKind::try_from(kind as u8), Ok(kind));
        }
        assert_eq!(HashKind::try_from(3), Err(3));
    }
}
