use voracious_radix_sort::RadixSort;

/// Sorts `keys` ascending and removes duplicates.
///
/// All builders normalize their input this way, which fixes the iteration order
/// and thus makes construction a pure function of the key set and configuration.
pub(crate) fn normalize_keys(keys: &mut Vec<u32>) {
    keys.voracious_sort();
    keys.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_dedups() {
        let mut keys = vec![0x7DF, 0x100, 0x7E8, 0x100, 0x1FFF_FFFF, 0x7DF];
        normalize_keys(&mut keys);
        assert_eq!(keys, [0x100, 0x7DF, 0x7E8, 0x1FFF_FFFF]);
    }

    #[test]
    fn empty_stays_empty() {
        let mut keys = Vec::new();
        normalize_keys(&mut keys);
        assert!(keys.is_empty());
    }
}
