//! Reading and generating CAN identifier sets.

use std::io::{self, BufRead, Write};

use butils::XorShift32;

/// Largest valid identifier: CAN frames carry at most 29 bits of ID.
pub const MAX_CAN_ID: u32 = 0x1FFF_FFFF;

/// Identifier ranges plausible for a vehicle network: seven standard-frame ECU
/// blocks plus the two extended-frame UDS diagnostic ranges.
pub const PLAUSIBLE_RANGES: [(u32, u32); 9] = [
    (0x100, 0x1FF),             // engine
    (0x200, 0x2FF),             // transmission
    (0x300, 0x3FF),             // body
    (0x400, 0x4FF),             // ABS/ESP
    (0x500, 0x5FF),             // HVAC
    (0x600, 0x6FF),             // instrument cluster
    (0x700, 0x7FF),             // gateway
    (0x18DA0000, 0x18DAFFFF),   // UDS requests
    (0x18DB0000, 0x18DBFFFF),   // UDS responses
];

/// Keys surviving a [`parse_keys`] run, with the number of entries dropped.
pub struct LoadedKeys {
    /// The identifiers read, in file order, duplicates included.
    pub keys: Vec<u32>,
    /// Entries skipped for being unparseable or out of range.
    pub skipped: usize,
}

/// Reads CAN identifiers from a line-oriented `input`.
///
/// Blank lines and lines starting with `#` or `//` are skipped, inline `#`
/// comments are stripped, and a line may carry one identifier or a
/// comma-separated run. Identifiers are `0x`-prefixed hexadecimal or decimal;
/// anything else gets one final try as bare hexadecimal. Unparseable or
/// out-of-range entries are skipped with a warning on `warnings` naming the
/// line, never aborting the read.
pub fn parse_keys(input: impl BufRead, warnings: &mut dyn Write) -> io::Result<LoadedKeys> {
    let mut keys = Vec::new();
    let mut skipped = 0;
    for (line_nr, line) in input.lines().enumerate() {
        let line = line?;
        let line_nr = line_nr + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") { continue; }
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() { continue; }
        for token in line.split(',') {
            let token = token.trim();
            if token.is_empty() { continue; }
            match parse_token(token) {
                Some(can_id) if can_id <= MAX_CAN_ID => keys.push(can_id),
                Some(can_id) => {
                    writeln!(warnings, "Warning: CAN ID 0x{:X} out of range (line {})", can_id, line_nr)?;
                    skipped += 1;
                },
                None => {
                    writeln!(warnings, "Warning: Invalid CAN ID format '{}' (line {})", token, line_nr)?;
                    skipped += 1;
                },
            }
        }
    }
    Ok(LoadedKeys { keys, skipped })
}

/// Parses one identifier: `0x`-prefixed hexadecimal, decimal, or bare hexadecimal.
fn parse_token(token: &str) -> Option<u32> {
    if let Some(digits) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return u32::from_str_radix(digits, 16).ok();
    }
    if token.bytes().all(|b| b.is_ascii_digit()) {
        return token.parse().ok();
    }
    u32::from_str_radix(token, 16).ok()
}

/// Generates `count` distinct test identifiers, ascending.
///
/// Draws `count/9` identifiers from each of the [`PLAUSIBLE_RANGES`] and tops
/// the set up with uniform 29-bit values. A fixed `seed` reproduces the set.
pub fn generate_test_can_ids(count: usize, seed: u32) -> Vec<u32> {
    let mut rng = XorShift32(seed.max(1)); // the generator needs a nonzero state
    let mut random = move || rng.next().expect("XorShift32 never ends");
    let mut keys = std::collections::BTreeSet::new();
    for (start, end) in PLAUSIBLE_RANGES {
        let span = end - start + 1;
        let wanted = (keys.len() + (count / PLAUSIBLE_RANGES.len()).min(span as usize)).min(count);
        while keys.len() < wanted {
            keys.insert(start + random() % span);
        }
    }
    while keys.len() < count {
        keys.insert(random() & MAX_CAN_ID);
    }
    keys.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (Vec<u32>, usize, String) {
        let mut warnings = Vec::new();
        let loaded = parse_keys(text.as_bytes(), &mut warnings).unwrap();
        (loaded.keys, loaded.skipped, String::from_utf8(warnings).unwrap())
    }

    #[test]
    fn formats_and_comments() {
        let (keys, skipped, warnings) = parse("\
# engine block\n\
0x100\n\
0X101\n\
258\n\
7DF # gateway, bare hex\n\
\n\
// skipped entirely\n\
0x200, 0x201,0x202\n");
        assert_eq!(keys, [0x100, 0x101, 258, 0x7DF, 0x200, 0x201, 0x202]);
        assert_eq!(skipped, 0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn out_of_range_ids_are_skipped_with_a_warning() {
        let (keys, skipped, warnings) = parse("0x100\n0x20000000\n0x1FFFFFFF\n");
        assert_eq!(keys, [0x100, 0x1FFF_FFFF]);
        assert_eq!(skipped, 1);
        assert_eq!(warnings, "Warning: CAN ID 0x20000000 out of range (line 2)\n");
    }

    #[test]
    fn unparseable_tokens_are_skipped_with_a_warning() {
        let (keys, skipped, warnings) = parse("0x100\nnot_an_id\n0x200, bad!, 0x201\n");
        assert_eq!(keys, [0x100, 0x200, 0x201]);
        assert_eq!(skipped, 2);
        assert!(warnings.contains("Invalid CAN ID format 'not_an_id' (line 2)"));
        assert!(warnings.contains("Invalid CAN ID format 'bad!' (line 3)"));
    }

    #[test]
    fn duplicates_survive_parsing() {
        // deduplication is the builder's job
        let (keys, _, _) = parse("0x100\n0x100\n");
        assert_eq!(keys, [0x100, 0x100]);
    }

    #[test]
    fn empty_input_yields_no_keys() {
        let (keys, skipped, _) = parse("# only comments\n\n");
        assert!(keys.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn generated_sets_are_distinct_sorted_and_in_range() {
        let keys = generate_test_can_ids(1000, 42);
        assert_eq!(keys.len(), 1000);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(keys.iter().all(|&k| k <= MAX_CAN_ID));
        // most keys come from the plausible ranges
        let plausible = keys.iter().filter(|&&k|
            PLAUSIBLE_RANGES.iter().any(|&(lo, hi)| (lo..=hi).contains(&k))).count();
        assert!(plausible >= 999, "only {} of 1000 in plausible ranges", plausible);
    }

    #[test]
    fn generation_is_reproducible() {
        assert_eq!(generate_test_can_ids(500, 42), generate_test_can_ids(500, 42));
        assert_ne!(generate_test_can_ids(500, 42), generate_test_can_ids(500, 43));
    }

    #[test]
    fn small_ranges_cannot_overflow_their_span() {
        // 9000/9 = 1000 wanted per range, but the ECU blocks hold 256 ids each
        let keys = generate_test_can_ids(9000, 7);
        assert_eq!(keys.len(), 9000);
        let in_first = keys.iter().filter(|&&k| (0x100..=0x1FF).contains(&k)).count();
        assert!(in_first >= 256, "only {} ids drawn from a 256-id block", in_first);
    }
}
