//! Emission of C artifacts for embedded lookup code.

use std::io;

use crate::family::HashKind;
use crate::flat::FlatFunction;

/// Writes a self-contained C header for `f`: hash parameters as defines, the hash
/// function, the reverse mapping table, a validation helper gated on that table,
/// the forward mapping as comments and a statistics getter.
///
/// The output is a pure function of `f`. It carries no timestamps or environment
/// details, so regenerating from the same key set, configuration and seed
/// reproduces the file byte for byte.
pub fn write_c_header(f: &FlatFunction, output: &mut dyn io::Write) -> io::Result<()> {
    writeln!(output, "#ifndef CAN_PERFECT_HASH_H")?;
    writeln!(output, "#define CAN_PERFECT_HASH_H")?;
    writeln!(output)?;
    writeln!(output, "/*")?;
    writeln!(output, " * Auto-generated perfect hash function for CAN IDs")?;
    writeln!(output, " * ================================================")?;
    writeln!(output, " *")?;
    writeln!(output, " * Hash algorithm: {}", f.kind())?;
    writeln!(output, " * Salt: 0x{:08X}", f.salt())?;
    writeln!(output, " * Number of CAN IDs: {}", f.len())?;
    writeln!(output, " * Table size: {}", f.table_size())?;
    writeln!(output, " * Load factor: {:.2}%", 100.0 * f.load_factor())?;
    writeln!(output, " *")?;
    writeln!(output, " * DO NOT EDIT THIS FILE MANUALLY!")?;
    writeln!(output, " * Regenerate with: canph_gen build")?;
    writeln!(output, " */")?;
    writeln!(output)?;
    writeln!(output, "#include <stdint.h>")?;
    writeln!(output)?;
    writeln!(output, "#ifdef __cplusplus")?;
    writeln!(output, "extern \"C\" {{")?;
    writeln!(output, "#endif")?;
    writeln!(output)?;
    writeln!(output, "// Perfect hash parameters")?;
    writeln!(output, "#define PERFECT_HASH_SALT 0x{:08X}U", f.salt())?;
    writeln!(output, "#define PERFECT_HASH_TABLE_SIZE {}", f.table_size())?;
    writeln!(output, "#define PERFECT_HASH_NUM_CAN_IDS {}", f.len())?;
    writeln!(output, "#define PERFECT_HASH_ALGORITHM \"{}\"", f.kind())?;
    writeln!(output)?;
    writeln!(output, "// Perfect hash function")?;
    write_hash_function(f, output)?;
    writeln!(output)?;
    writeln!(output, "// Reverse mapping: index -> CAN ID (0 in unused slots)")?;
    write_reverse_table(f.reverse_table(), output)?;
    writeln!(output)?;
    writeln!(output, "// Validation function")?;
    writeln!(output, "static inline int is_valid_can_id_for_perfect_hash(uint32_t can_id) {{")?;
    writeln!(output, "    uint32_t index = can_id_perfect_hash(can_id);")?;
    writeln!(output, "    return (index < PERFECT_HASH_TABLE_SIZE) && ")?;
    writeln!(output, "           (INDEX_TO_CAN_ID_MAP[index] == can_id);")?;
    writeln!(output, "}}")?;
    writeln!(output)?;
    writeln!(output, "// Forward mapping: CAN ID -> index")?;
    for (key, slot) in forward_mapping(f) {
        writeln!(output, "//   CAN ID 0x{:08X} -> index {}", key, slot)?;
    }
    writeln!(output)?;
    writeln!(output, "// Statistics")?;
    writeln!(output, "typedef struct {{")?;
    writeln!(output, "    uint32_t total_can_ids;")?;
    writeln!(output, "    uint32_t table_size;")?;
    writeln!(output, "    uint32_t salt;")?;
    writeln!(output, "    float load_factor;")?;
    writeln!(output, "    const char* algorithm;")?;
    writeln!(output, "}} PerfectHashStats;")?;
    writeln!(output)?;
    writeln!(output, "static inline PerfectHashStats get_perfect_hash_stats(void) {{")?;
    writeln!(output, "    PerfectHashStats stats = {{")?;
    writeln!(output, "        .total_can_ids = PERFECT_HASH_NUM_CAN_IDS,")?;
    writeln!(output, "        .table_size = PERFECT_HASH_TABLE_SIZE,")?;
    writeln!(output, "        .salt = PERFECT_HASH_SALT,")?;
    writeln!(output, "        .load_factor = (float)PERFECT_HASH_NUM_CAN_IDS / PERFECT_HASH_TABLE_SIZE,")?;
    writeln!(output, "        .algorithm = PERFECT_HASH_ALGORITHM")?;
    writeln!(output, "    }};")?;
    writeln!(output, "    return stats;")?;
    writeln!(output, "}}")?;
    writeln!(output)?;
    writeln!(output, "#ifdef __cplusplus")?;
    writeln!(output, "}}")?;
    writeln!(output, "#endif")?;
    writeln!(output)?;
    writeln!(output, "#endif // CAN_PERFECT_HASH_H")
}

/// Emits `can_id_perfect_hash`, a C function computing exactly what
/// [`HashKind::hash`] computes for the function's family, salt and table size.
fn write_hash_function(f: &FlatFunction, output: &mut dyn io::Write) -> io::Result<()> {
    writeln!(output, "static inline uint32_t can_id_perfect_hash(uint32_t can_id) {{")?;
    match f.kind() {
        HashKind::Multiplicative => {
            writeln!(output, "    return ((can_id ^ 0x{:08X}U) * 0x9E3779B9U) % {};", f.salt(), f.table_size())?;
        },
        HashKind::Jenkins => {
            writeln!(output, "    uint32_t key = can_id ^ 0x{:08X}U;", f.salt())?;
            writeln!(output, "    key = (~key) + (key << 21);")?;
            writeln!(output, "    key = key ^ (key >> 24);")?;
            writeln!(output, "    key = (key + (key << 3)) + (key << 8);")?;
            writeln!(output, "    key = key ^ (key >> 14);")?;
            writeln!(output, "    key = (key + (key << 2)) + (key << 4);")?;
            writeln!(output, "    key = key ^ (key >> 28);")?;
            writeln!(output, "    key = key + (key << 31);")?;
            writeln!(output, "    return key % {};", f.table_size())?;
        },
        HashKind::Murmur => {
            writeln!(output, "    uint32_t key = can_id ^ 0x{:08X}U;", f.salt())?;
            writeln!(output, "    key ^= key >> 16;")?;
            writeln!(output, "    key *= 0x85ebca6bU;")?;
            writeln!(output, "    key ^= key >> 13;")?;
            writeln!(output, "    key *= 0xc2b2ae35U;")?;
            writeln!(output, "    key ^= key >> 16;")?;
            writeln!(output, "    return key % {};", f.table_size())?;
        },
    }
    writeln!(output, "}}")
}

/// Emits `INDEX_TO_CAN_ID_MAP`, eight entries per row, each right-aligned to
/// twelve columns; unused slots render as plain `0`.
fn write_reverse_table(reverse: &[u32], output: &mut dyn io::Write) -> io::Result<()> {
    writeln!(output, "static const uint32_t INDEX_TO_CAN_ID_MAP[PERFECT_HASH_TABLE_SIZE] = {{")?;
    let last = reverse.len() - 1;
    for (row_nr, row) in reverse.chunks(8).enumerate() {
        let mut line = String::from("    ");
        for (nr_in_row, &key) in row.iter().enumerate() {
            let absolute = row_nr * 8 + nr_in_row;
            let entry = if key == 0 { "0".to_string() } else { format!("0x{:08X}U", key) };
            line.push_str(&format!("{:>12}", entry));
            if absolute < last { line.push(','); }
            if nr_in_row < 7 && absolute < last { line.push(' '); }
        }
        writeln!(output, "{}", line)?;
    }
    writeln!(output, "}};")
}

/// Key-to-slot pairs of `f`, ascending by key, recovered from the reverse table.
///
/// A slot holding `0` is either unused or maps the key `0`; the key count tells
/// the two cases apart.
fn forward_mapping(f: &FlatFunction) -> Vec<(u32, u32)> {
    let mut pairs: Vec<(u32, u32)> = f.reverse_table().iter().enumerate()
        .filter(|(_, &key)| key != 0)
        .map(|(slot, &key)| (key, slot as u32))
        .collect();
    if pairs.len() < f.len() {
        pairs.push((0, f.get(0)));
    }
    pairs.sort_unstable();
    pairs
}
