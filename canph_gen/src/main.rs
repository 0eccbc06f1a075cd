#![doc = include_str!("../README.md")]

mod input;
use input::{generate_test_can_ids, parse_keys, LoadedKeys};

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use canph::analysis::{is_feasible, Feasibility};
use canph::emit::write_c_header;
use canph::{
    BuildError, Fixed, FlatFunction, GetSize, PaddedPow2, SearchConf, SearchStatsPrinter,
    TableSizer, TwoLevelConf, TwoLevelFunction, DEFAULT_MAX_ATTEMPTS,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cpu_time::ProcessTime;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Flat when the expected attempt count fits the budget, two-level otherwise
    Auto,
    /// Single table, one salt for the whole key set
    Flat,
    /// Bucketed construction with per-bucket salts
    TwoLevel,
}

#[derive(Args)]
pub struct BuildOpts {
    /// Write the C header to this file instead of standard output
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Construction strategy
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    pub strategy: Strategy,

    /// Salt attempts per hash family of the flat search
    #[arg(short = 'a', long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Seed of the salt sampler; a fixed seed reproduces the generated function
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Table size to use instead of the padded power of two; must exceed the key count
    #[arg(short = 't', long)]
    pub table_size: Option<u32>,

    /// Build the buckets of the two-level function on a single thread
    #[arg(long, default_value_t = false)]
    pub single_thread: bool,

    /// Save the binary form of the two-level function to this file
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a perfect hash function from a CAN identifier file
    Build {
        /// File with one or more CAN identifiers per line, hexadecimal or decimal
        file: PathBuf,
        #[command(flatten)]
        opts: BuildOpts,
    },
    /// Build a perfect hash function from generated test identifiers
    Test {
        /// Number of identifiers to generate
        #[arg(default_value_t = 1000)]
        count: usize,
        /// Seed of the identifier generator
        #[arg(long, default_value_t = 42)]
        gen_seed: u32,
        #[command(flatten)]
        opts: BuildOpts,
    },
    /// Print the expected difficulty of the flat salt search
    Analyze {
        /// Analyze this key count against its default table size, instead of the reference cases
        #[arg(short = 'n', long)]
        keys_num: Option<usize>,
    },
}

/// Perfect hash generator for CAN bus identifier sets.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Conf {
    #[command(subcommand)]
    pub command: Command,
}

/// `(key count, table size)` points of the difficulty table printed by `analyze`.
const REFERENCE_CASES: [(usize, u32); 8] = [
    (16, 32), (32, 64), (50, 64), (100, 128),
    (500, 512), (1000, 1024), (5000, 5120), (10000, 10240),
];

fn main() -> ExitCode {
    match run(Conf::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(conf: Conf) -> Result<(), String> {
    match conf.command {
        Command::Build { file, opts } => {
            let input = File::open(&file)
                .map_err(|e| format!("cannot read '{}': {}", file.display(), e))?;
            let LoadedKeys { keys, skipped } = parse_keys(BufReader::new(input), &mut io::stderr())
                .map_err(|e| format!("cannot read '{}': {}", file.display(), e))?;
            if skipped > 0 {
                eprintln!("# Skipped {} invalid entries of '{}'", skipped, file.display());
            }
            build(keys, &opts)
        }
        Command::Test { count, gen_seed, opts } => {
            eprintln!("# Generating test CAN IDs ({} entries)", count);
            build(generate_test_can_ids(count, gen_seed), &opts)
        }
        Command::Analyze { keys_num } => {
            analyze(keys_num);
            Ok(())
        }
    }
}

fn build(mut keys: Vec<u32>, opts: &BuildOpts) -> Result<(), String> {
    keys.sort_unstable();
    keys.dedup();
    if keys.is_empty() {
        return Err("No valid CAN IDs found".to_string());
    }
    let table_size = match opts.table_size {
        Some(size) => size,
        None => PaddedPow2::default().table_size(keys.len()),
    };
    let flat = match opts.strategy {
        Strategy::Flat => true,
        Strategy::TwoLevel => false,
        Strategy::Auto => is_feasible(keys.len(), table_size, opts.max_attempts),
    };
    if flat {
        build_flat(keys, table_size, opts)
    } else {
        if let Some(note) = ignored_table_size_note(opts.table_size) {
            eprintln!("{}", note);
        }
        build_two_level(keys, opts)
    }
}

/// Note printed when a requested table size cannot apply: the two-level builder
/// sizes each bucket from its own key count.
fn ignored_table_size_note(table_size: Option<u32>) -> Option<String> {
    table_size.map(|size| format!(
        "# Note: table size {} only applies to the flat strategy; the two-level builder sizes each bucket itself",
        size))
}

fn build_flat(keys: Vec<u32>, table_size: u32, opts: &BuildOpts) -> Result<(), String> {
    let conf = SearchConf { max_attempts: opts.max_attempts, seed: opts.seed };
    let start_process = ProcessTime::now();
    let start_wall = Instant::now();
    let f = FlatFunction::try_with_sizer_stats(
        keys, &Fixed(table_size), conf, &mut SearchStatsPrinter::stderr(),
    ).map_err(|e| match e {
        BuildError::SaltsExhausted { .. } =>
            format!("{}\nRetry with a larger -t or with --strategy two-level", e),
        other => other.to_string(),
    })?;
    let cpu = start_process.elapsed();
    let wall = start_wall.elapsed();
    eprintln!("# Successfully generated perfect hash function:");
    eprintln!("#   Algorithm: {}", f.kind());
    eprintln!("#   Salt: 0x{:08X}", f.salt());
    eprintln!("#   CAN IDs: {}", f.len());
    eprintln!("#   Table size: {}", f.table_size());
    eprintln!("#   Load factor: {:.2}%", 100.0 * f.load_factor());
    eprintln!("#   Size: {} bytes", f.size_bytes());
    eprintln!("#   Build time: {:.3}s CPU, {:.3}s wall", cpu.as_secs_f64(), wall.as_secs_f64());
    emit(&f, opts.output.as_deref())
}

fn build_two_level(keys: Vec<u32>, opts: &BuildOpts) -> Result<(), String> {
    let conf = TwoLevelConf::mt(!opts.single_thread);
    let start_process = ProcessTime::now();
    let start_wall = Instant::now();
    let f = TwoLevelFunction::try_from_keys(keys, &conf).map_err(|e| e.to_string())?;
    let cpu = start_process.elapsed();
    let wall = start_wall.elapsed();
    let stats = f.stats();
    eprintln!("# Generated two-level hash function:");
    eprintln!("#   {}", stats);
    eprintln!("#   Capacity: {} slots", f.capacity());
    eprintln!("#   Size: {} bytes", f.size_bytes());
    eprintln!("#   Build time: {:.3}s CPU, {:.3}s wall", cpu.as_secs_f64(), wall.as_secs_f64());
    if stats.imperfect_buckets > 0 {
        eprintln!("#   Note: {} buckets kept residual collisions", stats.imperfect_buckets);
    }
    if let Some(path) = &opts.save {
        let mut output = BufWriter::new(File::create(path)
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e))?);
        f.write(&mut output)
            .and_then(|()| output.flush())
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e))?;
        eprintln!("#   Saved to '{}' ({} bytes)", path.display(), f.write_bytes());
    }
    Ok(())
}

/// Writes the C header of `f` to the given file, or to standard output.
fn emit(f: &FlatFunction, output: Option<&std::path::Path>) -> Result<(), String> {
    match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)
                .map_err(|e| format!("cannot write '{}': {}", path.display(), e))?);
            write_c_header(f, &mut out)
                .and_then(|()| out.flush())
                .map_err(|e| format!("cannot write '{}': {}", path.display(), e))
        }
        None => {
            let stdout = io::stdout();
            write_c_header(f, &mut stdout.lock()).map_err(|e| e.to_string())
        }
    }
}

fn analyze(keys_num: Option<usize>) {
    match keys_num {
        Some(n) => {
            let table_size = PaddedPow2::default().table_size(n);
            print_case(Feasibility::of(n, table_size));
        }
        None => {
            println!("Difficulty of the flat salt search, by key count and table size:");
            for (n, m) in REFERENCE_CASES {
                print_case(Feasibility::of(n, m));
            }
        }
    }
}

fn print_case(case: Feasibility) {
    let verdict = if case.feasible_within(DEFAULT_MAX_ATTEMPTS) { "feasible" } else { "use two-level" };
    println!("{} [{}]", case, verdict);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_cases_split_between_strategies() {
        let feasible: Vec<bool> = REFERENCE_CASES.iter()
            .map(|&(n, m)| is_feasible(n, m, DEFAULT_MAX_ATTEMPTS)).collect();
        assert_eq!(feasible, [true, true, false, false, false, false, false, false]);
    }

    #[test]
    fn auto_strategy_switches_with_the_key_count() {
        // small sets search fast even at the padded sizes; the birthday bound
        // pushes everything beyond a few dozen keys to the two-level builder
        for n in [3usize, 10, 16] {
            let table_size = PaddedPow2::default().table_size(n);
            assert!(is_feasible(n, table_size, DEFAULT_MAX_ATTEMPTS), "{} keys", n);
        }
        for n in [100usize, 1000, 10_000] {
            let table_size = PaddedPow2::default().table_size(n);
            assert!(!is_feasible(n, table_size, DEFAULT_MAX_ATTEMPTS), "{} keys", n);
        }
    }

    #[test]
    fn requested_table_size_is_reported_when_ignored() {
        assert!(ignored_table_size_note(Some(4096)).unwrap().contains("table size 4096"));
        assert_eq!(ignored_table_size_note(None), None);
    }
}
