//! Collecting statistics on the salt search process.

use std::io::{Stderr, Write};

use crate::family::HashKind;

/// Number of failed attempts between the progress lines of [`SearchStatsPrinter`].
pub const REPORT_INTERVAL: u32 = 100_000;

/// Trait for collecting statistics on the salt search process.
///
/// All methods have no-op default implementations; `()` implements the trait
/// and ignores every event, which lets the optimizer remove the reporting code
/// from the search loop entirely.
pub trait SearchStatsCollector {
    /// Called when the search starts trying the `kind` family.
    #[inline(always)] fn family_start(&mut self, _kind: HashKind) {}
    /// Called after each failed attempt, with the number of salts tried so far for the current family.
    #[inline(always)] fn attempt(&mut self, _attempts: u32) {}
    /// Called when a collision-free salt is found, with the number of salts tried.
    #[inline(always)] fn found(&mut self, _kind: HashKind, _salt: u32, _attempts: u32) {}
    /// Called when the attempt budget of the `kind` family is exhausted.
    #[inline(always)] fn exhausted(&mut self, _kind: HashKind, _attempts: u32) {}
}

/// Ignores all events.
impl SearchStatsCollector for () {}

/// Prints statistics on the salt search to the given output (standard error by default).
///
/// Every line is prefixed with `# `, so progress can be interleaved with
/// machine-readable output on the same stream.
pub struct SearchStatsPrinter<W: Write = Stderr> {
    output: W,
}

impl SearchStatsPrinter<Stderr> {
    /// Returns a printer that writes to standard error.
    pub fn stderr() -> Self { Self { output: std::io::stderr() } }
}

impl<W: Write> SearchStatsPrinter<W> {
    /// Returns a printer that writes to `output`.
    pub fn new(output: W) -> Self { Self { output } }
}

impl<W: Write> SearchStatsCollector for SearchStatsPrinter<W> {
    fn family_start(&mut self, kind: HashKind) {
        writeln!(self.output, "# Searching for {} perfect hash...", kind).unwrap();
    }

    fn attempt(&mut self, attempts: u32) {
        if attempts % REPORT_INTERVAL == 0 {
            writeln!(self.output, "# Tried {} salts...", attempts).unwrap();
        }
    }

    fn found(&mut self, kind: HashKind, salt: u32, attempts: u32) {
        writeln!(self.output, "# Found {} perfect hash after {} attempts (salt 0x{:08X})",
            kind, attempts, salt).unwrap();
    }

    fn exhausted(&mut self, kind: HashKind, attempts: u32) {
        writeln!(self.output, "# Gave up on {} after {} attempts", kind, attempts).unwrap();
    }
}
