//! Birthday-bound feasibility analysis of the flat salt search.

use std::fmt::{self, Display, Formatter};

/// Success probabilities at or below this are reported as negligible:
/// no realistic attempt budget makes the search worth running.
pub const NEGLIGIBLE: f64 = 1e-10;

/// Probability that one uniformly random salt maps `key_count` keys into
/// `table_size` slots without any collision, by the birthday approximation
/// `exp(-n(n-1) / 2m)`.
pub fn success_probability(key_count: usize, table_size: u32) -> f64 {
    if key_count as u64 > table_size as u64 { return 0.0; }
    if key_count < 2 { return 1.0; }
    let n = key_count as f64;
    (-n * (n - 1.0) / (2.0 * table_size as f64)).exp()
}

/// Probability that one uniformly random salt produces at least one collision.
pub fn collision_probability(key_count: usize, table_size: u32) -> f64 {
    1.0 - success_probability(key_count, table_size)
}

/// Expected number of salt attempts until the first collision-free one, or
/// `None` when the success probability is not above [`NEGLIGIBLE`].
pub fn expected_attempts(key_count: usize, table_size: u32) -> Option<f64> {
    let p = success_probability(key_count, table_size);
    (p > NEGLIGIBLE).then(|| 1.0 / p)
}

/// Whether a flat search over `table_size` slots is expected to finish within
/// `max_attempts`, keeping a 4x margin over the expected attempt count.
pub fn is_feasible(key_count: usize, table_size: u32, max_attempts: u32) -> bool {
    match expected_attempts(key_count, table_size) {
        Some(expected) => expected * 4.0 <= max_attempts as f64,
        None => false,
    }
}

/// Feasibility figures of one `(key count, table size)` point.
#[derive(Copy, Clone, Debug)]
pub struct Feasibility {
    pub key_count: usize,
    pub table_size: u32,
    pub success_probability: f64,
    /// `None` when the success probability is negligible.
    pub expected_attempts: Option<f64>,
}

impl Feasibility {
    /// Computes the figures for `key_count` keys in `table_size` slots.
    pub fn of(key_count: usize, table_size: u32) -> Self {
        Self {
            key_count,
            table_size,
            success_probability: success_probability(key_count, table_size),
            expected_attempts: expected_attempts(key_count, table_size),
        }
    }

    /// Ratio of keys to slots.
    pub fn load_factor(&self) -> f64 {
        self.key_count as f64 / self.table_size as f64
    }

    /// Whether the search is expected to finish within `max_attempts`, see [`is_feasible`].
    pub fn feasible_within(&self, max_attempts: u32) -> bool {
        is_feasible(self.key_count, self.table_size, max_attempts)
    }
}

impl Display for Feasibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} keys in {} slots (load {:.3}): success probability {:.3e}",
            self.key_count, self.table_size, self.load_factor(), self.success_probability)?;
        match self.expected_attempts {
            Some(expected) => write!(f, ", ~{:.0} attempts expected", expected),
            None => f.write_str(", not worth searching"),
        }
    }
}
