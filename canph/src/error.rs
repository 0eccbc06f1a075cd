use std::fmt;

/// Reasons why constructing a hash function can fail.
///
/// Buckets of [`TwoLevelFunction`](crate::TwoLevelFunction) that keep residual
/// collisions are not an error; they are reported through
/// [`TwoLevelStats`](crate::TwoLevelStats) as a quality figure.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BuildError {
    /// The key set was empty after sorting and deduplication.
    EmptyKeySet,
    /// The requested table has too few slots to map the key set injectively.
    TableTooSmall {
        /// Requested number of slots.
        table_size: u32,
        /// Number of distinct keys that had to fit.
        key_count: u32,
    },
    /// Every `(family, salt)` pair tried within the attempt budget collided.
    ///
    /// The table is too tight for this key set. The search never retries on its
    /// own; callers decide whether to grow the table (as
    /// [`FlatFunction::with_table_growth`](crate::FlatFunction::with_table_growth) does)
    /// or to switch to [`TwoLevelFunction`](crate::TwoLevelFunction).
    SaltsExhausted {
        /// Number of slots of the table searched against.
        table_size: u32,
        /// Salt attempts each family was given.
        max_attempts: u32,
        /// Number of hash families that exhausted the budget.
        families_tried: u8,
    },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyKeySet => f.write_str("the key set is empty"),
            BuildError::TableTooSmall { table_size, key_count } =>
                write!(f, "a table of {} slots cannot hold {} keys without collisions", table_size, key_count),
            BuildError::SaltsExhausted { table_size, max_attempts, families_tried } =>
                write!(f, "no collision-free salt found in {} attempts for each of {} families (table of {} slots); grow the table or use the two-level builder",
                    max_attempts, families_tried, table_size),
        }
    }
}

impl std::error::Error for BuildError {}
