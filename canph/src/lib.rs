#![doc = include_str!("../README.md")]

pub mod family;
pub use family::HashKind;

pub mod sizer;
pub use sizer::{TableSizer, PaddedPow2, Fixed};

pub mod search;
pub use search::{SearchConf, Assignment, search, best_assignment, DEFAULT_MAX_ATTEMPTS};

pub mod flat;
pub use flat::FlatFunction;

pub mod twolevel;
pub use twolevel::{TwoLevelConf, TwoLevelFunction, TwoLevelStats};

pub mod stats;
pub use stats::{SearchStatsCollector, SearchStatsPrinter};

pub mod analysis;

pub mod emit;

mod error;
pub use error::BuildError;

mod utils;

pub use dyn_size_of::GetSize;
