//! Output module for harvest summaries and reports
//!
//! This module handles:
//! - Per-pass counts and the end-of-run summary
//! - Statistics over an existing dataset for the `stats` command

mod report;
pub mod stats;

pub use report::{HarvestReport, PassStats};
pub use stats::{load_statistics, print_statistics, DatasetStatistics};
