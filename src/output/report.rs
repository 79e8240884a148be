//! Per-pass and end-of-run summaries

use crate::state::PassState;
use std::fmt;

/// Counts for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub state: PassState,
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PassStats {
    pub fn new(state: PassState, attempted: usize) -> Self {
        Self {
            state,
            attempted,
            succeeded: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} attempted, {} ok, {} skipped, {} failed",
            self.state, self.attempted, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Outcome of a whole harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Unique items handed to pass 1
    pub total_items: usize,
    pub passes: Vec<PassStats>,
    /// Size of the error ledger after the last pass
    pub remaining_errors: usize,
    /// Rows in the dataset snapshot, including records from prior runs
    pub dataset_rows: usize,
}

impl HarvestReport {
    /// Successes summed over every pass
    pub fn cumulative_successes(&self) -> usize {
        self.passes.iter().map(|p| p.succeeded).sum()
    }

    /// Skipped items left in the final ledger
    pub fn remaining_skipped(&self) -> usize {
        self.passes.last().map_or(0, |p| p.skipped)
    }

    /// Failed items left in the final ledger
    pub fn remaining_failed(&self) -> usize {
        self.passes.last().map_or(0, |p| p.failed)
    }

    pub fn log_summary(&self) {
        for pass in &self.passes {
            tracing::info!("{}", pass);
        }
        tracing::info!(
            "Harvest finished: {} items, {} successes across {} passes, {} remaining ({} skipped, {} failed), {} rows in dataset",
            self.total_items,
            self.cumulative_successes(),
            self.passes.len(),
            self.remaining_errors,
            self.remaining_skipped(),
            self.remaining_failed(),
            self.dataset_rows
        );
    }
}

impl fmt::Display for HarvestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Harvest Summary ===")?;
        writeln!(f)?;
        for pass in &self.passes {
            writeln!(f, "  {}", pass)?;
        }
        writeln!(f)?;
        writeln!(f, "Total items:          {}", self.total_items)?;
        writeln!(f, "Successes (all passes): {}", self.cumulative_successes())?;
        writeln!(
            f,
            "Remaining in ledger:  {} ({} skipped, {} failed)",
            self.remaining_errors,
            self.remaining_skipped(),
            self.remaining_failed()
        )?;
        write!(f, "Dataset rows:         {}", self.dataset_rows)
    }
}
