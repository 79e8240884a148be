/// Pass progression for a harvest run
///
/// `Pass1` fans out over the full item list. Each `Sweep(i)` retries only the
/// items in the current error ledger, serially and with slower throttling.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassState {
    /// Concurrent first pass over every item
    Pass1,

    /// Serial retry pass number `i` (1-based) over the error ledger
    Sweep(u32),

    /// No further passes
    Done,
}

impl PassState {
    /// State entered once the current pass has finished
    ///
    /// Pass 1 always hands over to sweep 1 when any sweep is allowed. A sweep
    /// ends the run when nothing is left to retry or the budget is spent.
    pub fn after_pass(self, remaining_errors: usize, max_sweeps: u32) -> Self {
        match self {
            Self::Pass1 if max_sweeps == 0 => Self::Done,
            Self::Pass1 => Self::Sweep(1),
            Self::Sweep(i) if remaining_errors == 0 || i >= max_sweeps => Self::Done,
            Self::Sweep(i) => Self::Sweep(i + 1),
            Self::Done => Self::Done,
        }
    }

    /// Checks the ledger read at the start of a sweep
    ///
    /// An empty ledger means there is nothing to sweep.
    pub fn on_sweep_start(self, ledger_len: usize) -> Self {
        match self {
            Self::Sweep(_) if ledger_len == 0 => Self::Done,
            other => other,
        }
    }

    pub fn is_sweep(&self) -> bool {
        matches!(self, Self::Sweep(_))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Ordinal of the pass across the whole run (pass 1 is 1, sweep 1 is 2)
    pub fn pass_number(&self) -> Option<u32> {
        match self {
            Self::Pass1 => Some(1),
            Self::Sweep(i) => Some(i + 1),
            Self::Done => None,
        }
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass1 => write!(f, "pass 1"),
            Self::Sweep(i) => write!(f, "sweep {}", i),
            Self::Done => write!(f, "done"),
        }
    }
}
