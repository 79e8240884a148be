//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `ItemOutcome`: result of the fetch-and-enrich step for one item (ok, skipped, err)
//! - `PassState`: where the harvest is in its pass 1 → sweeps → done progression

mod outcome;
mod pass_state;

// Re-export main types
pub use outcome::{FailureKind, ItemOutcome};
pub use pass_state::PassState;
