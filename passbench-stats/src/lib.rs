#![warn(missing_docs)]
//! passbench Statistical Engine
//!
//! Small, deterministic reductions used by the pass scheduler:
//! - Positional window pruning (drop one low and one high sample)
//! - Trimmed means over the pruned tail of a series
//! - Stability verdicts from the spread of a pruned window
//! - Plain summaries (mean/min/max/stddev) of raw samples

mod pruning;
mod stability;
mod summary;

pub use pruning::{PrunedWindow, prune_window};
pub use stability::{Stability, check_stability, spread_percentage};
pub use summary::{SampleSummary, compute_summary, mean, trimmed_mean};

use thiserror::Error;

/// Number of samples removed from every pruned window (one low, one high)
pub const PRUNED_PER_WINDOW: usize = 2;

/// Errors from the statistical reductions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Fewer samples than the window plus the pruned pair
    #[error("Not enough samples: got {got}, need at least {min}")]
    NotEnoughSamples {
        /// Samples supplied
        got: usize,
        /// Samples required
        min: usize,
    },

    /// Nothing left to reduce
    #[error("Window is empty after pruning")]
    EmptyWindow,
}
