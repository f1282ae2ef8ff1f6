//! Window Pruning
//!
//! Takes the most recent `window + 2` samples, sorts them and discards the
//! lowest and the highest position. Removal is positional: when the extremes
//! are tied, exactly one copy of each is dropped.
//!
//! Unlike IQR-style detection this never looks at the distribution shape, so a
//! single noisy pass on either side cannot leak into the result.

use crate::{PRUNED_PER_WINDOW, StatsError};

/// A pruned window of samples, sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PrunedWindow {
    /// Surviving samples, sorted ascending
    pub values: Vec<f64>,
    /// The low extreme that was discarded
    pub dropped_low: f64,
    /// The high extreme that was discarded
    pub dropped_high: f64,
}

impl PrunedWindow {
    /// Lowest surviving sample
    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    /// Highest surviving sample
    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Number of surviving samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no samples survived (only possible for `window == 0`)
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Prune the tail of `samples` down to `window` values.
///
/// `samples` must be in chronological order; only the last `window + 2`
/// entries are considered.
///
/// # Examples
///
/// ```
/// # use passbench_stats::prune_window;
/// let pruned = prune_window(&[5.0, 1.0, 2.0, 7.0, 2.0], 3).unwrap();
/// assert_eq!(pruned.values, vec![2.0, 2.0, 5.0]);
/// ```
pub fn prune_window(samples: &[f64], window: usize) -> Result<PrunedWindow, StatsError> {
    let needed = window + PRUNED_PER_WINDOW;
    if samples.len() < needed {
        return Err(StatsError::NotEnoughSamples {
            got: samples.len(),
            min: needed,
        });
    }

    let mut tail = samples[samples.len() - needed..].to_vec();
    tail.sort_by(|a, b| a.total_cmp(b));

    let dropped_low = tail.remove(0);
    let dropped_high = tail.pop().unwrap_or(dropped_low);

    Ok(PrunedWindow {
        values: tail,
        dropped_low,
        dropped_high,
    })
}
