//! Summary Statistics
//!
//! Means over pruned windows, and plain summaries of per-operation samples
//! (used to turn latency samples into average/min/max/stddev).

use crate::pruning::prune_window;
use crate::StatsError;

/// Summary of a set of raw samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSummary {
    /// Arithmetic mean
    pub mean: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Sample standard deviation (n - 1); zero for fewer than two samples
    pub std_dev: f64,
    /// Number of samples summarised
    pub sample_count: usize,
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

/// Mean of the pruned tail window of size `window`.
///
/// A window of zero is not meaningful here (nothing would survive), so it
/// is rejected with [`StatsError::EmptyWindow`]. Callers that want "latest
/// value only" should read the last sample directly.
pub fn trimmed_mean(samples: &[f64], window: usize) -> Result<f64, StatsError> {
    if window == 0 {
        return Err(StatsError::EmptyWindow);
    }
    let pruned = prune_window(samples, window)?;
    mean(&pruned.values).ok_or(StatsError::EmptyWindow)
}

/// Compute a summary of raw samples
pub fn compute_summary(samples: &[f64]) -> SampleSummary {
    let Some(mean) = mean(samples) else {
        return SampleSummary::default();
    };

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let std_dev = if samples.len() < 2 {
        0.0
    } else {
        let variance =
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
        variance.sqrt()
    };

    SampleSummary {
        mean,
        min,
        max,
        std_dev,
        sample_count: samples.len(),
    }
}
