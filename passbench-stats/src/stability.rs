//! Stability Verdicts
//!
//! A series is stable when the spread between the lowest and highest value of
//! its pruned tail window stays within a percentage of the lowest value.

use crate::pruning::prune_window;
use crate::StatsError;

/// Outcome of checking one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stability {
    /// Lowest surviving value in the window
    pub first: f64,
    /// Highest surviving value in the window
    pub last: f64,
    /// `|last - first|`
    pub spread: f64,
    /// Spread as a percentage of `first`
    pub spread_percentage: f64,
    /// Whether `spread_percentage` is within the threshold
    pub stable: bool,
}

/// Spread between `first` and `last` as a percentage of `first`.
///
/// Two zeros are 0 %; any spread over a zero baseline is infinite.
pub fn spread_percentage(first: f64, last: f64) -> f64 {
    let spread = (last - first).abs();
    if spread == 0.0 {
        0.0
    } else if first == 0.0 {
        f64::INFINITY
    } else {
        spread * 100.0 / first.abs()
    }
}

/// Check the pruned tail window of size `window` against `threshold_pct`.
pub fn check_stability(
    samples: &[f64],
    window: usize,
    threshold_pct: f64,
) -> Result<Stability, StatsError> {
    let pruned = prune_window(samples, window)?;
    let (Some(first), Some(last)) = (pruned.first(), pruned.last()) else {
        return Err(StatsError::EmptyWindow);
    };

    let spread_percentage = spread_percentage(first, last);
    Ok(Stability {
        first,
        last,
        spread: (last - first).abs(),
        spread_percentage,
        stable: spread_percentage <= threshold_pct,
    })
}
