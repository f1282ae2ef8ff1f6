//! Pass Timing
//!
//! A stopwatch that sums several start/stop windows into one duration, so a
//! pass can exclude its own setup work from the measured interval.

use std::time::{Duration, Instant};

/// Wall-clock accumulator for one pass.
///
/// The total only grows when a start/stop pair completes with
/// `include_in_total`. Reading while running projects the open window on top
/// of the stored total without changing it.
#[derive(Debug, Clone, Default)]
pub struct DurationAccumulator {
    started: Option<Instant>,
    stopped: Option<Instant>,
    total: Duration,
}

impl DurationAccumulator {
    /// Create a stopped accumulator with nothing recorded
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window. Restarting while running discards the open window.
    #[inline]
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    /// Close the open window. No-op if not running.
    #[inline]
    pub fn stop(&mut self, include_in_total: bool) {
        let Some(started) = self.started else {
            return;
        };
        if self.stopped.is_some() {
            return;
        }
        let now = Instant::now();
        self.stopped = Some(now);
        if include_in_total {
            self.total += now.saturating_duration_since(started);
        }
    }

    /// Whether a window is currently open
    pub fn is_running(&self) -> bool {
        self.started.is_some() && self.stopped.is_none()
    }

    /// Accumulated time, including the open window if running
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.stopped) {
            (None, _) => Duration::ZERO,
            (Some(started), None) => self.total + started.elapsed(),
            (Some(_), Some(_)) => self.total,
        }
    }

    /// Forget everything (start of a new pass)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
