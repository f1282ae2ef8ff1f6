//! Pass Controller
//!
//! The handle benchmark code uses to talk to the running pass: report
//! operations, fence the timer around the interesting part, and peek at the
//! scheduler's progress.
//!
//! The controller is passed explicitly to [`Workload::run`](crate::Workload::run).
//! For code that cannot take it as an argument, the active controller is also
//! bound to the current thread for the duration of each pass and can be
//! fetched with [`PassController::current`].
//!
//! The handle is `!Send`: it cannot outlive the thread its pass runs on.

use crate::error::{BenchError, MetricError};
use crate::record::{Attribute, MetricRecord};
use crate::scheduler::{Phase, RunState};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

thread_local! {
    static ACTIVE: RefCell<Option<PassController>> = const { RefCell::new(None) };
}

/// Access to the in-progress pass.
///
/// Methods take short borrows of the scheduler state, so calling back into
/// the controller from inside [`with_metrics`](Self::with_metrics) panics.
#[derive(Clone)]
pub struct PassController {
    state: Rc<RefCell<RunState>>,
}

impl PassController {
    pub(crate) fn new(state: Rc<RefCell<RunState>>) -> Self {
        Self { state }
    }

    /// Controller of the pass running on this thread, if any
    pub fn current() -> Option<PassController> {
        ACTIVE.with(|active| active.borrow().clone())
    }

    /// Make this controller the thread's active one until the guard drops
    pub(crate) fn bind(&self) -> BindingGuard {
        let previous = ACTIVE.with(|active| active.replace(Some(self.clone())));
        BindingGuard { previous }
    }

    /// Mutate the live record of the running pass
    pub fn with_metrics<R>(&self, f: impl FnOnce(&mut MetricRecord) -> R) -> R {
        f(&mut self.state.borrow_mut().current)
    }

    /// Snapshot of the live record, exactly as reported so far
    pub fn metrics(&self) -> MetricRecord {
        self.state.borrow().current.clone()
    }

    /// Snapshot of the live record with the running timer standing in for
    /// the duration when the pass has not set one.
    ///
    /// Throughput is derived from that duration, so it can be read while the
    /// pass is still timing.
    pub fn live_metrics(&self) -> MetricRecord {
        let state = self.state.borrow();
        let mut record = state.current.clone();
        if !record.is_set(Attribute::DurationNanos) {
            record.set_duration(state.timer.elapsed());
        }
        record
    }

    /// Duration of this pass: the value set with [`set_duration`](Self::set_duration),
    /// otherwise the time accumulated by the timer so far
    pub fn duration(&self) -> Duration {
        let state = self.state.borrow();
        state
            .current
            .duration()
            .unwrap_or_else(|_| state.timer.elapsed())
    }

    /// Throughput of this pass so far.
    ///
    /// Fails until operations have been reported and some time has been
    /// measured.
    pub fn ops_per_second(&self) -> Result<f64, MetricError> {
        self.live_metrics().ops_per_second()
    }

    /// Add `operations` to this pass's operation count
    pub fn report_operations(&self, operations: u64) {
        self.with_metrics(|record| record.add_operations(operations));
    }

    /// Override the measured duration of this pass
    pub fn set_duration(&self, duration: Duration) {
        self.with_metrics(|record| record.set_duration(duration));
    }

    /// Record the latency of a single operation.
    ///
    /// Samples are summarised into average/min/max/stddev latency when the
    /// pass ends, unless the pass sets the average latency itself.
    pub fn record_latency(&self, latency: Duration) {
        self.state
            .borrow_mut()
            .latencies
            .push(latency.as_nanos() as f64);
    }

    /// (Re)start the pass timer
    pub fn start_timer(&self) {
        self.state.borrow_mut().timer.start();
    }

    /// Stop the pass timer, optionally adding the window to the pass total
    pub fn stop_timer(&self, include_in_total: bool) {
        self.state.borrow_mut().timer.stop(include_in_total);
    }

    /// Time accumulated by this pass so far
    pub fn elapsed(&self) -> Duration {
        self.state.borrow().timer.elapsed()
    }

    /// Whether this pass has met the minimum duration
    pub fn has_run_long_enough(&self) -> bool {
        self.state.borrow().has_run_long_enough()
    }

    /// Whether the run would finish if this pass ended now.
    ///
    /// Nothing is changed: the check runs against a copy of the history with
    /// the live record appended. The error is the one the scheduler would
    /// raise (for example when the pass ceiling has been reached).
    pub fn is_done(&self) -> Result<bool, BenchError> {
        let mut preview = self.state.borrow().clone();
        preview.end_pass();
        preview.check_done()
    }

    /// Trimmed average of the passes completed so far
    pub fn average_results(&self) -> Result<MetricRecord, BenchError> {
        self.state.borrow().history.average()
    }

    /// Number of the running pass (restarts at 1 after warmup)
    pub fn current_pass(&self) -> u32 {
        self.state.borrow().current_pass
    }

    /// Whether the running pass is a warmup pass
    pub fn is_warmup(&self) -> bool {
        self.state.borrow().phase == Phase::Warmup
    }

    /// Shared state, for the scheduler
    pub(crate) fn state(&self) -> &Rc<RefCell<RunState>> {
        &self.state
    }
}

impl std::fmt::Debug for PassController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("PassController")
                .field("test", &state.current.identity().to_string())
                .field("phase", &state.phase)
                .field("current_pass", &state.current_pass)
                .finish(),
            Err(_) => f.write_str("PassController { <borrowed> }"),
        }
    }
}

/// Restores the previous thread binding when dropped
pub(crate) struct BindingGuard {
    previous: Option<PassController>,
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| *active.borrow_mut() = previous);
    }
}
