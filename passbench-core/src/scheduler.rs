//! Pass Scheduler
//!
//! The control loop: run a pass, file its record, ask whether the run has
//! converged, repeat. Warmup passes are run and then discarded; the run ends
//! once every attribute has settled and enough passes exist to average, or
//! fails when the pass ceiling is reached first.

use crate::build::BuildInfo;
use crate::config::{Configuration, HookMode};
use crate::controller::PassController;
use crate::error::{BenchError, PassError};
use crate::history::ResultHistory;
use crate::record::{Attribute, MetricRecord, TestIdentity};
use crate::sink::ResultSink;
use crate::timer::DurationAccumulator;
use passbench_stats::compute_summary;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A unit of benchmarked work.
///
/// `run` is invoked at least once per pass, and repeatedly while the pass is
/// shorter than the configured minimum duration. Each invocation is timed
/// unless it fences the timer itself through the controller.
pub trait Workload {
    /// Prepare state before a pass (or once before the run)
    fn setup(&mut self) -> Result<(), PassError> {
        Ok(())
    }

    /// Execute one invocation of the measured operation
    fn run(&mut self, ctl: &PassController) -> Result<(), PassError>;

    /// Release state after a pass (or once after the run)
    fn teardown(&mut self) -> Result<(), PassError> {
        Ok(())
    }
}

impl<F> Workload for F
where
    F: FnMut(&PassController) -> Result<(), PassError>,
{
    fn run(&mut self, ctl: &PassController) -> Result<(), PassError> {
        self(ctl)
    }
}

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Passes are run and then discarded
    Warmup,
    /// Passes count toward stability and the average
    Measuring,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Warmup => f.write_str("warmup"),
            Phase::Measuring => f.write_str("real"),
        }
    }
}

/// Everything one run mutates. Shared with the controller while passes run.
#[derive(Debug, Clone)]
pub(crate) struct RunState {
    pub(crate) config: Configuration,
    pub(crate) identity: TestIdentity,
    pub(crate) timer: DurationAccumulator,
    pub(crate) history: ResultHistory,
    pub(crate) current: MetricRecord,
    pub(crate) phase: Phase,
    pub(crate) current_pass: u32,
    pub(crate) latencies: Vec<f64>,
}

impl RunState {
    pub(crate) fn new(config: Configuration, build: BuildInfo) -> Self {
        let identity = TestIdentity::new(build, &config.group_name, &config.test_name);
        let history = ResultHistory::new(
            config.runs_to_average as usize,
            config.stable_passes as usize,
            config.stability_percentage,
        );
        let phase = if config.skips_warmup() {
            Phase::Measuring
        } else {
            Phase::Warmup
        };
        Self {
            current: MetricRecord::new(identity.clone()),
            identity,
            timer: DurationAccumulator::new(),
            history,
            phase,
            current_pass: 0,
            latencies: Vec::new(),
            config,
        }
    }

    /// Back to the state before the first pass
    fn restart(&mut self) {
        *self = Self::new(self.config.clone(), self.identity.build.clone());
    }

    pub(crate) fn has_run_long_enough(&self) -> bool {
        self.config.min_duration.is_met(self.timer.elapsed())
    }

    pub(crate) fn begin_pass(&mut self) {
        self.current_pass += 1;
        self.timer.reset();
        self.current = MetricRecord::new(self.identity.clone());
        self.latencies.clear();
    }

    /// Fill in what the pass did not report and file the record
    pub(crate) fn end_pass(&mut self) {
        if !self.current.is_set(Attribute::DurationNanos) {
            self.current.set_duration(self.timer.elapsed());
        }
        if !self.latencies.is_empty() && !self.current.is_set(Attribute::LatencyNanos) {
            let summary = compute_summary(&self.latencies);
            self.current.set_latency_nanos(summary.mean);
            self.current.set_min_latency_nanos(summary.min);
            self.current.set_max_latency_nanos(summary.max);
            self.current.set_stddev_latency_nanos(summary.std_dev);
        }
        let record = std::mem::replace(
            &mut self.current,
            MetricRecord::new(self.identity.clone()),
        );
        self.history.push(record);
    }

    /// Decide whether the run has converged.
    ///
    /// Ending warmup is a side effect of this check: the warmup records are
    /// dropped and pass numbering restarts.
    pub(crate) fn check_done(&mut self) -> Result<bool, BenchError> {
        if !self.has_run_long_enough() {
            return Ok(false);
        }

        if self.phase == Phase::Warmup {
            if self.current_pass < self.config.warmup_passes
                || self.history.total_duration() < self.config.warmup_duration
            {
                return Ok(false);
            }
            debug!(
                test = %self.identity,
                passes = self.current_pass,
                "warmup complete"
            );
            self.history.clear();
            self.phase = Phase::Measuring;
            self.current_pass = 0;
        }

        if self.history.is_stable() && self.history.has_enough_results() {
            return Ok(self.current_pass > 0);
        }

        if self.current_pass >= self.config.max_passes {
            return Err(BenchError::ExceededMaxPasses {
                test: self.identity.to_string(),
                max_passes: self.config.max_passes,
            });
        }

        Ok(false)
    }
}

/// Runs one test to convergence
pub struct Scheduler {
    state: RunState,
    sink: Option<Arc<dyn ResultSink>>,
}

impl Scheduler {
    /// Scheduler for a resolved configuration and build
    pub fn new(config: Configuration, build: BuildInfo) -> Self {
        Self {
            state: RunState::new(config, build),
            sink: None,
        }
    }

    /// Hand the averaged result to `sink` when the run finishes
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.state.config
    }

    pub fn identity(&self) -> &TestIdentity {
        &self.state.identity
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Passes run in the current phase
    pub fn current_pass(&self) -> u32 {
        self.state.current_pass
    }

    /// Records of the measuring passes (or warmup passes, mid-warmup)
    pub fn history(&self) -> &ResultHistory {
        &self.state.history
    }

    /// Run `workload` until the results converge and return the trimmed
    /// average, which is also handed to the sink.
    pub fn run<W: Workload + ?Sized>(&mut self, workload: &mut W) -> Result<MetricRecord, BenchError> {
        self.state.restart();
        info!("Running {}", self.state.identity);

        let shared = Rc::new(RefCell::new(self.state.clone()));
        let controller = PassController::new(Rc::clone(&shared));
        let outcome = match self.state.config.hooks {
            HookMode::EachPass => run_passes(&controller, workload, true),
            HookMode::Once => {
                let result = hook(&controller, workload.setup())
                    .and_then(|()| run_passes(&controller, workload, false));
                let teardown = hook(&controller, workload.teardown());
                result.and(teardown)
            }
        };
        drop(controller);

        // A controller kept alive by the workload still holds the state
        self.state = Rc::try_unwrap(shared)
            .map(RefCell::into_inner)
            .unwrap_or_else(|shared| shared.borrow().clone());
        outcome?;

        let average = self.state.history.average()?;
        info!(
            passes = self.state.current_pass,
            "Finished {}: {}", self.state.identity, average
        );
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.store(&average) {
                error!("Error storing test results for {}: {}", self.state.identity, e);
            }
        }
        Ok(average)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("test", &self.state.identity.to_string())
            .field("phase", &self.state.phase)
            .field("current_pass", &self.state.current_pass)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

fn run_passes<W: Workload + ?Sized>(
    controller: &PassController,
    workload: &mut W,
    hooks_each_pass: bool,
) -> Result<(), BenchError> {
    loop {
        if controller.state().borrow_mut().check_done()? {
            return Ok(());
        }
        run_pass(controller, workload, hooks_each_pass)?;
    }
}

fn run_pass<W: Workload + ?Sized>(
    controller: &PassController,
    workload: &mut W,
    hooks_each_pass: bool,
) -> Result<(), BenchError> {
    {
        let mut state = controller.state().borrow_mut();
        state.begin_pass();
        info!(
            phase = %state.phase,
            pass = state.current_pass,
            "Running {} pass for {}", state.phase, state.identity
        );
    }
    let _binding = controller.bind();

    if hooks_each_pass {
        hook(controller, workload.setup())?;
    }
    let result = invoke_until_long_enough(controller, workload);
    if hooks_each_pass {
        let teardown = hook(controller, workload.teardown());
        result?;
        teardown?;
    } else {
        result?;
    }

    controller.state().borrow_mut().end_pass();
    Ok(())
}

fn invoke_until_long_enough<W: Workload + ?Sized>(
    controller: &PassController,
    workload: &mut W,
) -> Result<(), BenchError> {
    loop {
        controller.start_timer();
        let result = workload.run(controller);
        controller.stop_timer(true);
        hook(controller, result)?;
        if controller.has_run_long_enough() {
            return Ok(());
        }
    }
}

fn hook(controller: &PassController, result: Result<(), PassError>) -> Result<(), BenchError> {
    result.map_err(|source| {
        let state = controller.state().borrow();
        BenchError::Pass {
            test: state.identity.to_string(),
            pass: state.current_pass,
            source,
        }
    })
}
