#![warn(missing_docs)]
//! # passbench
//!
//! Adaptive micro-benchmark runner: instead of "run N times and average",
//! passbench keeps running passes of a workload until the results settle.
//!
//! - **Warmup**: a configurable number of passes (or amount of time) is run
//!   and discarded before measuring starts
//! - **Stability**: the run ends once every reported metric varies by less
//!   than a threshold across a pruned window of recent passes
//! - **Trimmed averages**: the final value of each metric drops the fastest
//!   and slowest pass before averaging
//! - **Ceilings**: a run that never settles fails after `max_passes`
//! - **Storage**: results are logged, written as JSON snapshots and, for CI
//!   builds, appended to a per-project history
//!
//! ## Quick Start
//!
//! ```no_run
//! use passbench::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     passbench::init_logging(false);
//!     let harness = Harness::from_env()?;
//!
//!     let bench = Benchmark::new("Collections", "vec_sum")
//!         .method_layer(ConfigLayer::new().with_max_passes(50));
//!     let data: Vec<u64> = (0..10_000).collect();
//!     let mut workload = |ctl: &PassController| -> Result<(), PassError> {
//!         std::hint::black_box(data.iter().sum::<u64>());
//!         ctl.report_operations(1);
//!         Ok(())
//!     };
//!
//!     let result = harness.run(&bench, &mut workload)?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use anyhow::Context;
use std::sync::Arc;

// Re-export core types
pub use passbench_core::{
    Attribute, BenchError, BuildInfo, ConfigError, ConfigLayer, Configuration,
    DurationAccumulator, Environment, FileConfig, HookMode, MemorySink, MetricError,
    MetricRecord, MinimumDuration, PassController, PassError, Phase, ResultHistory, ResultSink,
    Scheduler, StorageError, TestIdentity, Workload,
};

// Re-export sinks and stored results
pub use passbench_report::{HistoryStore, JsonFileSink, LogSink, Recorder, StoredResult};

// Re-export stats
pub use passbench_stats::{SampleSummary, check_stability, compute_summary, prune_window};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Attribute, Benchmark, ConfigLayer, Harness, HookMode, MetricRecord, MinimumDuration,
        PassController, PassError, Workload,
    };
}

/// Install a `tracing` subscriber for passbench output.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        "passbench=debug"
    } else {
        "passbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// A named benchmark and its type- and method-level configuration
#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    type_name: String,
    method_name: String,
    type_layer: ConfigLayer,
    method_layer: ConfigLayer,
}

impl Benchmark {
    /// `type_name` becomes the default test name, `method_name` the default
    /// group name.
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
            ..Self::default()
        }
    }

    /// Settings shared by every benchmark of the type
    pub fn type_layer(mut self, layer: ConfigLayer) -> Self {
        self.type_layer = layer;
        self
    }

    /// Settings for this benchmark only; wins over the type layer
    pub fn method_layer(mut self, layer: ConfigLayer) -> Self {
        self.method_layer = layer;
        self
    }
}

/// Resolves the environment and build identity once, then runs benchmarks.
///
/// A harness is `Send + Sync`; share it across threads to run independent
/// benchmarks concurrently.
#[derive(Clone)]
pub struct Harness {
    env: Environment,
    build: BuildInfo,
    sink: Option<Arc<dyn ResultSink>>,
}

impl Harness {
    /// Harness for an explicit environment and build
    pub fn new(env: Environment, build: BuildInfo) -> Self {
        Self {
            env,
            build,
            sink: None,
        }
    }

    /// Discover `passbench.toml`, `PASSBENCH_*` variables and the build identity
    pub fn from_env() -> anyhow::Result<Self> {
        let env = Environment::load().context("Failed to load passbench configuration")?;
        let build = BuildInfo::from_env().context("Failed to resolve build identity")?;
        tracing::debug!(
            config = ?env.source,
            reports_dir = %env.reports_dir.display(),
            "{}",
            build
        );
        Ok(Self::new(env, build))
    }

    /// Send results to `sink` instead of the default [`Recorder`]
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Environment defaults in use
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Build identity stamped on every result
    pub fn build(&self) -> &BuildInfo {
        &self.build
    }

    /// Resolve the configuration of `bench`:
    /// defaults < environment < type layer < method layer
    pub fn configure(&self, bench: &Benchmark) -> Result<Configuration, ConfigError> {
        Configuration::resolve(
            &bench.type_name,
            &bench.method_name,
            [&self.env.defaults, &bench.type_layer, &bench.method_layer],
        )
    }

    /// Run `workload` to convergence and store the averaged result
    pub fn run<W: Workload + ?Sized>(
        &self,
        bench: &Benchmark,
        workload: &mut W,
    ) -> anyhow::Result<MetricRecord> {
        let config = self
            .configure(bench)
            .with_context(|| format!("Invalid configuration for {}", bench.type_name))?;

        let sink: Arc<dyn ResultSink> = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => Arc::new(Recorder::new(
                self.env.reports_dir.clone(),
                config.project_name.clone(),
            )),
        };
        let label = format!("{} - {}", config.group_name, config.test_name);

        let mut scheduler = Scheduler::new(config, self.build.clone()).with_sink(sink);
        scheduler
            .run(workload)
            .with_context(|| format!("Benchmark {} failed", label))
    }
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("env", &self.env)
            .field("build", &self.build)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}
