//! passbench Core - Pass Scheduling Engine
//!
//! This crate decides how many times a benchmarked workload runs and what a
//! run's result is:
//! - `Scheduler` runs passes until every metric settles or the ceiling is hit
//! - `PassController` lets workload code report into the running pass
//! - `ResultHistory` judges stability and computes trimmed averages
//! - `Configuration` is folded from sparse layers (file, env, type, method)
//!
//! ```
//! use passbench_core::{
//!     BuildInfo, ConfigLayer, Configuration, MinimumDuration, PassController, PassError,
//!     Scheduler,
//! };
//!
//! let layer = ConfigLayer::new()
//!     .with_project_name("demo")
//!     .with_duration(MinimumDuration::Disabled)
//!     .with_stable_passes(0)
//!     .with_runs_to_average(0);
//! let config = Configuration::resolve("Parser", "parse_small", [&layer]).unwrap();
//!
//! let mut scheduler = Scheduler::new(config, BuildInfo::local());
//! let mut workload = |ctl: &PassController| -> Result<(), PassError> {
//!     ctl.report_operations(100);
//!     Ok(())
//! };
//! let result = scheduler.run(&mut workload).unwrap();
//! assert_eq!(result.operations().unwrap(), 100.0);
//! ```

mod build;
mod config;
mod controller;
mod error;
mod history;
mod record;
mod scheduler;
mod sink;
mod timer;

pub use build::{BUILD_REVISION_VAR, BUILD_TIMESTAMP_VAR, BuildInfo};
pub use config::{
    CONFIG_FILE_NAME, ConfigLayer, Configuration, DEFAULT_REPORTS_DIR, Environment, FileConfig,
    HookMode, HumanDuration, MinimumDuration, OutputConfig, format_duration, parse_duration,
};
pub use controller::PassController;
pub use error::{BenchError, ConfigError, MetricError, PassError};
pub use history::ResultHistory;
pub use record::{Attribute, MetricRecord, TestIdentity};
pub use scheduler::{Phase, Scheduler, Workload};
pub use sink::{MemorySink, ResultSink, StorageError};
pub use timer::DurationAccumulator;
