//! Integration tests for passbench
//!
//! These tests drive whole runs through the harness and check what ends up
//! in the sinks and on disk.

use passbench::prelude::*;
use passbench::{
    BenchError, BuildInfo, Environment, HistoryStore, MemorySink, Recorder, ResultSink,
};
use std::sync::Arc;
use std::time::Duration;

fn quick_layer() -> ConfigLayer {
    ConfigLayer::new()
        .with_project_name("integration")
        .with_duration(MinimumDuration::Disabled)
}

fn harness(dir: &std::path::Path, build: BuildInfo) -> Harness {
    Harness::new(
        Environment {
            defaults: quick_layer(),
            reports_dir: dir.to_path_buf(),
            source: None,
        },
        build,
    )
}

fn ci_build(revision: u64) -> BuildInfo {
    BuildInfo::new(Some(revision), chrono_epoch())
}

fn chrono_epoch() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::UNIX_EPOCH
}

/// Warmup, stability and averaging together: 2 warmup passes are discarded,
/// then the run settles on the scripted values.
#[test]
fn test_full_run_with_warmup() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let harness = harness(dir.path(), ci_build(1)).with_sink(sink.clone());

    let bench = Benchmark::new("Scripted", "ops").method_layer(
        ConfigLayer::new()
            .with_warmup_passes(2)
            .with_stable_passes(3)
            .with_runs_to_average(3),
    );
    let script = [1000u64, 1000, 5, 1, 2, 7, 2, 2, 2, 2];
    let mut pass = 0usize;
    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        ctl.report_operations(script[pass.min(script.len() - 1)]);
        ctl.set_duration(Duration::from_secs(1));
        pass += 1;
        Ok(())
    };

    let result = harness.run(&bench, &mut workload).unwrap();

    // measured [5, 1, 2, 7, 2] prunes to [2, 2, 5]; one more 2 gives [2, 2, 2]
    assert_eq!(pass, 8);
    assert!((result.ops_per_second().unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(sink.records(), vec![result]);
}

#[test]
fn test_reference_average_through_harness() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path(), ci_build(1)).with_sink(Arc::new(MemorySink::new()));
    let bench = Benchmark::new("Reference", "ops").method_layer(
        ConfigLayer::new()
            .with_stable_passes(0)
            .with_runs_to_average(3),
    );
    let script = [5u64, 1, 2, 7, 2];
    let mut pass = 0usize;
    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        ctl.report_operations(script[pass]);
        ctl.set_duration(Duration::from_secs(1));
        pass += 1;
        Ok(())
    };

    let result = harness.run(&bench, &mut workload).unwrap();
    assert!((result.ops_per_second().unwrap() - 3.0).abs() < 1e-9);
}

#[test]
fn test_unstable_benchmark_fails() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path(), ci_build(1)).with_sink(Arc::new(MemorySink::new()));
    let bench = Benchmark::new("Noisy", "ops").method_layer(
        ConfigLayer::new()
            .with_max_passes(8)
            .with_stable_passes(2)
            .with_runs_to_average(1),
    );
    let mut pass = 0u32;
    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        pass += 1;
        ctl.report_operations(3u64.pow(pass));
        Ok(())
    };

    let err = harness.run(&bench, &mut workload).unwrap_err();
    let bench_err = err.downcast_ref::<BenchError>().unwrap();
    assert!(matches!(
        bench_err,
        BenchError::ExceededMaxPasses { max_passes: 8, .. }
    ));
    assert_eq!(pass, 8);
}

#[test]
fn test_ci_results_are_recorded_and_dumped() {
    let dir = tempfile::tempdir().unwrap();
    let bench = Benchmark::new("Parser", "parse").method_layer(
        ConfigLayer::new()
            .with_stable_passes(0)
            .with_runs_to_average(0),
    );

    for revision in 1..=3u64 {
        let harness = harness(dir.path(), ci_build(revision));
        let mut workload = move |ctl: &PassController| -> Result<(), PassError> {
            ctl.report_operations(revision * 10);
            ctl.set_duration(Duration::from_secs(1));
            Ok(())
        };
        harness.run(&bench, &mut workload).unwrap();
    }

    let store = HistoryStore::new(dir.path());
    assert_eq!(store.load("integration").unwrap().len(), 3);

    let out = dir.path().join("csv");
    passbench_report::dump_recent_builds(&store, "integration", 2, &out).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.join("parse").join("Parser.csv")).unwrap(),
        "2,20\n3,30\n"
    );
}

#[test]
fn test_local_results_are_not_added_to_history() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path(), BuildInfo::new(None, chrono_epoch()));
    let bench = Benchmark::new("Local", "run").method_layer(
        ConfigLayer::new()
            .with_stable_passes(0)
            .with_runs_to_average(0),
    );
    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        ctl.report_operations(1);
        Ok(())
    };
    harness.run(&bench, &mut workload).unwrap();

    let recorder = Recorder::new(dir.path(), "integration");
    assert!(recorder.snapshots().path_for("run", "Local").is_file());
    assert!(recorder.history().load("integration").unwrap().is_empty());
}

struct FailingSink;

impl ResultSink for FailingSink {
    fn store(&self, _record: &MetricRecord) -> Result<(), passbench::StorageError> {
        Err(passbench::StorageError::Serialize("unavailable".to_string()))
    }
}

#[test]
fn test_storage_failure_does_not_fail_the_benchmark() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path(), ci_build(1)).with_sink(Arc::new(FailingSink));
    let bench = Benchmark::new("Stored", "nowhere").method_layer(
        ConfigLayer::new()
            .with_stable_passes(0)
            .with_runs_to_average(0),
    );
    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        ctl.report_operations(1);
        Ok(())
    };
    assert!(harness.run(&bench, &mut workload).is_ok());
}

#[test]
fn test_concurrent_benchmarks_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());
    let harness = Arc::new(harness(dir.path(), ci_build(9)).with_sink(sink.clone()));

    let handles: Vec<_> = (1..=4u64)
        .map(|n| {
            let harness = Arc::clone(&harness);
            std::thread::spawn(move || {
                let bench = Benchmark::new(format!("Thread{n}"), "concurrent").method_layer(
                    ConfigLayer::new()
                        .with_stable_passes(2)
                        .with_runs_to_average(2),
                );
                let mut workload = |ctl: &PassController| -> Result<(), PassError> {
                    ctl.report_operations(n);
                    ctl.set_duration(Duration::from_secs(1));
                    Ok(())
                };
                harness.run(&bench, &mut workload).unwrap()
            })
        })
        .collect();

    for (n, handle) in (1..=4u64).zip(handles) {
        let result = handle.join().unwrap();
        assert_eq!(result.test_name(), format!("Thread{n}"));
        assert_eq!(result.ops_per_second().unwrap(), n as f64);
    }
    assert_eq!(sink.records().len(), 4);
}

/// A workload that fences its own setup out of the measured time
struct SortWorkload {
    input: Vec<u64>,
    setups: usize,
}

impl Workload for SortWorkload {
    fn setup(&mut self) -> Result<(), PassError> {
        self.setups += 1;
        Ok(())
    }

    fn run(&mut self, ctl: &PassController) -> Result<(), PassError> {
        let mut data = self.input.clone();
        ctl.stop_timer(false);
        ctl.start_timer();
        data.sort_unstable();
        ctl.report_operations(1);
        ctl.record_latency(Duration::from_nanos(100));
        Ok(())
    }
}

#[test]
fn test_struct_workload_with_hooks_once() {
    let dir = tempfile::tempdir().unwrap();
    let harness = harness(dir.path(), ci_build(1)).with_sink(Arc::new(MemorySink::new()));
    let bench = Benchmark::new("Sort", "unstable").type_layer(
        ConfigLayer::new()
            .with_hooks(HookMode::Once)
            .with_stable_passes(0)
            .with_runs_to_average(1),
    );
    let mut workload = SortWorkload {
        input: (0..1000).rev().collect(),
        setups: 0,
    };

    let result = harness.run(&bench, &mut workload).unwrap();
    assert_eq!(workload.setups, 1);
    assert_eq!(result.latency_nanos().unwrap(), 100.0);
    assert_eq!(result.plottable().unwrap().0, Attribute::OpsPerSecond);
}
