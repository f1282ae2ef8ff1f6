//! passbench Example Benchmarks
//!
//! This example shows the ways a workload can be handed to the harness and
//! serves as a template for your own benchmark binary.
//!
//! Run with:
//!   cargo run --example benchmarks
//!   PASSBENCH_MAX_PASSES=20 cargo run --example benchmarks
//!   PASSBENCH_BUILD_REVISION=42 cargo run --example benchmarks   # record as a CI build

use passbench::prelude::*;
use std::collections::HashMap;
use std::hint::black_box;
use std::time::{Duration, Instant};

// ============================================================================
// Closure workloads
// ============================================================================

fn collections() -> ConfigLayer {
    ConfigLayer::new()
        .with_project_name("passbench-examples")
        .with_warmup_passes(2)
        .with_duration(MinimumDuration::AtLeast(Duration::from_millis(50)))
}

fn bench_vector_sum(harness: &Harness) -> anyhow::Result<MetricRecord> {
    let bench = Benchmark::new("Collections", "vector_sum").type_layer(collections());
    let data: Vec<i64> = (0..10_000).collect();

    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        black_box(data.iter().sum::<i64>());
        ctl.report_operations(1);
        Ok(())
    };
    harness.run(&bench, &mut workload)
}

fn bench_hashmap_lookup(harness: &Harness) -> anyhow::Result<MetricRecord> {
    let bench = Benchmark::new("Collections", "hashmap_lookup")
        .type_layer(collections())
        .method_layer(ConfigLayer::new().with_stable_passes(3));
    let map: HashMap<u32, u32> = (0..1000).map(|i| (i, i * 2)).collect();

    let mut workload = |ctl: &PassController| -> Result<(), PassError> {
        let mut sum = 0u32;
        for i in 0..100 {
            if let Some(v) = map.get(&i) {
                sum = sum.wrapping_add(*v);
            }
        }
        black_box(sum);
        ctl.report_operations(100);
        Ok(())
    };
    harness.run(&bench, &mut workload)
}

// ============================================================================
// Struct workload with hooks and per-invocation latency
// ============================================================================

struct SortWorkload {
    input: Vec<u64>,
    scratch: Vec<u64>,
}

impl Workload for SortWorkload {
    fn setup(&mut self) -> Result<(), PassError> {
        self.scratch = Vec::with_capacity(self.input.len());
        Ok(())
    }

    fn run(&mut self, ctl: &PassController) -> Result<(), PassError> {
        // copying the input is not part of the measurement
        ctl.stop_timer(false);
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.input);
        ctl.start_timer();

        let started = Instant::now();
        self.scratch.sort_unstable();
        ctl.record_latency(started.elapsed());
        ctl.report_operations(1);
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), PassError> {
        if !self.scratch.windows(2).all(|w| w[0] <= w[1]) {
            return Err("scratch buffer is not sorted".into());
        }
        Ok(())
    }
}

fn bench_sort(harness: &Harness) -> anyhow::Result<MetricRecord> {
    let bench = Benchmark::new("Sorting", "sort_unstable").type_layer(
        collections()
            .with_hooks(HookMode::Once)
            .with_stability_percentage(10.0),
    );
    let mut workload = SortWorkload {
        input: (0..5_000u64).map(|i| i.wrapping_mul(2_654_435_761) % 10_007).collect(),
        scratch: Vec::new(),
    };
    harness.run(&bench, &mut workload)
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    passbench::init_logging(false);
    let harness = Harness::from_env()?;

    for result in [
        bench_vector_sum(&harness)?,
        bench_hashmap_lookup(&harness)?,
        bench_sort(&harness)?,
    ] {
        println!("{}", result);
    }
    Ok(())
}
