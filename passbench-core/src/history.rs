//! Result History
//!
//! Per-pass records of the test currently running, with the two questions the
//! scheduler asks of them: "has every attribute settled?" and "what is the
//! trimmed average?".

use crate::error::BenchError;
use crate::record::{Attribute, MetricRecord};
use passbench_stats::{PRUNED_PER_WINDOW, StatsError, check_stability, mean, trimmed_mean};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Ordered per-pass results for one test
#[derive(Debug, Clone)]
pub struct ResultHistory {
    records: Vec<MetricRecord>,
    runs_to_average: usize,
    stable_passes: usize,
    stability_percentage: f64,
}

impl ResultHistory {
    /// Create an empty history.
    ///
    /// `runs_to_average == 0` averages only the latest pass;
    /// `stable_passes == 0` disables the stability check.
    pub fn new(runs_to_average: usize, stable_passes: usize, stability_percentage: f64) -> Self {
        Self {
            records: Vec::new(),
            runs_to_average,
            stable_passes,
            stability_percentage,
        }
    }

    /// Append a finished pass
    pub fn push(&mut self, record: MetricRecord) {
        debug_assert!(
            self.records
                .first()
                .is_none_or(|first| first.identity() == record.identity()),
            "history mixes test identities"
        );
        self.records.push(record);
    }

    /// Drop all records (end of warmup)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&MetricRecord> {
        self.records.last()
    }

    /// Sum of recorded pass durations; passes without a duration count as zero.
    pub fn total_duration(&self) -> Duration {
        self.records
            .iter()
            .filter_map(|r| r.duration().ok())
            .sum()
    }

    /// Every attribute reported by at least one pass
    pub fn attributes(&self) -> BTreeSet<Attribute> {
        self.records
            .iter()
            .flat_map(|r| r.attributes().map(|(a, _)| a))
            .collect()
    }

    /// Chronological values of `attribute`, skipping passes that did not report it
    pub fn values_for(&self, attribute: Attribute) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| r.get(attribute).ok())
            .collect()
    }

    /// Whether enough passes exist to average `runs_to_average` of them
    pub fn has_enough_results(&self) -> bool {
        self.runs_to_average == 0 || self.records.len() >= self.runs_to_average + PRUNED_PER_WINDOW
    }

    /// Whether the pruned tail window of every attribute is within the
    /// stability threshold.
    pub fn is_stable(&self) -> bool {
        if self.stable_passes == 0 {
            return true;
        }
        if self.records.len() < self.stable_passes + PRUNED_PER_WINDOW {
            return false;
        }

        self.attributes()
            .into_iter()
            .all(|attribute| self.is_attribute_stable(attribute))
    }

    fn is_attribute_stable(&self, attribute: Attribute) -> bool {
        let values = self.values_for(attribute);
        match check_stability(&values, self.stable_passes, self.stability_percentage) {
            Ok(verdict) if verdict.stable => true,
            Ok(verdict) => {
                tracing::info!(
                    attribute = %attribute,
                    spread = verdict.spread,
                    "Result for {} was too different: {} ({:.2}%)",
                    attribute,
                    verdict.spread,
                    verdict.spread_percentage
                );
                false
            }
            Err(StatsError::NotEnoughSamples { got, min }) => {
                tracing::debug!(%attribute, got, min, "not enough samples to judge stability");
                false
            }
            Err(StatsError::EmptyWindow) => false,
        }
    }

    /// Trimmed per-attribute average of the history.
    ///
    /// Each attribute is pruned and averaged on its own, so derived values
    /// (ops/sec) are averaged as reported rather than recomputed from the
    /// averaged inputs.
    pub fn average(&self) -> Result<MetricRecord, BenchError> {
        let Some(first) = self.records.first() else {
            return Err(BenchError::EmptyHistory);
        };

        let mut averages = BTreeMap::new();
        for attribute in self.attributes() {
            let values = self.values_for(attribute);
            if let Some(average) = self.average_values(&values) {
                averages.insert(attribute, average);
            }
        }

        Ok(MetricRecord::from_attribute_map(
            first.identity().clone(),
            averages,
        ))
    }

    fn average_values(&self, values: &[f64]) -> Option<f64> {
        if self.runs_to_average == 0 {
            return values.last().copied();
        }
        match trimmed_mean(values, self.runs_to_average) {
            Ok(average) => Some(average),
            // Attribute reported by too few passes to prune
            Err(_) => mean(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildInfo;
    use crate::record::TestIdentity;
    use chrono::DateTime;

    fn identity() -> TestIdentity {
        TestIdentity::new(
            BuildInfo::new(Some(7), DateTime::UNIX_EPOCH),
            "history",
            "test",
        )
    }

    fn pass(operations: u64, duration_nanos: u64) -> MetricRecord {
        let mut record = MetricRecord::new(identity());
        record.set_operations(operations);
        record.set_duration_nanos(duration_nanos);
        record
    }

    fn history_of(ops: &[u64], runs_to_average: usize, stable_passes: usize) -> ResultHistory {
        let mut history = ResultHistory::new(runs_to_average, stable_passes, 5.0);
        for &o in ops {
            history.push(pass(o, 1_000_000_000));
        }
        history
    }

    #[test]
    fn test_stability_disabled_is_always_stable() {
        assert!(history_of(&[], 3, 0).is_stable());
        assert!(history_of(&[1, 100], 3, 0).is_stable());
    }

    #[test]
    fn test_constant_values_stable_at_window_plus_two() {
        let mut history = ResultHistory::new(1, 3, 5.0);
        for n in 1..=5 {
            history.push(pass(10, 1_000));
            assert_eq!(history.is_stable(), n >= 5, "after {} passes", n);
        }
    }

    #[test]
    fn test_one_unstable_attribute_fails_the_check() {
        // operations stay constant, memory window [200, 300] spreads 50%
        let mut history = ResultHistory::new(1, 2, 5.0);
        for memory in [100, 200, 300, 400] {
            let mut record = pass(10, 1_000);
            record.set_memory_bytes(memory);
            history.push(record);
        }
        assert!(!history.is_stable());
    }

    #[test]
    fn test_outliers_are_pruned_before_stability() {
        // last 5: [3, 1, 2, 4, 2] -> sorted [1, 2, 2, 3, 4] -> window [2, 2, 3]
        let history = history_of(&[3, 1, 2, 4, 2], 1, 3);
        assert!(!history.is_stable());

        // last 5: [1, 2, 4, 2, 2] -> window [2, 2, 2]
        let history = history_of(&[3, 1, 2, 4, 2, 2], 1, 3);
        assert!(history.is_stable());
    }

    #[test]
    fn test_has_enough_results() {
        assert!(history_of(&[], 0, 0).has_enough_results());
        assert!(!history_of(&[1, 2, 3, 4], 3, 0).has_enough_results());
        assert!(history_of(&[1, 2, 3, 4, 5], 3, 0).has_enough_results());
    }

    #[test]
    fn test_reference_average() {
        let history = history_of(&[5, 1, 2, 7, 2], 3, 0);
        let average = history.average().unwrap();

        assert!((average.operations().unwrap() - 3.0).abs() < 1e-9);
        assert!((average.ops_per_second().unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(average.duration_nanos().unwrap(), 1_000_000_000.0);
        assert_eq!(average.identity(), &identity());
    }

    #[test]
    fn test_zero_runs_to_average_takes_latest() {
        let history = history_of(&[5, 1, 2, 7, 2, 9], 0, 0);
        let average = history.average().unwrap();
        assert_eq!(average.operations().unwrap(), 9.0);
        assert_eq!(average.ops_per_second().unwrap(), 9.0);
    }

    #[test]
    fn test_attributes_are_averaged_independently() {
        let mut history = ResultHistory::new(1, 0, 5.0);
        for (ops, nanos) in [(1, 1_000), (2, 4_000), (3, 1_000)] {
            history.push(pass(ops, nanos));
        }
        // operations window [2], duration window [1000] (sorted [1000, 1000, 4000])
        // ops/sec window sorted [5e5, 1e6, 3e6] -> [1e6]
        let average = history.average().unwrap();
        assert_eq!(average.operations().unwrap(), 2.0);
        assert_eq!(average.duration_nanos().unwrap(), 1_000.0);
        assert_eq!(average.ops_per_second().unwrap(), 1_000_000.0);
    }

    #[test]
    fn test_sparse_attribute_falls_back_to_plain_mean() {
        let mut history = history_of(&[1, 1, 1], 1, 0);
        let mut record = pass(1, 1_000_000_000);
        record.set_memory_bytes(64);
        history.push(record);

        let average = history.average().unwrap();
        assert_eq!(average.memory_bytes().unwrap(), 64.0);
    }

    #[test]
    fn test_average_of_empty_history() {
        let history = ResultHistory::new(3, 3, 5.0);
        assert!(matches!(history.average(), Err(BenchError::EmptyHistory)));
    }

    #[test]
    fn test_total_duration() {
        let mut history = history_of(&[1, 2], 1, 1);
        history.push(MetricRecord::new(identity()));
        assert_eq!(history.total_duration(), Duration::from_secs(2));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.total_duration(), Duration::ZERO);
    }
}
