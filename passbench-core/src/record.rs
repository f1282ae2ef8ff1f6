//! Metric Records
//!
//! One record per pass (or one averaged result): the test identity plus a
//! sparse set of numeric attributes. The attribute map is the unit exchanged
//! with the averaging algorithm and with result sinks.

use crate::build::BuildInfo;
use crate::error::MetricError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// A reportable metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    /// Measured wall-clock time of the pass
    DurationNanos,
    /// Operations completed during the pass
    Operations,
    /// Throughput, derived from operations and duration when both are set
    OpsPerSecond,
    /// Average per-operation latency
    LatencyNanos,
    /// Fastest observed operation
    MinLatencyNanos,
    /// Slowest observed operation
    MaxLatencyNanos,
    /// Standard deviation of per-operation latency
    StddevLatencyNanos,
    /// Memory attributed to the pass
    MemoryBytes,
}

impl Attribute {
    /// Every attribute, in declaration order
    pub const ALL: [Attribute; 8] = [
        Attribute::DurationNanos,
        Attribute::Operations,
        Attribute::OpsPerSecond,
        Attribute::LatencyNanos,
        Attribute::MinLatencyNanos,
        Attribute::MaxLatencyNanos,
        Attribute::StddevLatencyNanos,
        Attribute::MemoryBytes,
    ];

    /// Order in which the single plotted value is chosen
    pub const PLOTTABLE_PRIORITY: [Attribute; 5] = [
        Attribute::OpsPerSecond,
        Attribute::LatencyNanos,
        Attribute::MemoryBytes,
        Attribute::Operations,
        Attribute::DurationNanos,
    ];

    /// Wire name of the attribute
    pub fn as_str(self) -> &'static str {
        match self {
            Attribute::DurationNanos => "duration_nanos",
            Attribute::Operations => "operations",
            Attribute::OpsPerSecond => "ops_per_second",
            Attribute::LatencyNanos => "latency_nanos",
            Attribute::MinLatencyNanos => "min_latency_nanos",
            Attribute::MaxLatencyNanos => "max_latency_nanos",
            Attribute::StddevLatencyNanos => "stddev_latency_nanos",
            Attribute::MemoryBytes => "memory_bytes",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Attribute::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown attribute: {}", s))
    }
}

/// Who a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestIdentity {
    /// Build being measured
    pub build: BuildInfo,
    /// Test group name
    pub group: String,
    /// Test name
    pub test: String,
}

impl TestIdentity {
    /// Create an identity
    pub fn new(build: BuildInfo, group: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            build,
            group: group.into(),
            test: test.into(),
        }
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.group, self.test)
    }
}

/// Metrics for one pass, or the averaged result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    identity: TestIdentity,
    #[serde(rename = "attributes")]
    values: BTreeMap<Attribute, f64>,
    /// Throughput was supplied rather than derived
    #[serde(skip)]
    explicit_throughput: bool,
}

impl PartialEq for MetricRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity && self.values == other.values
    }
}

impl MetricRecord {
    /// Empty record for `identity`
    pub fn new(identity: TestIdentity) -> Self {
        Self {
            identity,
            values: BTreeMap::new(),
            explicit_throughput: false,
        }
    }

    /// Rehydrate from an attribute map, deriving ops/sec if it is absent.
    pub fn from_attribute_map(identity: TestIdentity, map: BTreeMap<Attribute, f64>) -> Self {
        let explicit_throughput = map.contains_key(&Attribute::OpsPerSecond);
        let mut record = Self {
            identity,
            values: map,
            explicit_throughput,
        };
        if !explicit_throughput {
            record.derive();
        }
        record
    }

    pub fn identity(&self) -> &TestIdentity {
        &self.identity
    }

    pub fn build(&self) -> &BuildInfo {
        &self.identity.build
    }

    pub fn group_name(&self) -> &str {
        &self.identity.group
    }

    pub fn test_name(&self) -> &str {
        &self.identity.test
    }

    /// Whether `attribute` has a value
    pub fn is_set(&self, attribute: Attribute) -> bool {
        self.values.contains_key(&attribute)
    }

    /// Value of `attribute`
    pub fn get(&self, attribute: Attribute) -> Result<f64, MetricError> {
        self.values
            .get(&attribute)
            .copied()
            .ok_or(MetricError::NotSet(attribute))
    }

    /// Set `attribute` and re-derive throughput
    pub fn set(&mut self, attribute: Attribute, value: f64) {
        self.values.insert(attribute, value);
        if attribute == Attribute::OpsPerSecond {
            self.explicit_throughput = true;
        }
        self.derive();
    }

    /// Remove `attribute`. Throughput derived from it goes with it.
    pub fn unset(&mut self, attribute: Attribute) {
        self.values.remove(&attribute);
        if attribute == Attribute::OpsPerSecond {
            self.explicit_throughput = false;
        } else {
            self.derive();
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.set(Attribute::DurationNanos, duration.as_nanos() as f64);
    }

    pub fn set_duration_nanos(&mut self, nanos: u64) {
        self.set(Attribute::DurationNanos, nanos as f64);
    }

    pub fn set_operations(&mut self, operations: u64) {
        self.set(Attribute::Operations, operations as f64);
    }

    /// Add to the operation count, starting from zero if unset
    pub fn add_operations(&mut self, operations: u64) {
        let current = self.values.get(&Attribute::Operations).copied().unwrap_or(0.0);
        self.set(Attribute::Operations, current + operations as f64);
    }

    pub fn set_ops_per_second(&mut self, ops_per_second: f64) {
        self.set(Attribute::OpsPerSecond, ops_per_second);
    }

    pub fn set_memory_bytes(&mut self, bytes: u64) {
        self.set(Attribute::MemoryBytes, bytes as f64);
    }

    pub fn set_latency_nanos(&mut self, nanos: f64) {
        self.set(Attribute::LatencyNanos, nanos);
    }

    pub fn set_min_latency_nanos(&mut self, nanos: f64) {
        self.set(Attribute::MinLatencyNanos, nanos);
    }

    pub fn set_max_latency_nanos(&mut self, nanos: f64) {
        self.set(Attribute::MaxLatencyNanos, nanos);
    }

    pub fn set_stddev_latency_nanos(&mut self, nanos: f64) {
        self.set(Attribute::StddevLatencyNanos, nanos);
    }

    pub fn duration_nanos(&self) -> Result<f64, MetricError> {
        self.get(Attribute::DurationNanos)
    }

    /// Duration as a `Duration` (sub-nanosecond averages are truncated)
    pub fn duration(&self) -> Result<Duration, MetricError> {
        self.duration_nanos()
            .map(|nanos| Duration::from_nanos(nanos.max(0.0) as u64))
    }

    pub fn operations(&self) -> Result<f64, MetricError> {
        self.get(Attribute::Operations)
    }

    pub fn ops_per_second(&self) -> Result<f64, MetricError> {
        self.get(Attribute::OpsPerSecond)
    }

    pub fn memory_bytes(&self) -> Result<f64, MetricError> {
        self.get(Attribute::MemoryBytes)
    }

    pub fn latency_nanos(&self) -> Result<f64, MetricError> {
        self.get(Attribute::LatencyNanos)
    }

    pub fn min_latency_nanos(&self) -> Result<f64, MetricError> {
        self.get(Attribute::MinLatencyNanos)
    }

    pub fn max_latency_nanos(&self) -> Result<f64, MetricError> {
        self.get(Attribute::MaxLatencyNanos)
    }

    pub fn stddev_latency_nanos(&self) -> Result<f64, MetricError> {
        self.get(Attribute::StddevLatencyNanos)
    }

    /// The attribute used to plot this record, and its value
    pub fn plottable(&self) -> Result<(Attribute, f64), MetricError> {
        Attribute::PLOTTABLE_PRIORITY
            .into_iter()
            .find_map(|a| self.values.get(&a).map(|v| (a, *v)))
            .ok_or(MetricError::NoPlottableAttribute)
    }

    /// Value of the plottable attribute
    pub fn plottable_value(&self) -> Result<f64, MetricError> {
        self.plottable().map(|(_, v)| v)
    }

    /// Whether any plottable attribute is set
    pub fn has_plottable_attribute(&self) -> bool {
        self.plottable().is_ok()
    }

    /// Every set attribute
    pub fn attribute_map(&self) -> BTreeMap<Attribute, f64> {
        self.values.clone()
    }

    /// Iterate over set attributes in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (Attribute, f64)> + '_ {
        self.values.iter().map(|(a, v)| (*a, *v))
    }

    /// Recompute throughput from operations and duration. A derived value
    /// that its inputs no longer support is dropped; a supplied one is kept.
    fn derive(&mut self) {
        match (
            self.values.get(&Attribute::Operations),
            self.values.get(&Attribute::DurationNanos),
        ) {
            (Some(&operations), Some(&duration)) if duration > 0.0 => {
                self.values.insert(
                    Attribute::OpsPerSecond,
                    operations * NANOS_PER_SECOND / duration,
                );
                self.explicit_throughput = false;
            }
            _ if !self.explicit_throughput => {
                self.values.remove(&Attribute::OpsPerSecond);
            }
            _ => {}
        }
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {{", self.identity)?;
        for (i, (attribute, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:.3}", attribute, value)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TestIdentity {
        TestIdentity::new(BuildInfo::local(), "group", "test")
    }

    #[test]
    fn test_ops_per_second_is_derived() {
        let mut record = MetricRecord::new(identity());
        record.set_operations(5);
        assert!(!record.is_set(Attribute::OpsPerSecond));

        record.set_duration(Duration::from_secs(1));
        assert_eq!(record.ops_per_second().unwrap(), 5.0);

        // Re-derived when an input changes
        record.add_operations(5);
        assert_eq!(record.ops_per_second().unwrap(), 10.0);
        record.set_duration_nanos(2_000_000_000);
        assert_eq!(record.ops_per_second().unwrap(), 5.0);
    }

    #[test]
    fn test_derived_value_wins_over_explicit_throughput() {
        let mut record = MetricRecord::new(identity());
        record.set_operations(3);
        record.set_duration_nanos(1_000_000_000);
        record.set_ops_per_second(99.0);
        assert_eq!(record.ops_per_second().unwrap(), 3.0);
    }

    #[test]
    fn test_zero_duration_does_not_derive() {
        let mut record = MetricRecord::new(identity());
        record.set_operations(3);
        record.set_duration_nanos(0);
        assert!(!record.is_set(Attribute::OpsPerSecond));
    }

    #[test]
    fn test_stale_throughput_is_dropped() {
        let mut record = MetricRecord::new(identity());
        record.set_operations(3);
        record.set_duration_nanos(1_000_000_000);
        assert_eq!(record.ops_per_second().unwrap(), 3.0);

        record.set_duration_nanos(0);
        assert!(!record.is_set(Attribute::OpsPerSecond));

        record.set_duration_nanos(1_000_000_000);
        assert_eq!(record.ops_per_second().unwrap(), 3.0);
        record.unset(Attribute::DurationNanos);
        assert_eq!(
            record.ops_per_second(),
            Err(MetricError::NotSet(Attribute::OpsPerSecond))
        );
    }

    #[test]
    fn test_supplied_throughput_survives_missing_inputs() {
        let mut record = MetricRecord::new(identity());
        record.set_ops_per_second(42.0);
        record.set_operations(3);
        record.set_memory_bytes(8);
        assert_eq!(record.ops_per_second().unwrap(), 42.0);

        let map = BTreeMap::from([(Attribute::OpsPerSecond, 7.0)]);
        let mut restored = MetricRecord::from_attribute_map(identity(), map);
        restored.set_duration_nanos(0);
        assert_eq!(restored.ops_per_second().unwrap(), 7.0);

        restored.unset(Attribute::OpsPerSecond);
        assert!(!restored.is_set(Attribute::OpsPerSecond));
    }

    #[test]
    fn test_add_operations_from_unset() {
        let mut record = MetricRecord::new(identity());
        record.add_operations(2);
        record.add_operations(3);
        assert_eq!(record.operations().unwrap(), 5.0);
    }

    #[test]
    fn test_unset_attribute_is_an_error() {
        let record = MetricRecord::new(identity());
        assert_eq!(
            record.memory_bytes(),
            Err(MetricError::NotSet(Attribute::MemoryBytes))
        );
        assert_eq!(
            record.plottable_value(),
            Err(MetricError::NoPlottableAttribute)
        );
        assert!(!record.has_plottable_attribute());
    }

    #[test]
    fn test_plottable_priority() {
        let mut record = MetricRecord::new(identity());
        record.set_duration_nanos(100);
        assert_eq!(record.plottable().unwrap().0, Attribute::DurationNanos);

        record.set_memory_bytes(64);
        assert_eq!(record.plottable().unwrap().0, Attribute::MemoryBytes);

        record.set_latency_nanos(12.0);
        assert_eq!(record.plottable().unwrap(), (Attribute::LatencyNanos, 12.0));

        record.set_operations(10);
        assert_eq!(record.plottable().unwrap().0, Attribute::OpsPerSecond);
    }

    #[test]
    fn test_attribute_map_and_back() {
        let mut record = MetricRecord::new(identity());
        record.set_operations(4);
        record.set_duration_nanos(2_000_000_000);
        record.set_memory_bytes(1024);

        let map = record.attribute_map();
        assert_eq!(map.len(), 4);
        assert_eq!(map[&Attribute::OpsPerSecond], 2.0);

        let restored = MetricRecord::from_attribute_map(identity(), map);
        assert_eq!(restored.attribute_map(), record.attribute_map());
    }

    #[test]
    fn test_from_map_derives_missing_throughput() {
        let map = BTreeMap::from([
            (Attribute::Operations, 6.0),
            (Attribute::DurationNanos, 2_000_000_000.0),
        ]);
        let record = MetricRecord::from_attribute_map(identity(), map);
        assert_eq!(record.ops_per_second().unwrap(), 3.0);
    }

    #[test]
    fn test_from_map_keeps_given_throughput() {
        let map = BTreeMap::from([
            (Attribute::Operations, 6.0),
            (Attribute::DurationNanos, 2_000_000_000.0),
            (Attribute::OpsPerSecond, 2.5),
        ]);
        let record = MetricRecord::from_attribute_map(identity(), map);
        assert_eq!(record.ops_per_second().unwrap(), 2.5);
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for attribute in Attribute::ALL {
            assert_eq!(attribute.as_str().parse::<Attribute>().unwrap(), attribute);
        }
        assert!("opsPerSecond".parse::<Attribute>().is_err());
    }

    #[test]
    fn test_serialized_attribute_keys() {
        let mut record = MetricRecord::new(identity());
        record.set_latency_nanos(7.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["attributes"]["latency_nanos"], 7.0);
        assert_eq!(json["identity"]["group"], "group");
    }
}
