//! Stored Result Schema

use chrono::{DateTime, Utc};
use passbench_core::{Attribute, BuildInfo, MetricRecord, TestIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the on-disk result format
pub const SCHEMA_VERSION: u32 = 1;

/// One averaged result as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    /// Format version, see [`SCHEMA_VERSION`]
    pub schema_version: u32,
    /// Project the result belongs to
    pub project: String,
    /// Build that produced the result
    pub build: BuildInfo,
    /// Group (method) name
    pub group: String,
    /// Test (type) name
    pub test: String,
    /// Averaged attribute values
    pub attributes: BTreeMap<Attribute, f64>,
    /// Attribute chosen for plotting, if any was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plottable_attribute: Option<Attribute>,
    /// Value of the plottable attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plottable_value: Option<f64>,
    /// When the result was written
    pub recorded_at: DateTime<Utc>,
}

impl StoredResult {
    /// Capture `record` for `project`, stamped now
    pub fn from_record(project: &str, record: &MetricRecord) -> Self {
        let plottable = record.plottable().ok();
        Self {
            schema_version: SCHEMA_VERSION,
            project: project.to_string(),
            build: record.build().clone(),
            group: record.group_name().to_string(),
            test: record.test_name().to_string(),
            attributes: record.attribute_map(),
            plottable_attribute: plottable.map(|(attribute, _)| attribute),
            plottable_value: plottable.map(|(_, value)| value),
            recorded_at: Utc::now(),
        }
    }

    /// Rebuild the metric record
    pub fn to_record(&self) -> MetricRecord {
        MetricRecord::from_attribute_map(
            TestIdentity::new(self.build.clone(), &self.group, &self.test),
            self.attributes.clone(),
        )
    }

    /// `group - test`
    pub fn label(&self) -> String {
        format!("{} - {}", self.group, self.test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetricRecord {
        let mut record = MetricRecord::new(TestIdentity::new(
            BuildInfo::new(Some(12), DateTime::UNIX_EPOCH),
            "parse",
            "Json",
        ));
        record.set_operations(50);
        record.set_duration_nanos(2_000_000_000);
        record
    }

    #[test]
    fn test_from_record() {
        let stored = StoredResult::from_record("proj", &record());

        assert_eq!(stored.schema_version, SCHEMA_VERSION);
        assert_eq!(stored.project, "proj");
        assert_eq!(stored.build.revision, Some(12));
        assert_eq!(stored.label(), "parse - Json");
        assert_eq!(stored.plottable_attribute, Some(Attribute::OpsPerSecond));
        assert_eq!(stored.plottable_value, Some(25.0));
    }

    #[test]
    fn test_to_record_keeps_attributes() {
        let original = record();
        let restored = StoredResult::from_record("proj", &original).to_record();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(StoredResult::from_record("proj", &record())).unwrap();
        assert_eq!(json["attributes"]["ops_per_second"], 25.0);
        assert_eq!(json["build"]["revision"], 12);
        assert_eq!(json["plottable_attribute"], "ops_per_second");
    }

    #[test]
    fn test_no_plottable_attribute_is_omitted() {
        let empty = MetricRecord::new(TestIdentity::new(BuildInfo::local(), "g", "t"));
        let json = serde_json::to_value(StoredResult::from_record("proj", &empty)).unwrap();
        assert!(json.get("plottable_value").is_none());
    }
}
