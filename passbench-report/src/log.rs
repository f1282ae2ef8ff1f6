//! Log-only sink

use passbench_core::{MetricRecord, ResultSink, StorageError};
use tracing::info;

/// Logs each attribute as `group - test.attribute = value`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

/// One line per attribute, in attribute order
pub fn format_attribute_lines(record: &MetricRecord) -> Vec<String> {
    record
        .attributes()
        .map(|(attribute, value)| format!("{}.{} = {}", record.identity(), attribute, value))
        .collect()
}

impl ResultSink for LogSink {
    fn store(&self, record: &MetricRecord) -> Result<(), StorageError> {
        for line in format_attribute_lines(record) {
            info!("{}", line);
        }
        Ok(())
    }
}
