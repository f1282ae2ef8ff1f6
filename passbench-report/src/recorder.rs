//! Default result sink
//!
//! Every result is logged and written as a snapshot. Only CI builds (those
//! with a revision) are appended to the project history, so local runs never
//! pollute the trend data.

use crate::json::JsonFileSink;
use crate::log::LogSink;
use crate::report::StoredResult;
use crate::store::HistoryStore;
use passbench_core::{MetricRecord, ResultSink, StorageError};
use std::path::PathBuf;
use tracing::debug;

/// Snapshot + history + log sink for one project
#[derive(Debug, Clone)]
pub struct Recorder {
    project: String,
    snapshots: JsonFileSink,
    history: HistoryStore,
}

impl Recorder {
    /// Snapshots go to `<reports_dir>/latest`, history to
    /// `<reports_dir>/<project>/results.jsonl`.
    pub fn new(reports_dir: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        let reports_dir = reports_dir.into();
        let project = project.into();
        Self {
            snapshots: JsonFileSink::new(reports_dir.join("latest"), project.clone()),
            history: HistoryStore::new(reports_dir),
            project,
        }
    }

    /// Snapshot sink
    pub fn snapshots(&self) -> &JsonFileSink {
        &self.snapshots
    }

    /// CI history store
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }
}

impl ResultSink for Recorder {
    fn store(&self, record: &MetricRecord) -> Result<(), StorageError> {
        LogSink.store(record)?;
        self.snapshots.store(record)?;

        if record.build().is_ci_build() {
            self.history
                .append(&StoredResult::from_record(&self.project, record))?;
        } else {
            debug!(test = %record.identity(), "No build revision, result not added to history");
        }
        Ok(())
    }
}
