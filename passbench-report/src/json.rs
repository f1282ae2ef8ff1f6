//! JSON Snapshot Output

use crate::report::StoredResult;
use passbench_core::{MetricRecord, ResultSink, StorageError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Generate a prettified JSON document for one result.
pub fn generate_json_report(result: &StoredResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Writes the latest result of each test to `<dir>/<group>-<test>.json`,
/// replacing the previous snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    directory: PathBuf,
    project: String,
}

impl JsonFileSink {
    /// Sink writing into `directory`, stamping results with `project`
    pub fn new(directory: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            project: project.into(),
        }
    }

    /// Directory the snapshots are written to
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshot path for a test
    pub fn path_for(&self, group: &str, test: &str) -> PathBuf {
        self.directory.join(format!(
            "{}-{}.json",
            sanitize_file_component(group),
            sanitize_file_component(test)
        ))
    }
}

impl ResultSink for JsonFileSink {
    fn store(&self, record: &MetricRecord) -> Result<(), StorageError> {
        let stored = StoredResult::from_record(&self.project, record);
        let json =
            generate_json_report(&stored).map_err(|e| StorageError::Serialize(e.to_string()))?;

        std::fs::create_dir_all(&self.directory).map_err(|source| StorageError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let path = self.path_for(record.group_name(), record.test_name());
        std::fs::write(&path, json).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Wrote result snapshot");
        Ok(())
    }
}

/// Read every snapshot in `directory`, sorted by file name. A missing
/// directory yields an empty list.
pub fn load_snapshots(directory: &Path) -> Result<Vec<StoredResult>, StorageError> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Io {
                path: directory.to_path_buf(),
                source,
            });
        }
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| StorageError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let content = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|e| StorageError::Malformed {
                path,
                line: e.line(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Replace path separators and other characters that do not belong in a
/// file name.
pub fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}"),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use passbench_core::{BuildInfo, TestIdentity};

    fn record(ops: u64) -> MetricRecord {
        let mut record = MetricRecord::new(TestIdentity::new(
            BuildInfo::new(Some(3), DateTime::UNIX_EPOCH),
            "codec",
            "Decode",
        ));
        record.set_operations(ops);
        record.set_duration_nanos(1_000_000_000);
        record
    }

    #[test]
    fn test_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out"), "proj");
        sink.store(&record(10)).unwrap();

        let path = dir.path().join("out").join("codec-Decode.json");
        let stored: StoredResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.project, "proj");
        assert_eq!(stored.attributes[&passbench_core::Attribute::Operations], 10.0);
    }

    #[test]
    fn test_snapshot_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path(), "proj");
        sink.store(&record(10)).unwrap();
        sink.store(&record(20)).unwrap();

        let content = std::fs::read_to_string(sink.path_for("codec", "Decode")).unwrap();
        let stored: StoredResult = serde_json::from_str(&content).unwrap();
        assert_eq!(stored.plottable_value, Some(20.0));
    }

    #[test]
    fn test_load_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshots(&dir.path().join("missing")).unwrap().is_empty());

        let sink = JsonFileSink::new(dir.path(), "proj");
        sink.store(&record(10)).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let snapshots = load_snapshots(dir.path()).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].test, "Decode");

        std::fs::write(dir.path().join("broken.json"), "{").unwrap();
        assert!(matches!(
            load_snapshots(dir.path()),
            Err(StorageError::Malformed { .. })
        ));
    }

    #[test]
    fn test_sanitize_file_component() {
        assert_eq!(sanitize_file_component("a/b"), "a_b");
        assert_eq!(sanitize_file_component("plain name"), "plain name");
        assert_eq!(sanitize_file_component(".."), "_..");
        assert_eq!(sanitize_file_component(""), "_");
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let sink = JsonFileSink::new(&blocker, "proj");
        assert!(matches!(
            sink.store(&record(1)),
            Err(StorageError::Io { .. })
        ));
    }
}
