//! History Store
//!
//! Averaged results of CI builds, one JSON document per line, in
//! `<root>/<project>/results.jsonl`. Appending never rewrites earlier lines.

use crate::json::sanitize_file_component;
use crate::report::StoredResult;
use passbench_core::{BuildInfo, StorageError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// File name of a project's history
pub const HISTORY_FILE_NAME: &str = "results.jsonl";

/// Results keyed by group, then test
pub type GroupedResults = BTreeMap<String, BTreeMap<String, Vec<StoredResult>>>;

/// Append-only per-project result history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    /// Store rooted at `root`; each project gets its own subdirectory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// History file of `project`
    pub fn path_for(&self, project: &str) -> PathBuf {
        self.root
            .join(sanitize_file_component(project))
            .join(HISTORY_FILE_NAME)
    }

    /// Append one result to its project's history
    pub fn append(&self, result: &StoredResult) -> Result<(), StorageError> {
        let path = self.path_for(&result.project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut line =
            serde_json::to_string(result).map_err(|e| StorageError::Serialize(e.to_string()))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .map_err(|source| StorageError::Io { path, source })
    }

    /// Every stored result of `project`, oldest first. A project with no
    /// history yields an empty list.
    pub fn load(&self, project: &str) -> Result<Vec<StoredResult>, StorageError> {
        let path = self.path_for(project);
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        let mut results = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let result = serde_json::from_str(&line).map_err(|e| StorageError::Malformed {
                path: path.clone(),
                line: index + 1,
                message: e.to_string(),
            })?;
            results.push(result);
        }
        Ok(results)
    }

    /// The `count` most recent CI builds of `project`, newest first.
    ///
    /// Builds are ordered by revision, then timestamp. Results without a
    /// revision are never stored, but are skipped if present.
    pub fn recent_builds(&self, project: &str, count: usize) -> Result<Vec<BuildInfo>, StorageError> {
        let builds: BTreeSet<(u64, chrono::DateTime<chrono::Utc>)> = self
            .load(project)?
            .into_iter()
            .filter_map(|r| r.build.revision.map(|rev| (rev, r.build.timestamp)))
            .collect();

        Ok(builds
            .into_iter()
            .rev()
            .take(count)
            .map(|(revision, timestamp)| BuildInfo::new(Some(revision), timestamp))
            .collect())
    }

    /// Results of the given builds, oldest build first
    pub fn results_for_builds(
        &self,
        project: &str,
        builds: &[BuildInfo],
    ) -> Result<Vec<StoredResult>, StorageError> {
        let mut results: Vec<StoredResult> = self
            .load(project)?
            .into_iter()
            .filter(|r| builds.contains(&r.build))
            .collect();
        results.sort_by_key(|r| (r.build.revision, r.build.timestamp));
        Ok(results)
    }
}

/// Group results by group name, then test name, keeping their order
pub fn group_results(results: impl IntoIterator<Item = StoredResult>) -> GroupedResults {
    let mut grouped = GroupedResults::new();
    for result in results {
        grouped
            .entry(result.group.clone())
            .or_default()
            .entry(result.test.clone())
            .or_default()
            .push(result);
    }
    grouped
}
