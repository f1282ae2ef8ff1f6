//! CSV dump of recent builds
//!
//! Writes one file per test, `<out>/<group>/<test>.csv`, with a
//! `revision,plottable` line per build, oldest build first. Ready for
//! plotting trend lines.

use crate::json::sanitize_file_component;
use crate::report::StoredResult;
use crate::store::{HistoryStore, group_results};
use passbench_core::StorageError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Summary of a dump run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    /// Builds included
    pub builds: usize,
    /// Files written
    pub files: Vec<PathBuf>,
}

/// CSV body for one test's results
pub fn generate_csv_report(results: &[StoredResult]) -> String {
    let mut output = String::new();
    for result in results {
        let revision = result
            .build
            .revision
            .map(|r| r.to_string())
            .unwrap_or_default();
        let value = result
            .plottable_value
            .map(|v| v.to_string())
            .unwrap_or_default();
        output.push_str(&format!("{},{}\n", revision, value));
    }
    output
}

/// Dump the `build_count` most recent builds of `project` into `out_dir`
pub fn dump_recent_builds(
    store: &HistoryStore,
    project: &str,
    build_count: usize,
    out_dir: &Path,
) -> Result<DumpSummary, StorageError> {
    let builds = store.recent_builds(project, build_count)?;
    let results = store.results_for_builds(project, &builds)?;

    let mut summary = DumpSummary {
        builds: builds.len(),
        files: Vec::new(),
    };
    std::fs::create_dir_all(out_dir).map_err(|source| StorageError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    for (group, tests) in group_results(results) {
        let group_dir = out_dir.join(sanitize_file_component(&group));
        std::fs::create_dir_all(&group_dir).map_err(|source| StorageError::Io {
            path: group_dir.clone(),
            source,
        })?;

        for (test, results) in tests {
            let path = group_dir.join(format!("{}.csv", sanitize_file_component(&test)));
            std::fs::write(&path, generate_csv_report(&results)).map_err(|source| {
                StorageError::Io {
                    path: path.clone(),
                    source,
                }
            })?;
            summary.files.push(path);
        }
    }

    info!(
        project = project,
        builds = summary.builds,
        files = summary.files.len(),
        "Dumped results to {}",
        out_dir.display()
    );
    Ok(summary)
}
