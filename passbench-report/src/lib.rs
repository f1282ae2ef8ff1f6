#![warn(missing_docs)]
//! passbench Report - Result Storage and Output
//!
//! Concrete sinks for averaged results and the tools that read them back:
//! - JSON snapshots of the latest result per test
//! - Append-only JSON Lines history per project (CI builds only)
//! - Log output of every attribute
//! - CSV dumps of recent builds for plotting
//! - Human-readable listings

mod csv;
mod human;
mod json;
mod log;
mod recorder;
mod report;
mod store;

pub use csv::{DumpSummary, dump_recent_builds, generate_csv_report};
pub use human::generate_human_report;
pub use json::{JsonFileSink, generate_json_report, load_snapshots, sanitize_file_component};
pub use log::{LogSink, format_attribute_lines};
pub use recorder::Recorder;
pub use report::{SCHEMA_VERSION, StoredResult};
pub use store::{GroupedResults, HISTORY_FILE_NAME, HistoryStore, group_results};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// JSON array of stored results
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert!("html".parse::<OutputFormat>().is_err());
    }
}
