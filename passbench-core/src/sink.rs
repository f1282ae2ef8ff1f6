//! Result hand-off
//!
//! The scheduler passes the averaged record of a finished run to a
//! [`ResultSink`]. Storage failures are logged by the scheduler and never fail
//! the run.

use crate::record::MetricRecord;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

/// Failure to persist a result
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize result: {0}")]
    Serialize(String),

    #[error("Malformed stored result at {path}:{line}: {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Destination for averaged results
pub trait ResultSink: Send + Sync {
    /// Persist one averaged record
    fn store(&self, record: &MetricRecord) -> Result<(), StorageError>;
}

/// Keeps every stored record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MetricRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records stored so far
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl ResultSink for MemorySink {
    fn store(&self, record: &MetricRecord) -> Result<(), StorageError> {
        match self.records.lock() {
            Ok(mut records) => {
                records.push(record.clone());
                Ok(())
            }
            Err(_) => Err(StorageError::Serialize(
                "memory sink lock poisoned".to_string(),
            )),
        }
    }
}
