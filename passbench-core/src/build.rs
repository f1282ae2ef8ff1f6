//! Build Identity
//!
//! The revision/timestamp pair that every result is filed under. Resolved once
//! per process by the harness and passed to each scheduler by value.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the CI revision number
pub const BUILD_REVISION_VAR: &str = "PASSBENCH_BUILD_REVISION";

/// Environment variable holding the build timestamp (RFC 3339)
pub const BUILD_TIMESTAMP_VAR: &str = "PASSBENCH_BUILD_TIMESTAMP";

/// Identity of the build being measured
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildInfo {
    /// CI revision; `None` when running outside CI
    pub revision: Option<u64>,
    /// When the build was made
    pub timestamp: DateTime<Utc>,
}

impl BuildInfo {
    /// Build identity with an explicit revision
    pub fn new(revision: Option<u64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            revision,
            timestamp,
        }
    }

    /// Local run: no revision, stamped now
    pub fn local() -> Self {
        Self::new(None, Utc::now())
    }

    /// Whether this build carries CI information
    pub fn is_ci_build(&self) -> bool {
        self.revision.is_some()
    }

    /// Resolve from `PASSBENCH_BUILD_REVISION` / `PASSBENCH_BUILD_TIMESTAMP`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let revision = match lookup(BUILD_REVISION_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue {
                    key: BUILD_REVISION_VAR.to_string(),
                    message: format!("{raw:?}: {e}"),
                }
            })?),
            None => None,
        };

        let timestamp = match lookup(BUILD_TIMESTAMP_VAR).filter(|v| !v.trim().is_empty()) {
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ConfigError::InvalidValue {
                    key: BUILD_TIMESTAMP_VAR.to_string(),
                    message: format!("{raw:?}: {e}"),
                })?,
            None => {
                tracing::warn!("No {BUILD_TIMESTAMP_VAR} set, using current time");
                Utc::now()
            }
        };

        Ok(Self::new(revision, timestamp))
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "Build {} at {}", rev, self.timestamp.to_rfc3339()),
            None => write!(f, "Local build at {}", self.timestamp.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_ci_build() {
        let build = BuildInfo::from_lookup(lookup(&[
            (BUILD_REVISION_VAR, "1234"),
            (BUILD_TIMESTAMP_VAR, "2024-05-01T12:00:00Z"),
        ]))
        .unwrap();

        assert_eq!(build.revision, Some(1234));
        assert!(build.is_ci_build());
        assert_eq!(build.timestamp.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_local_build() {
        let build = BuildInfo::from_lookup(lookup(&[])).unwrap();
        assert_eq!(build.revision, None);
        assert!(!build.is_ci_build());
    }

    #[test]
    fn test_invalid_revision() {
        let err = BuildInfo::from_lookup(lookup(&[(BUILD_REVISION_VAR, "r12")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_invalid_timestamp() {
        let err =
            BuildInfo::from_lookup(lookup(&[(BUILD_TIMESTAMP_VAR, "yesterday")])).unwrap_err();
        assert!(err.to_string().contains(BUILD_TIMESTAMP_VAR));
    }
}
