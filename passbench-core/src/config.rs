//! Layered Configuration
//!
//! A test's configuration is folded from sparse layers, lowest precedence
//! first: built-in defaults, environment defaults (`passbench.toml` then
//! `PASSBENCH_*` variables), a type-level layer and a method-level layer. A
//! layer only overrides the fields it sets.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Name of the configuration file discovered from the working directory
pub const CONFIG_FILE_NAME: &str = "passbench.toml";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "PASSBENCH_";

/// Default directory for stored results
pub const DEFAULT_REPORTS_DIR: &str = "target/passbench";

pub const DEFAULT_WARMUP_PASSES: u32 = 0;
pub const DEFAULT_WARMUP_DURATION: Duration = Duration::ZERO;
pub const DEFAULT_MAX_PASSES: u32 = 100;
pub const DEFAULT_STABLE_PASSES: u32 = 3;
pub const DEFAULT_STABILITY_PERCENTAGE: f64 = 5.0;
pub const DEFAULT_RUNS_TO_AVERAGE: u32 = 3;
pub const DEFAULT_MIN_DURATION: Duration = Duration::from_secs(3);

/// Parse duration string (e.g., "3s", "500ms", "2m")
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find where the number ends and unit begins
    let (num_part, unit_part) = s
        .char_indices()
        .find(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| s.split_at(i))
        .unwrap_or((s, "ms"));

    let value: f64 = num_part
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration number: {}", num_part))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("duration must be non-negative: {}", s));
    }

    let multiplier: u64 = match unit_part.to_lowercase().as_str() {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" | "min" => 60_000_000_000,
        _ => return Err(format!("unknown duration unit: {}", unit_part)),
    };

    Ok(Duration::from_nanos((value * multiplier as f64) as u64))
}

/// Render a duration in the largest unit that keeps it whole
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0ms".to_string()
    } else if nanos % 1_000_000_000 == 0 {
        format!("{}s", nanos / 1_000_000_000)
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!("{}us", nanos / 1_000)
    } else {
        format!("{}ns", nanos)
    }
}

/// A duration written as a human string in config files ("3s", "250ms")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HumanDuration(pub Duration);

impl TryFrom<String> for HumanDuration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_duration(&value).map(HumanDuration)
    }
}

impl From<HumanDuration> for String {
    fn from(value: HumanDuration) -> Self {
        format_duration(value.0)
    }
}

impl From<Duration> for HumanDuration {
    fn from(value: Duration) -> Self {
        HumanDuration(value)
    }
}

/// Minimum measured time per pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MinimumDuration {
    /// Every pass is long enough
    Disabled,
    /// Keep invoking the workload until the pass has accumulated this much
    AtLeast(Duration),
}

impl MinimumDuration {
    /// Whether `elapsed` satisfies this minimum
    pub fn is_met(self, elapsed: Duration) -> bool {
        match self {
            MinimumDuration::Disabled => true,
            MinimumDuration::AtLeast(min) => elapsed >= min,
        }
    }
}

impl FromStr for MinimumDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "none" | "disabled" => Ok(MinimumDuration::Disabled),
            other => parse_duration(other).map(MinimumDuration::AtLeast),
        }
    }
}

impl TryFrom<String> for MinimumDuration {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MinimumDuration> for String {
    fn from(value: MinimumDuration) -> Self {
        match value {
            MinimumDuration::Disabled => "off".to_string(),
            MinimumDuration::AtLeast(d) => format_duration(d),
        }
    }
}

/// When setup/teardown hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HookMode {
    /// Around every pass (default)
    #[default]
    EachPass,
    /// Once around the whole run
    Once,
}

impl FromStr for HookMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "each-pass" | "true" | "yes" => Ok(HookMode::EachPass),
            "once" | "false" | "no" => Ok(HookMode::Once),
            other => Err(format!("unknown hook mode: {}", other)),
        }
    }
}

impl fmt::Display for HookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookMode::EachPass => f.write_str("each-pass"),
            HookMode::Once => f.write_str("once"),
        }
    }
}

/// One sparse configuration layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    /// Passes discarded before measuring
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_passes: Option<u32>,
    /// Minimum total time spent warming up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_duration: Option<HumanDuration>,
    /// Ceiling on measured passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<u32>,
    /// Size of the stability window (0 disables the check)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_passes: Option<u32>,
    /// Allowed spread within the stability window, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_percentage: Option<f64>,
    /// Number of passes averaged into the result (0 = latest only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_to_average: Option<u32>,
    /// Minimum measured time per pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<MinimumDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    /// When setup/teardown run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<HookMode>,
}

impl ConfigLayer {
    /// Empty layer (inherits everything)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_warmup_passes(mut self, passes: u32) -> Self {
        self.warmup_passes = Some(passes);
        self
    }

    pub fn with_warmup_duration(mut self, duration: Duration) -> Self {
        self.warmup_duration = Some(HumanDuration(duration));
        self
    }

    pub fn with_max_passes(mut self, passes: u32) -> Self {
        self.max_passes = Some(passes);
        self
    }

    pub fn with_stable_passes(mut self, passes: u32) -> Self {
        self.stable_passes = Some(passes);
        self
    }

    pub fn with_stability_percentage(mut self, percentage: f64) -> Self {
        self.stability_percentage = Some(percentage);
        self
    }

    pub fn with_runs_to_average(mut self, runs: u32) -> Self {
        self.runs_to_average = Some(runs);
        self
    }

    pub fn with_duration(mut self, duration: MinimumDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    pub fn with_group_name(mut self, name: impl Into<String>) -> Self {
        self.group_name = Some(name.into());
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_hooks(mut self, hooks: HookMode) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// `self` overridden by every field `over` sets
    pub fn merge(mut self, over: &ConfigLayer) -> Self {
        fn take<T: Clone>(base: &mut Option<T>, over: &Option<T>) {
            if over.is_some() {
                base.clone_from(over);
            }
        }
        take(&mut self.warmup_passes, &over.warmup_passes);
        take(&mut self.warmup_duration, &over.warmup_duration);
        take(&mut self.max_passes, &over.max_passes);
        take(&mut self.stable_passes, &over.stable_passes);
        take(&mut self.stability_percentage, &over.stability_percentage);
        take(&mut self.runs_to_average, &over.runs_to_average);
        take(&mut self.duration, &over.duration);
        take(&mut self.test_name, &over.test_name);
        take(&mut self.group_name, &over.group_name);
        take(&mut self.project_name, &over.project_name);
        take(&mut self.hooks, &over.hooks);
        self
    }

    /// Read `PASSBENCH_*` overrides through `lookup`
    pub fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn var<T: FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Result<Option<T>, ConfigError>
        where
            T::Err: fmt::Display,
        {
            let key = format!("{ENV_PREFIX}{name}");
            match lookup(&key).filter(|v| !v.trim().is_empty()) {
                Some(raw) => raw
                    .trim()
                    .parse::<T>()
                    .map(Some)
                    .map_err(|e| ConfigError::InvalidValue {
                        key,
                        message: format!("{raw:?}: {e}"),
                    }),
                None => Ok(None),
            }
        }

        let warmup_duration = var::<String>(&lookup, "WARMUP_DURATION")?
            .map(|raw| {
                parse_duration(&raw).map_err(|message| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}WARMUP_DURATION"),
                    message,
                })
            })
            .transpose()?;

        Ok(Self {
            warmup_passes: var(&lookup, "WARMUP_PASSES")?,
            warmup_duration: warmup_duration.map(HumanDuration),
            max_passes: var(&lookup, "MAX_PASSES")?,
            stable_passes: var(&lookup, "STABLE_PASSES")?,
            stability_percentage: var(&lookup, "STABILITY_PERCENTAGE")?,
            runs_to_average: var(&lookup, "RUNS_TO_AVERAGE")?,
            duration: var(&lookup, "DURATION")?,
            test_name: None,
            group_name: None,
            project_name: var(&lookup, "PROJECT_NAME")?,
            hooks: var(&lookup, "HOOKS")?,
        })
    }
}

/// Fully resolved, immutable configuration for one test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    pub warmup_passes: u32,
    pub warmup_duration: Duration,
    pub max_passes: u32,
    pub stable_passes: u32,
    pub stability_percentage: f64,
    pub runs_to_average: u32,
    pub min_duration: MinimumDuration,
    pub test_name: String,
    pub group_name: String,
    pub project_name: String,
    pub hooks: HookMode,
}

impl Configuration {
    /// Fold `layers` (lowest precedence first) over the built-in defaults.
    ///
    /// The test name defaults to `type_name` and the group name to
    /// `method_name`. A project name is required.
    pub fn resolve<'a>(
        type_name: &str,
        method_name: &str,
        layers: impl IntoIterator<Item = &'a ConfigLayer>,
    ) -> Result<Self, ConfigError> {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), |acc, layer| acc.merge(layer));

        let project_name = merged
            .project_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::MissingProjectName)?;

        let stability_percentage = merged
            .stability_percentage
            .unwrap_or(DEFAULT_STABILITY_PERCENTAGE);
        if !stability_percentage.is_finite() || stability_percentage < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "stability_percentage".to_string(),
                message: format!("must be a non-negative number, got {stability_percentage}"),
            });
        }

        Ok(Self {
            warmup_passes: merged.warmup_passes.unwrap_or(DEFAULT_WARMUP_PASSES),
            warmup_duration: merged
                .warmup_duration
                .map(|d| d.0)
                .unwrap_or(DEFAULT_WARMUP_DURATION),
            max_passes: merged.max_passes.unwrap_or(DEFAULT_MAX_PASSES),
            stable_passes: merged.stable_passes.unwrap_or(DEFAULT_STABLE_PASSES),
            stability_percentage,
            runs_to_average: merged.runs_to_average.unwrap_or(DEFAULT_RUNS_TO_AVERAGE),
            min_duration: merged
                .duration
                .unwrap_or(MinimumDuration::AtLeast(DEFAULT_MIN_DURATION)),
            test_name: merged
                .test_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| type_name.to_string()),
            group_name: merged
                .group_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| method_name.to_string()),
            project_name,
            hooks: merged.hooks.unwrap_or_default(),
        })
    }

    /// Whether warmup can be skipped entirely
    pub fn skips_warmup(&self) -> bool {
        self.warmup_passes == 0 && self.warmup_duration.is_zero()
    }
}

/// Output section of `passbench.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for stored results
    #[serde(default = "default_reports_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REPORTS_DIR)
}

/// Contents of `passbench.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// Environment-level defaults for every test
    #[serde(default)]
    pub defaults: ConfigLayer,
    /// Where results go
    #[serde(default)]
    pub output: OutputConfig,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Walk up from `start` looking for `passbench.toml`
    pub fn discover_from(start: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let config = Self::load(&config_path)?;
                return Ok(Some((config_path, config)));
            }
            if !dir.pop() {
                return Ok(None);
            }
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# passbench configuration

[defaults]
# Passes discarded before measuring starts
warmup_passes = 0
# Minimum total warmup time
warmup_duration = "0ms"
# Fail the benchmark after this many measured passes without a stable result
max_passes = 100
# Stability window size (0 disables the stability check)
stable_passes = 3
# Allowed spread within the stability window, in percent
stability_percentage = 5.0
# Passes averaged into the final result (0 = latest pass only)
runs_to_average = 3
# Minimum measured time per pass ("off" to disable)
duration = "3s"
# Run setup/teardown around every pass ("each-pass") or once ("once")
hooks = "each-pass"
# Required: project the results are filed under
# project_name = "my-project"

[output]
# Directory for stored results
directory = "target/passbench"
"#
        .to_string()
    }
}

/// Environment-level defaults: `passbench.toml` overlaid with `PASSBENCH_*`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    /// Merged environment layer
    pub defaults: ConfigLayer,
    /// Directory for stored results
    pub reports_dir: PathBuf,
    /// The config file that was found, if any
    pub source: Option<PathBuf>,
}

impl Environment {
    /// Discover from the current directory and process environment
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
            path: ".".to_string(),
            source,
        })?;
        Self::load_from(&cwd, |key| std::env::var(key).ok())
    }

    /// Discover from `start`, reading variables through `lookup`
    pub fn load_from(
        start: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (source, file) = match FileConfig::discover_from(start)? {
            Some((path, file)) => (Some(path), file),
            None => (None, FileConfig::default()),
        };

        let env_layer = ConfigLayer::from_env_lookup(&lookup)?;
        let reports_dir = lookup(&format!("{ENV_PREFIX}REPORTS_DIR"))
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(file.output.directory);

        Ok(Self {
            defaults: file.defaults.merge(&env_layer),
            reports_dir,
            source,
        })
    }
}
