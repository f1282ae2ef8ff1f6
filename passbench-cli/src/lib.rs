#![warn(missing_docs)]
//! passbench CLI Library
//!
//! Inspect what benchmark runs have stored and how the environment is
//! configured:
//!
//! - `passbench dump` writes per-test CSV files for the most recent CI builds
//! - `passbench show` lists the latest stored results
//! - `passbench init` prints a default `passbench.toml`
//! - `passbench config` prints the resolved environment defaults

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use passbench_core::{Environment, FileConfig};
use passbench_report::{
    HistoryStore, OutputFormat, StoredResult, dump_recent_builds, generate_human_report,
    group_results, load_snapshots,
};
use std::io::Write;
use std::path::{Path, PathBuf};

/// passbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "passbench")]
#[command(author, version, about = "passbench - adaptive micro-benchmark results")]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Reports directory (defaults to passbench.toml / PASSBENCH_REPORTS_DIR)
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write `<out>/<group>/<test>.csv` (`revision,plottable`) for recent builds
    Dump {
        /// Project to dump (defaults to the configured project)
        #[arg(long)]
        project: Option<String>,
        /// Number of most recent builds to include
        #[arg(long, default_value = "10")]
        builds: usize,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the latest stored result of every test
    Show {
        /// Project to show (defaults to the configured project)
        #[arg(long)]
        project: Option<String>,
        /// Output format: human, json
        #[arg(long, default_value = "human")]
        format: String,
        /// Show the latest snapshots (including local runs) instead of CI history
        #[arg(long)]
        snapshots: bool,
    },
    /// Print a default passbench.toml
    Init {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved environment defaults
    Config,
}

/// Parse arguments and run.
///
/// Call this from the binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     passbench_cli::run()
/// }
/// ```
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the CLI with pre-parsed arguments, writing to stdout.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.verbose);

    let env = Environment::load().context("Failed to load passbench configuration")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &env, &mut out)
}

/// Install the `tracing` subscriber. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "passbench=debug"
    } else {
        "passbench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run a parsed command against a resolved environment
pub fn execute(cli: &Cli, env: &Environment, out: &mut dyn Write) -> anyhow::Result<()> {
    let reports_dir = cli
        .reports_dir
        .clone()
        .unwrap_or_else(|| env.reports_dir.clone());

    match &cli.command {
        Commands::Dump {
            project,
            builds,
            out: out_dir,
        } => {
            let project = resolve_project(project.as_deref(), env)?;
            let store = HistoryStore::new(&reports_dir);
            let summary = dump_recent_builds(&store, &project, *builds, out_dir)
                .with_context(|| format!("Failed to dump results of {}", project))?;
            writeln!(
                out,
                "Wrote {} file(s) for {} build(s) of {} to {}",
                summary.files.len(),
                summary.builds,
                project,
                out_dir.display()
            )?;
        }
        Commands::Show {
            project,
            format,
            snapshots,
        } => {
            let format: OutputFormat = format.parse().map_err(anyhow::Error::msg)?;
            let (title, results) = if *snapshots {
                let results = load_snapshots(&reports_dir.join("latest"))
                    .context("Failed to read result snapshots")?;
                ("Latest snapshots".to_string(), results)
            } else {
                let project = resolve_project(project.as_deref(), env)?;
                let results = latest_per_test(&HistoryStore::new(&reports_dir), &project)?;
                (format!("Latest results for {}", project), results)
            };
            match format {
                OutputFormat::Human => {
                    write!(out, "{}", generate_human_report(&title, &results))?
                }
                OutputFormat::Json => {
                    writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?
                }
            }
        }
        Commands::Init { output, force } => match output {
            Some(path) => write_default_config(path, *force)?,
            None => write!(out, "{}", FileConfig::default_toml())?,
        },
        Commands::Config => {
            let source = env
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string());
            writeln!(out, "config file: {}", source)?;
            writeln!(out, "reports dir: {}", reports_dir.display())?;
            writeln!(out, "defaults:")?;
            writeln!(out, "{}", serde_json::to_string_pretty(&env.defaults)?)?;
        }
    }

    Ok(())
}

fn resolve_project(explicit: Option<&str>, env: &Environment) -> anyhow::Result<String> {
    match explicit.or(env.defaults.project_name.as_deref()) {
        Some(project) if !project.trim().is_empty() => Ok(project.to_string()),
        _ => bail!("No project given: pass --project or set project_name in passbench.toml"),
    }
}

/// Most recent stored result of each test in `project`
fn latest_per_test(store: &HistoryStore, project: &str) -> anyhow::Result<Vec<StoredResult>> {
    let results = store
        .load(project)
        .with_context(|| format!("Failed to load history of {}", project))?;
    Ok(group_results(results)
        .into_values()
        .flat_map(|tests| tests.into_values().filter_map(|mut runs| runs.pop()))
        .collect())
}

fn write_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, FileConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote default configuration to {}", path.display());
    Ok(())
}
