//! CLI argument parsing and the scan command.

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cache::{ChangeCache, DEFAULT_CACHE_FILE};
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::logging::LogFormat;
use crate::report::{self, DeletionPolicy, ReportStore};
use crate::scan::{RunOptions, ScanOrchestrator};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

/// Summary output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

/// Incremental multi-language project scanner.
///
/// Walks a source tree, extracts functions, classes, routes and a complexity
/// score per file, and merges the results into a JSON report. A content-hash
/// cache makes repeated scans skip unchanged files and follow moved ones.
#[derive(Parser, Debug)]
#[command(name = "projscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Path to config YAML file (default: projscan.yaml in the root, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Additional paths to ignore (relative to the root unless absolute)
    #[arg(long, value_name = "PATH", num_args = 1..)]
    pub ignore: Vec<PathBuf>,

    /// Glob patterns to exclude, matched against root-relative paths
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Worker threads (default: one per core)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Change cache location (default: dependency_cache.json in the current directory)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Directory for the report and context export (default: the project root)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Remove report entries for files deleted since the last scan
    #[arg(long)]
    pub prune_deleted: bool,

    /// Categorize Python classes into maturity level and agent type
    #[arg(long)]
    pub categorize_agents: bool,

    /// Skip writing the context export
    #[arg(long)]
    pub no_context: bool,

    /// Create __init__.py beside every analyzed Python file
    #[arg(long)]
    pub generate_init: bool,

    /// Summary format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Suppress the progress bar and summary
    #[arg(short, long)]
    pub quiet: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Settings after layering CLI flags over the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ignore: Vec<PathBuf>,
    pub exclude_globs: Vec<String>,
    pub extensions: Vec<String>,
    pub workers: usize,
    pub cache_file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub deletion_policy: DeletionPolicy,
    pub options: RunOptions,
}

impl Settings {
    /// Flags win; list flags extend the file's lists.
    pub fn resolve(cli: &Cli, config: ScanConfig) -> Self {
        let mut ignore: Vec<PathBuf> = config.ignore.into_iter().map(PathBuf::from).collect();
        ignore.extend(cli.ignore.iter().cloned());

        let mut exclude_globs = config.exclude_globs;
        exclude_globs.extend(cli.exclude.iter().cloned());

        let deletion_policy = if cli.prune_deleted {
            DeletionPolicy::Prune
        } else {
            config.deletion_policy.unwrap_or_default()
        };

        Self {
            ignore,
            exclude_globs,
            extensions: config.extensions,
            workers: cli.workers.or(config.workers).unwrap_or(0),
            cache_file: cli
                .cache_file
                .clone()
                .or(config.cache_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE)),
            output_dir: cli.output_dir.clone().or(config.output_dir),
            deletion_policy,
            options: RunOptions {
                categorize: cli.categorize_agents || config.categorize.unwrap_or(false),
                export_context: !cli.no_context && config.export_context.unwrap_or(true),
                generate_init: (cli.generate_init || config.generate_init.unwrap_or(false))
                    .then_some(true),
            },
        }
    }
}

/// Run a scan. Returns the process exit code.
///
/// Only setup problems (bad root, bad config) produce [`EXIT_ERROR`]; per-file
/// and store failures are reported but the exit code stays zero.
pub fn run_scan(cli: &Cli) -> anyhow::Result<i32> {
    let (config, config_path) = match ScanConfig::load(&cli.path, cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => return setup_failed(e),
    };
    if let Some(path) = &config_path {
        info!(path = %path.display(), "using config");
    }
    let settings = Settings::resolve(cli, config);

    let cache = ChangeCache::load(&settings.cache_file);
    let orchestrator = match build_orchestrator(&cli.path, cache, &settings) {
        Ok(o) => o,
        Err(e) => return setup_failed(e),
    };

    let output_dir = settings
        .output_dir
        .as_ref()
        .map(|d| resolve_against(orchestrator.root(), d));
    let store = ReportStore::for_project(orchestrator.root(), output_dir.as_deref())
        .with_deletion_policy(settings.deletion_policy);
    let orchestrator = orchestrator
        .with_self_path(store.report_path())
        .with_self_path(store.context_path());

    let show_progress = !cli.quiet && cli.format == OutputFormat::Pretty;
    let bar = progress_bar(show_progress);
    let mut on_progress = |percent: u8| bar.set_position(u64::from(percent));

    let summary = orchestrator.run(&store, settings.options, Some(&mut on_progress));
    bar.finish_and_clear();

    if !cli.quiet {
        match cli.format {
            OutputFormat::Pretty => report::write_pretty(&summary),
            OutputFormat::Json => report::write_json(&summary)?,
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Setup errors become [`EXIT_ERROR`]; anything else propagates.
fn setup_failed(e: ScanError) -> anyhow::Result<i32> {
    if !e.is_setup() {
        return Err(e.into());
    }
    eprintln!("Error: {}", e);
    Ok(EXIT_ERROR)
}

fn build_orchestrator(
    root: &Path,
    cache: ChangeCache,
    settings: &Settings,
) -> crate::error::Result<ScanOrchestrator> {
    Ok(ScanOrchestrator::new(root, cache)?
        .with_ignore_paths(&settings.ignore)
        .with_exclude_globs(&settings.exclude_globs)?
        .with_extensions(&settings.extensions)
        .with_workers(settings.workers))
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn progress_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}%",
    ) {
        bar.set_style(style);
    }
    bar
}
