//! Command-line interface.
//!
//! Three subcommands: `scan` finds duplicates and writes a result file,
//! `act` loads a result file and applies an action to it, and `config`
//! inspects or persists default settings. Keeping scan and act separate lets
//! an operator review the result JSON before anything mutates the
//! filesystem.
//!
//! Stored settings act as defaults throughout; a flag given on the command
//! line always wins over the settings file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::actions::{
    ActionConfig, ActionEngine, ActionMode, ConfirmationToken, KeeperPolicy,
};
use crate::config::{ConfigError, Settings};
use crate::duplicates::{DuplicateFinder, FinderConfig, FinderError};
use crate::error::ExitCode;
use crate::progress::ConsoleProgress;
use crate::results::ScanResult;
use crate::scanner::HashAlgorithm;
use crate::signal::ShutdownHandler;

/// Default result file name for `scan` and `act`.
const DEFAULT_RESULT_FILE: &str = "clonereaper-scan.json";

/// Find and eliminate duplicate files.
#[derive(Debug, Parser)]
#[command(name = "clonereaper", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory tree for duplicate files and write a result file.
    Scan(ScanArgs),
    /// Apply an action to a previously saved scan result.
    Act(ActArgs),
    /// Show or persist default settings.
    Config(ConfigArgs),
}

/// Arguments for `scan`.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan.
    pub path: PathBuf,

    /// Minimum file size in bytes to consider.
    #[arg(long, short = 's')]
    pub min_size: Option<u64>,

    /// Hash algorithm: blake3 or sha256.
    #[arg(long)]
    pub algo: Option<String>,

    /// Where to write the scan result.
    #[arg(long, short = 'o', default_value = DEFAULT_RESULT_FILE)]
    pub output: PathBuf,

    /// Follow symbolic links during the walk.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Worker threads for hashing (0 = default).
    #[arg(long, default_value_t = 0)]
    pub io_threads: usize,
}

/// Arguments for `act`.
#[derive(Debug, Args)]
pub struct ActArgs {
    /// Scan result file to act on.
    #[arg(default_value = DEFAULT_RESULT_FILE)]
    pub result: PathBuf,

    /// Action to apply to redundant copies
    /// (default: dry-run, or the stored actionMode setting).
    #[arg(long, short = 'a', value_enum)]
    pub action: Option<ActionMode>,

    /// Predict outcomes without touching the filesystem.
    #[arg(long)]
    pub dry_run: bool,

    /// Actually mutate the filesystem, overriding a stored dryRun setting.
    #[arg(long, conflicts_with = "dry_run")]
    pub execute: bool,

    /// Confirmation token; repeat for actions needing more than one.
    /// Delete requires two distinct tokens.
    #[arg(long)]
    pub confirm: Vec<String>,

    /// Policy for choosing the kept copy in each group
    /// (default: oldest-mtime, or the stored keepStrategy setting).
    #[arg(long, value_enum)]
    pub keep: Option<KeeperPolicy>,

    /// Quarantine directory (default: CloneReaper_Quarantine under the
    /// scanned root).
    #[arg(long)]
    pub quarantine_root: Option<PathBuf>,
}

/// Arguments for `config`. With no options, prints the stored settings.
#[derive(Debug, Default, Args)]
pub struct ConfigArgs {
    /// Default scan root.
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Default minimum file size in bytes.
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Default hash algorithm: blake3 or sha256.
    #[arg(long)]
    pub hash_algo: Option<String>,

    /// Default action mode for `act`.
    #[arg(long, value_enum)]
    pub action: Option<ActionMode>,

    /// Default keeper policy for `act`.
    #[arg(long, value_enum)]
    pub keep: Option<KeeperPolicy>,

    /// Default quarantine directory.
    #[arg(long)]
    pub quarantine_root: Option<PathBuf>,

    /// Whether `act` defaults to prediction mode (true or false).
    #[arg(long)]
    pub dry_run: Option<bool>,
}

/// `act` parameters after merging flags over stored settings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActOptions {
    mode: ActionMode,
    dry_run: bool,
    keep: KeeperPolicy,
    quarantine_root: Option<PathBuf>,
}

/// Merge `act` flags over the stored settings. Flags always win; a stored
/// value that cannot be parsed is an error, never a silent fallback.
fn resolve_act_options(args: &ActArgs, settings: &Settings) -> Result<ActOptions, ConfigError> {
    let mode = match (&args.action, &settings.action_mode) {
        (Some(mode), _) => *mode,
        (None, Some(name)) => ActionMode::from_str(name, true)
            .map_err(|_| ConfigError::UnsupportedActionMode(name.clone()))?,
        (None, None) => ActionMode::DryRun,
    };

    let keep = match (&args.keep, &settings.keep_strategy) {
        (Some(policy), _) => *policy,
        (None, Some(name)) => KeeperPolicy::from_str(name, true)
            .map_err(|_| ConfigError::UnsupportedKeeperPolicy(name.clone()))?,
        (None, None) => KeeperPolicy::default(),
    };

    let dry_run = if args.execute {
        false
    } else {
        args.dry_run || settings.dry_run
    };

    Ok(ActOptions {
        mode,
        dry_run,
        keep,
        quarantine_root: args
            .quarantine_root
            .clone()
            .or_else(|| settings.quarantine_path.clone()),
    })
}

/// Run the parsed command and translate its result into an exit code.
pub fn run(cli: Cli, shutdown: &ShutdownHandler) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Scan(args) => run_scan(args, cli.quiet, shutdown),
        Commands::Act(args) => run_act(args, shutdown),
        Commands::Config(args) => run_config(args),
    }
}

fn run_scan(args: ScanArgs, quiet: bool, shutdown: &ShutdownHandler) -> anyhow::Result<ExitCode> {
    let settings = Settings::load()?;

    let algorithm = match &args.algo {
        Some(name) => HashAlgorithm::parse(name)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(name.clone()))?,
        None => HashAlgorithm::parse(&settings.hash_algo)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(settings.hash_algo.clone()))?,
    };
    let min_size = match args.min_size {
        Some(size) => size,
        None => u64::try_from(settings.min_size).map_err(|_| ConfigError::NegativeMinSize)?,
    };
    let workers = if args.io_threads == 0 {
        settings.workers
    } else {
        args.io_threads
    };

    let mut config = FinderConfig::new(min_size)
        .with_algorithm(algorithm)
        .with_follow_symlinks(args.follow_symlinks)
        .with_io_threads(workers)
        .with_shutdown_flag(shutdown.get_flag());
    if !quiet {
        config = config.with_progress_callback(Arc::new(ConsoleProgress::new()));
    }

    let finder = DuplicateFinder::new(config);
    let (result, stats) = match finder.scan(&args.path) {
        Ok(ok) => ok,
        Err(FinderError::Interrupted) => return Ok(ExitCode::Interrupted),
        Err(e) => return Err(e.into()),
    };

    result
        .save(&args.output)
        .with_context(|| format!("saving scan result to {}", args.output.display()))?;

    println!(
        "Found {} duplicate groups ({} files, {} reclaimable). Result written to {}",
        result.groups.len(),
        result.total_files(),
        ByteSize(result.total_reclaimable()),
        args.output.display()
    );
    for error in &stats.access_errors {
        log::warn!("Skipped: {error}");
    }

    if result.groups.is_empty() {
        Ok(ExitCode::NoDuplicates)
    } else if stats.access_errors.is_empty() {
        Ok(ExitCode::Success)
    } else {
        Ok(ExitCode::PartialSuccess)
    }
}

fn run_act(args: ActArgs, shutdown: &ShutdownHandler) -> anyhow::Result<ExitCode> {
    let settings = Settings::load()?;
    let options = resolve_act_options(&args, &settings)?;

    let result = ScanResult::load(&args.result)
        .with_context(|| format!("loading scan result from {}", args.result.display()))?;

    if result.groups.is_empty() {
        println!("No duplicate groups in {}", args.result.display());
        return Ok(ExitCode::NoDuplicates);
    }

    let mut config = ActionConfig::new(options.mode)
        .with_dry_run(options.dry_run)
        .with_keeper_policy(options.keep)
        .with_shutdown_flag(shutdown.get_flag());
    if let Some(root) = options.quarantine_root {
        config = config.with_quarantine_root(root);
    }

    let mut engine = ActionEngine::new(result, config);
    for token in args.confirm {
        engine.confirm(ConfirmationToken(token));
    }

    let report = engine.execute()?;
    let summary = report.summary();

    let verb = if report.dry_run { "would reclaim" } else { "reclaimed" };
    println!(
        "{}: {} groups, {} files, {} {verb}, {} failures",
        report.mode,
        summary.groups_processed,
        summary.actions_taken,
        ByteSize(summary.bytes_reclaimed),
        summary.failures
    );

    if report.interrupted {
        Ok(ExitCode::Interrupted)
    } else if summary.failures > 0 {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}

fn run_config(args: ConfigArgs) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load()?;
    let changed = apply_config(&mut settings, &args)?;

    if changed {
        let path = settings.save()?;
        println!("Settings saved to {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(ExitCode::Success)
}

/// Apply `config` options onto the settings, validating values before any
/// of them are stored. Returns whether anything changed.
fn apply_config(settings: &mut Settings, args: &ConfigArgs) -> Result<bool, ConfigError> {
    if let Some(name) = &args.hash_algo {
        HashAlgorithm::parse(name)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(name.clone()))?;
    }

    let mut changed = false;
    if let Some(directory) = &args.directory {
        settings.directory = Some(directory.clone());
        changed = true;
    }
    if let Some(min_size) = args.min_size {
        settings.min_size = i64::try_from(min_size).map_err(|_| ConfigError::NegativeMinSize)?;
        changed = true;
    }
    if let Some(name) = &args.hash_algo {
        settings.hash_algo = name.to_ascii_lowercase();
        changed = true;
    }
    if let Some(mode) = args.action {
        settings.action_mode = Some(mode.to_string());
        changed = true;
    }
    if let Some(policy) = args.keep {
        settings.keep_strategy = Some(policy.to_string());
        changed = true;
    }
    if let Some(root) = &args.quarantine_root {
        settings.quarantine_path = Some(root.clone());
        changed = true;
    }
    if let Some(dry_run) = args.dry_run {
        settings.dry_run = dry_run;
        changed = true;
    }
    Ok(changed)
}
