//! The action engine: executes one action mode over a scan result.
//!
//! # Overview
//!
//! The engine is a small state machine. It starts `Configured`, collects
//! confirmation tokens, and on execute either predicts (`DryRun`) or runs
//! (`Confirmed` then `Executing`) the configured action over every group,
//! finishing in `Completed`. Destructive execution is fail-closed: without
//! the required number of distinct tokens, `execute` returns a configuration
//! error before any filesystem mutation.
//!
//! Per-file failures are recorded in the report and never stop the run;
//! a raised shutdown flag stops between files, never mid-operation.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::results::ScanResult;
use crate::scanner::FileRecord;

use super::{ActionMode, ActionOutcome, KeeperPolicy, OutcomeKind};

/// Default quarantine directory name, created under the scan root.
pub const QUARANTINE_DIR_NAME: &str = "CloneReaper_Quarantine";

/// Per-file action failures. File-scoped and non-fatal.
#[derive(thiserror::Error, Debug)]
pub enum ActionError {
    /// The file vanished between scan and action.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination for a move already exists and could not be
    /// disambiguated.
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// Hardlinking across filesystems is impossible.
    #[error("cannot link across filesystems: {src} -> {dst}")]
    CrossDevice {
        /// Keeper path.
        src: PathBuf,
        /// Redundant file path.
        dst: PathBuf,
    },

    /// Any other I/O failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Configured but not yet started.
    Configured,
    /// Predicting outcomes without touching the filesystem.
    DryRun,
    /// Confirmations verified; mutation authorized.
    Confirmed,
    /// Mutating the filesystem.
    Executing,
    /// Finished; the report is final.
    Completed,
}

/// An operator-supplied confirmation token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfirmationToken(pub String);

/// Configuration for one action run.
#[derive(Debug, Clone, Default)]
pub struct ActionConfig {
    /// The action to apply to redundant files.
    pub mode: ActionMode,
    /// Force prediction even for a mutating mode.
    pub dry_run: bool,
    /// Policy for choosing the kept copy.
    pub keeper_policy: KeeperPolicy,
    /// Quarantine destination; defaults to `CloneReaper_Quarantine` under
    /// the scan root.
    pub quarantine_root: Option<PathBuf>,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ActionConfig {
    /// Create a configuration for the given mode.
    #[must_use]
    pub fn new(mode: ActionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Force prediction mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the keeper policy.
    #[must_use]
    pub fn with_keeper_policy(mut self, policy: KeeperPolicy) -> Self {
        self.keeper_policy = policy;
        self
    }

    /// Set an explicit quarantine directory.
    #[must_use]
    pub fn with_quarantine_root(mut self, root: PathBuf) -> Self {
        self.quarantine_root = Some(root);
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }
}

/// Full report of one action run.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReport {
    /// The action mode that ran.
    pub mode: ActionMode,
    /// Whether this was a prediction.
    pub dry_run: bool,
    /// One outcome per redundant file considered.
    pub outcomes: Vec<ActionOutcome>,
    /// Groups fully processed before completion or interruption.
    pub groups_processed: usize,
    /// Bytes actually freed (or, in prediction, that would be freed).
    pub bytes_reclaimed: u64,
    /// Whether the run stopped early on the shutdown flag.
    pub interrupted: bool,
}

impl ActionReport {
    /// Number of failed outcomes.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, OutcomeKind::Failed { .. }))
            .count()
    }

    /// Condensed summary for display and logging.
    #[must_use]
    pub fn summary(&self) -> ActionSummary {
        ActionSummary {
            groups_processed: self.groups_processed,
            actions_taken: self
                .outcomes
                .iter()
                .filter(|o| o.result == OutcomeKind::Succeeded)
                .count(),
            bytes_reclaimed: self.bytes_reclaimed,
            failures: self.failures(),
        }
    }
}

/// Condensed totals from an action run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSummary {
    /// Groups fully processed.
    pub groups_processed: usize,
    /// Files acted on successfully.
    pub actions_taken: usize,
    /// Bytes freed.
    pub bytes_reclaimed: u64,
    /// Files whose action failed.
    pub failures: usize,
}

/// Executes one action mode over a loaded scan result.
#[derive(Debug)]
pub struct ActionEngine {
    result: ScanResult,
    config: ActionConfig,
    tokens: Vec<ConfirmationToken>,
    state: EngineState,
    /// Quarantine destinations claimed during this run, so two same-named
    /// files moved in one batch cannot collide.
    reserved: HashSet<PathBuf>,
}

impl ActionEngine {
    /// Create an engine over a loaded scan result.
    #[must_use]
    pub fn new(result: ScanResult, config: ActionConfig) -> Self {
        Self {
            result,
            config,
            tokens: Vec::new(),
            state: EngineState::Configured,
            reserved: HashSet::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Supply one confirmation token.
    pub fn confirm(&mut self, token: ConfirmationToken) {
        self.tokens.push(token);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Run the configured action over every group.
    ///
    /// In prediction (mode `DryRun`, or `dry_run` set) no filesystem mutation
    /// happens and no confirmations are needed. Otherwise the mode's required
    /// number of distinct tokens must have been supplied via [`confirm`];
    /// a shortfall returns [`ConfigError::MissingConfirmation`] with zero
    /// mutations performed.
    ///
    /// # Errors
    ///
    /// Only configuration errors are returned. Per-file failures are
    /// recorded in the report.
    ///
    /// [`confirm`]: ActionEngine::confirm
    pub fn execute(mut self) -> Result<ActionReport, ConfigError> {
        let predicting = self.config.dry_run || self.config.mode == ActionMode::DryRun;

        if predicting {
            self.state = EngineState::DryRun;
        } else {
            let required = self.config.mode.required_confirmations();
            let distinct: HashSet<&ConfirmationToken> = self.tokens.iter().collect();
            if distinct.len() < required {
                log::warn!(
                    "Refusing {}: {} of {} required confirmations",
                    self.config.mode,
                    distinct.len(),
                    required
                );
                return Err(ConfigError::MissingConfirmation {
                    action: self.config.mode.to_string(),
                    required,
                    provided: distinct.len(),
                });
            }
            self.state = EngineState::Confirmed;
            log::info!(
                "Executing {} over {} groups",
                self.config.mode,
                self.result.groups.len()
            );
            self.state = EngineState::Executing;
        }

        let mut report = ActionReport {
            mode: self.config.mode,
            dry_run: predicting,
            outcomes: Vec::new(),
            groups_processed: 0,
            bytes_reclaimed: 0,
            interrupted: false,
        };

        let groups = std::mem::take(&mut self.result.groups);
        for group in &groups {
            if self.is_shutdown_requested() {
                log::info!("Action run interrupted after {} groups", report.groups_processed);
                report.interrupted = true;
                break;
            }

            let keeper = group
                .keeper_index
                .filter(|&i| i < group.members.len())
                .unwrap_or_else(|| self.config.keeper_policy.select(group));
            let keeper_record = &group.members[keeper];
            log::debug!(
                "Group {} keeping {}",
                group.digest_hex(),
                keeper_record.path.display()
            );

            for (index, member) in group.members.iter().enumerate() {
                if index == keeper {
                    continue;
                }
                if self.is_shutdown_requested() {
                    report.interrupted = true;
                    break;
                }

                let outcome = if predicting {
                    self.predict_one(keeper_record, member)
                } else {
                    self.execute_one(keeper_record, member)
                };

                match &outcome {
                    Ok(OutcomeKind::Succeeded) => report.bytes_reclaimed += group.size,
                    Ok(OutcomeKind::AlreadyLinked | OutcomeKind::Failed { .. }) => {}
                    Err(e) => log::warn!("Action failed for {}: {}", member.path.display(), e),
                }

                report.outcomes.push(ActionOutcome {
                    path: member.path.clone(),
                    action: self.config.mode,
                    result: match outcome {
                        Ok(kind) => kind,
                        Err(e) => OutcomeKind::Failed {
                            reason: e.to_string(),
                        },
                    },
                });
            }

            if report.interrupted {
                break;
            }
            report.groups_processed += 1;
        }

        self.state = EngineState::Completed;
        let summary = report.summary();
        log::info!(
            "Action run complete: {} groups, {} actions, {} bytes, {} failures",
            summary.groups_processed,
            summary.actions_taken,
            summary.bytes_reclaimed,
            summary.failures
        );
        Ok(report)
    }

    /// Predict the outcome for one redundant file without touching it.
    ///
    /// Uses only recorded scan metadata, so predicting twice in a row gives
    /// identical reports.
    fn predict_one(
        &self,
        keeper: &FileRecord,
        member: &FileRecord,
    ) -> Result<OutcomeKind, ActionError> {
        if member.identity == keeper.identity
            && matches!(self.config.mode, ActionMode::Link | ActionMode::DryRun)
        {
            return Ok(OutcomeKind::AlreadyLinked);
        }
        Ok(OutcomeKind::Succeeded)
    }

    fn execute_one(
        &mut self,
        keeper: &FileRecord,
        member: &FileRecord,
    ) -> Result<OutcomeKind, ActionError> {
        match self.config.mode {
            ActionMode::DryRun => self.predict_one(keeper, member),
            ActionMode::Delete => {
                fs::remove_file(&member.path)
                    .map_err(|e| ActionError::from_io(&member.path, e))?;
                log::debug!("Deleted {}", member.path.display());
                Ok(OutcomeKind::Succeeded)
            }
            ActionMode::Quarantine => self.quarantine_one(member),
            ActionMode::Link => self.link_one(keeper, member),
        }
    }

    /// Move one redundant file into the quarantine tree.
    ///
    /// The destination mirrors the file's position relative to the scan
    /// root; name collisions get a numeric suffix.
    fn quarantine_one(&mut self, member: &FileRecord) -> Result<OutcomeKind, ActionError> {
        let quarantine_root = self
            .config
            .quarantine_root
            .clone()
            .unwrap_or_else(|| self.result.root.join(QUARANTINE_DIR_NAME));

        let relative = member
            .path
            .strip_prefix(&self.result.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| {
                PathBuf::from(member.path.file_name().unwrap_or(member.path.as_os_str()))
            });
        let candidate = quarantine_root.join(relative);

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(|e| ActionError::from_io(parent, e))?;
        }

        let destination = self.claim_destination(candidate)?;
        move_file(&member.path, &destination)?;
        log::debug!(
            "Quarantined {} -> {}",
            member.path.display(),
            destination.display()
        );
        Ok(OutcomeKind::Succeeded)
    }

    /// Find a free destination path, adding `_1`, `_2`, ... before the
    /// extension on collision, and reserve it for this run.
    fn claim_destination(&mut self, candidate: PathBuf) -> Result<PathBuf, ActionError> {
        if !candidate.exists() && !self.reserved.contains(&candidate) {
            self.reserved.insert(candidate.clone());
            return Ok(candidate);
        }

        let stem = candidate
            .file_stem()
            .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
        let extension = candidate
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()));
        let parent = candidate.parent().unwrap_or_else(|| Path::new(""));

        for counter in 1..10_000u32 {
            let name = match &extension {
                Some(ext) => format!("{stem}_{counter}{ext}"),
                None => format!("{stem}_{counter}"),
            };
            let alternative = parent.join(name);
            if !alternative.exists() && !self.reserved.contains(&alternative) {
                self.reserved.insert(alternative.clone());
                return Ok(alternative);
            }
        }

        Err(ActionError::DestinationExists(candidate))
    }

    /// Replace one redundant file with a hardlink to the keeper.
    ///
    /// Links to a temporary name first and renames over the original, so the
    /// path never observably disappears.
    fn link_one(
        &self,
        keeper: &FileRecord,
        member: &FileRecord,
    ) -> Result<OutcomeKind, ActionError> {
        if member.identity == keeper.identity {
            log::trace!("Already linked: {}", member.path.display());
            return Ok(OutcomeKind::AlreadyLinked);
        }

        let mut temp_name = member.path.as_os_str().to_owned();
        temp_name.push(".crtmp");
        let temp_path = PathBuf::from(temp_name);

        fs::hard_link(&keeper.path, &temp_path).map_err(|e| {
            if e.kind() == io::ErrorKind::CrossesDevices {
                ActionError::CrossDevice {
                    src: keeper.path.clone(),
                    dst: member.path.clone(),
                }
            } else {
                ActionError::from_io(&member.path, e)
            }
        })?;

        if let Err(e) = fs::rename(&temp_path, &member.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ActionError::from_io(&member.path, e));
        }

        log::debug!(
            "Linked {} -> {}",
            member.path.display(),
            keeper.path.display()
        );
        Ok(OutcomeKind::Succeeded)
    }
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_file(src: &Path, dst: &Path) -> Result<(), ActionError> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(src, dst),
        Err(e) => Err(ActionError::from_io(src, e)),
    }
}

/// Copy `src` to `dst`, then remove `src`. A failed copy must not leave a
/// partial file at the destination.
fn copy_then_remove(src: &Path, dst: &Path) -> Result<(), ActionError> {
    if let Err(e) = fs::copy(src, dst) {
        let _ = fs::remove_file(dst);
        return Err(ActionError::from_io(dst, e));
    }
    fs::remove_file(src).map_err(|e| ActionError::from_io(src, e))
}
