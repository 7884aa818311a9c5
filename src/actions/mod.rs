//! Action phase: reducing duplicate groups to a single kept copy.
//!
//! [`keeper`] selects which member of each group survives; [`engine`] runs
//! the chosen action (dry-run, quarantine, delete, or hardlink) over a scan
//! result with per-file failure isolation.

pub mod engine;
pub mod keeper;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use engine::{
    ActionConfig, ActionEngine, ActionError, ActionReport, ActionSummary, ConfirmationToken,
    EngineState, QUARANTINE_DIR_NAME,
};
pub use keeper::KeeperPolicy;

/// What to do with the redundant members of each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ActionMode {
    /// Report what would happen; never touch the filesystem.
    #[default]
    DryRun,
    /// Move redundant copies into a quarantine directory.
    Quarantine,
    /// Permanently delete redundant copies.
    Delete,
    /// Replace redundant copies with hardlinks to the keeper.
    Link,
}

impl ActionMode {
    /// Distinct confirmation tokens required before execution.
    ///
    /// Deletion is irreversible and demands two; quarantine and link are
    /// recoverable and demand one; dry-run none.
    #[must_use]
    pub fn required_confirmations(&self) -> usize {
        match self {
            Self::DryRun => 0,
            Self::Quarantine | Self::Link => 1,
            Self::Delete => 2,
        }
    }

    /// Whether the mode destroys data irrecoverably.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl std::fmt::Display for ActionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DryRun => write!(f, "dry-run"),
            Self::Quarantine => write!(f, "quarantine"),
            Self::Delete => write!(f, "delete"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Result of acting on one redundant file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    /// The redundant file the action targeted.
    pub path: PathBuf,
    /// The action that was (or would be) applied.
    pub action: ActionMode,
    /// How it went.
    #[serde(flatten)]
    pub result: OutcomeKind,
}

/// Per-file outcome classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// The action completed (or, in prediction, would complete).
    Succeeded,
    /// The file already shares identity with the keeper; nothing to do.
    AlreadyLinked,
    /// The action failed for this file; others proceed.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}
