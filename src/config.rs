//! Persistent settings and configuration validation.
//!
//! Settings are stored as JSON in the platform config directory and act as
//! defaults for the CLI; flags always win. Validation happens before any
//! scan or action starts, so a bad configuration can never cause a partial
//! mutation.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::scanner::HashAlgorithm;

/// Settings file name inside the platform config directory.
const SETTINGS_FILE: &str = "clonereaper.json";

/// Configuration errors. Always fatal, always raised before any mutation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Unknown hash algorithm name.
    #[error("unsupported hash algorithm: {0} (expected blake3 or sha256)")]
    UnsupportedAlgorithm(String),

    /// The configured scan root is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Minimum size below zero in the settings file.
    #[error("minimum file size must not be negative")]
    NegativeMinSize,

    /// Unknown keeper policy name in the settings file.
    #[error("unsupported keeper policy: {0} (expected first, oldest-mtime, newest-mtime, shortest-path or longest-path)")]
    UnsupportedKeeperPolicy(String),

    /// Unknown action mode name in the settings file.
    #[error("unsupported action mode: {0} (expected dry-run, quarantine, delete or link)")]
    UnsupportedActionMode(String),

    /// A mutating action was requested without enough distinct
    /// confirmation tokens.
    #[error("{action} requires {required} distinct confirmation(s), got {provided}")]
    MissingConfirmation {
        /// Action that was refused.
        action: String,
        /// Tokens required.
        required: usize,
        /// Distinct tokens provided.
        provided: usize,
    },

    /// The settings file exists but cannot be read or parsed.
    #[error("could not read settings {path}: {reason}")]
    BadSettingsFile {
        /// Settings file path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

/// Persisted user preferences, merged under CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Default scan root.
    pub directory: Option<PathBuf>,
    /// Minimum candidate size in bytes. Signed so a negative value in a
    /// hand-edited file is rejected rather than silently wrapped.
    pub min_size: i64,
    /// Hash algorithm name.
    pub hash_algo: String,
    /// Default `act` to prediction mode unless `--execute` is given.
    pub dry_run: bool,
    /// Default action mode name for `act`.
    pub action_mode: Option<String>,
    /// Hashing worker threads. 0 means the built-in default.
    pub workers: usize,
    /// Default keeper policy name.
    pub keep_strategy: Option<String>,
    /// Default quarantine directory.
    pub quarantine_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: None,
            min_size: 1,
            hash_algo: HashAlgorithm::default().to_string(),
            dry_run: true,
            action_mode: None,
            workers: 0,
            keep_strategy: None,
            quarantine_path: None,
        }
    }
}

impl Settings {
    /// Platform settings path, when a config directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "clonereaper")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Load settings from the platform path, or defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadSettingsFile`] when the file exists but is
    /// unreadable or malformed. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadSettingsFile`] on read or parse failure.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::BadSettingsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::BadSettingsFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Persist settings to the platform path, creating it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadSettingsFile`] on write failure or when no
    /// platform config directory is available.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path().ok_or_else(|| ConfigError::BadSettingsFile {
            path: PathBuf::from(SETTINGS_FILE),
            reason: "no platform config directory available".into(),
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Persist settings to an explicit path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadSettingsFile`] on write failure.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let bad = |reason: String| ConfigError::BadSettingsFile {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| bad(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| bad(e.to_string()))?;
        fs::write(path, json).map_err(|e| bad(e.to_string()))?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Validate and resolve the scan-relevant settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a negative minimum size, an unknown
    /// algorithm, or a scan root that is not a directory.
    pub fn to_scan_config(&self, directory_override: Option<&Path>) -> Result<ScanConfig, ConfigError> {
        let min_size =
            u64::try_from(self.min_size).map_err(|_| ConfigError::NegativeMinSize)?;
        let hash_algo = HashAlgorithm::parse(&self.hash_algo)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(self.hash_algo.clone()))?;

        let directory = directory_override
            .map(Path::to_path_buf)
            .or_else(|| self.directory.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        if !directory.is_dir() {
            return Err(ConfigError::NotADirectory(directory));
        }

        Ok(ScanConfig {
            directory,
            min_size,
            hash_algo,
            workers: self.workers,
        })
    }
}

/// Validated, ready-to-run scan parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Scan root, known to be a directory at validation time.
    pub directory: PathBuf,
    /// Minimum candidate size in bytes.
    pub min_size: u64,
    /// Hash algorithm.
    pub hash_algo: HashAlgorithm,
    /// Hashing worker threads. 0 means the built-in default.
    pub workers: usize,
}
