//! Scanner module: file discovery, identity resolution, and content hashing.
//!
//! The scan phase is a two-stage pruning pipeline:
//! - [`bucketer`]: walks the tree and groups files by exact byte size
//! - [`hasher`]: streams the content of same-size files through a digest
//!
//! [`identity`] resolves the platform-stable (device, file index) identity
//! used to detect files that are already hardlinked to each other.

pub mod bucketer;
pub mod hasher;
pub mod identity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use bucketer::{bucket_by_size, BucketStats, BucketerConfig};
pub use hasher::{digest_to_hex, hex_to_digest, Digest, HashAlgorithm, HashEngine, HashGroup};
pub use identity::{resolve_identity, FileIdentity};

/// Metadata for a candidate file, captured once during the scan.
///
/// Immutable after creation; the action phase only reads these records.
/// Only `path`, `mtime`, and `identity` are persisted per member - `size` and
/// `digest` are carried at group level and rehydrated on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    #[serde(skip)]
    pub size: u64,
    /// Last modification time.
    pub mtime: DateTime<Utc>,
    /// Platform-stable identity for hardlink detection.
    pub identity: FileIdentity,
    /// Content digest, populated by the hash engine.
    #[serde(skip)]
    pub digest: Option<Digest>,
}

impl FileRecord {
    /// Create a record with no digest yet.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, mtime: DateTime<Utc>, identity: FileIdentity) -> Self {
        Self {
            path,
            size,
            mtime,
            identity,
            digest: None,
        }
    }
}

/// File-scoped access failures during stat or read.
///
/// Always isolated and recorded; never fatal to a scan.
#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    /// Permission was denied when accessing a file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file vanished between discovery and stat/read.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// Any other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl AccessError {
    /// Classify an `io::Error` for a given path.
    #[must_use]
    pub fn from_io(path: &std::path::Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}
