//! Scan orchestration: walk, bucket, hash, group, assemble the result.
//!
//! # Overview
//!
//! [`DuplicateFinder`] drives the full pipeline for one root directory and
//! produces a [`crate::results::ScanResult`] ready to save or act on.
//!
//! # Example
//!
//! ```no_run
//! use clonereaper::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::new(FinderConfig::new(1));
//! let (result, stats) = finder.scan(Path::new("/data/photos"))?;
//! println!("{} duplicate groups", result.groups.len());
//! # Ok::<(), clonereaper::duplicates::FinderError>(())
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;

use crate::progress::ProgressCallback;
use crate::results::{ScanResult, RESULT_VERSION};
use crate::scanner::{
    bucket_by_size, hasher, AccessError, BucketerConfig, HashAlgorithm,
};

use super::build_groups;

/// Errors that abort a scan entirely.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan root does not exist or is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The scan was interrupted before completing.
    #[error("scan interrupted")]
    Interrupted,
}

/// Configuration for a full duplicate scan.
#[derive(Clone, Default)]
pub struct FinderConfig {
    /// Minimum file size in bytes for candidates.
    pub min_size: u64,
    /// Follow symbolic links during the walk.
    pub follow_symlinks: bool,
    /// Hash algorithm for content verification.
    pub algorithm: HashAlgorithm,
    /// Worker threads for the hashing pool. 0 means the default.
    pub io_threads: usize,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl FinderConfig {
    /// Create a configuration with the given minimum file size.
    #[must_use]
    pub fn new(min_size: u64) -> Self {
        Self {
            min_size,
            ..Self::default()
        }
    }

    /// Enable following symbolic links.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the hash algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("min_size", &self.min_size)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("algorithm", &self.algorithm)
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

/// Aggregated statistics for a completed scan.
#[derive(Debug, Default)]
pub struct ScanStats {
    /// Regular files seen during the walk.
    pub files_seen: usize,
    /// Files that reached the hashing phase.
    pub files_hashed: usize,
    /// Total bytes hashed.
    pub bytes_hashed: u64,
    /// Duplicate groups found.
    pub groups_found: usize,
    /// Per-file failures from both phases.
    pub access_errors: Vec<AccessError>,
}

/// Drives the scan pipeline for a root directory.
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline: bucket by size, hash, group, assemble.
    ///
    /// Per-file failures are collected in [`ScanStats::access_errors`] and do
    /// not abort the scan.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::NotADirectory`] for an invalid root, and
    /// [`FinderError::Interrupted`] when the shutdown flag was raised during
    /// either phase. An interrupted scan produces no partial result.
    pub fn scan(&self, root: &Path) -> Result<(ScanResult, ScanStats), FinderError> {
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.to_path_buf()));
        }

        log::info!(
            "Scanning {} (min size {}, algorithm {})",
            root.display(),
            self.config.min_size,
            self.config.algorithm
        );

        let bucketer_config = BucketerConfig {
            min_size: self.config.min_size,
            follow_symlinks: self.config.follow_symlinks,
            shutdown_flag: self.config.shutdown_flag.clone(),
        };
        let (buckets, bucket_stats) = bucket_by_size(root, &bucketer_config);
        if bucket_stats.interrupted {
            return Err(FinderError::Interrupted);
        }

        let hash_config = hasher::HashEngineConfig {
            io_threads: self.config.io_threads,
            shutdown_flag: self.config.shutdown_flag.clone(),
            progress_callback: self.config.progress_callback.clone(),
        };
        let (hash_groups, hash_stats) =
            hasher::hash_buckets(self.config.algorithm, buckets, &hash_config);
        if hash_stats.interrupted {
            return Err(FinderError::Interrupted);
        }

        let groups = build_groups(hash_groups);

        let mut stats = ScanStats {
            files_seen: bucket_stats.files_seen,
            files_hashed: hash_stats.hashed_files,
            bytes_hashed: hash_stats.bytes_hashed,
            groups_found: groups.len(),
            access_errors: bucket_stats.skipped,
        };
        stats.access_errors.extend(hash_stats.errors);

        let result = ScanResult {
            version: RESULT_VERSION,
            scanned_at: Utc::now(),
            root: root.to_path_buf(),
            min_size: self.config.min_size,
            hash_algorithm: self.config.algorithm,
            groups,
        };

        log::info!(
            "Scan complete: {} groups, {} reclaimable bytes, {} per-file errors",
            result.groups.len(),
            result.total_reclaimable(),
            stats.access_errors.len()
        );

        Ok((result, stats))
    }
}
