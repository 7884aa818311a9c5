//! Size bucketing: the first pruning stage of duplicate detection.
//!
//! Walks the target tree with `jwalk`, stats each regular file, and groups
//! paths by exact byte size. Buckets with a single member are discarded
//! immediately - unique-sized files cannot be duplicates, so the common case
//! never reaches the hash engine.
//!
//! Per-file stat failures are recorded as skips and never abort the walk.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jwalk::WalkDir;

use super::{identity, AccessError, FileRecord};

/// Configuration for the size bucketing walk.
#[derive(Debug, Clone, Default)]
pub struct BucketerConfig {
    /// Files smaller than this many bytes are excluded.
    pub min_size: u64,
    /// Follow symbolic links during traversal.
    /// Default is off to avoid double-counting and cross-tree surprises.
    pub follow_symlinks: bool,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
}

impl BucketerConfig {
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

    /// Set the shutdown flag for cooperative cancellation.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Statistics from the bucketing walk.
#[derive(Debug, Default)]
pub struct BucketStats {
    /// Regular files that passed the size filter.
    pub files_seen: usize,
    /// Files that landed in a surviving (2+ member) bucket.
    pub files_bucketed: usize,
    /// Sizes with exactly one file, discarded before hashing.
    pub singleton_sizes: usize,
    /// Per-file failures recorded during the walk.
    pub skipped: Vec<AccessError>,
    /// Whether the walk was cut short by the shutdown flag.
    pub interrupted: bool,
}

/// Walk `root` and group candidate files by exact byte size.
///
/// Returns buckets keyed by size (only sizes with 2+ files survive) plus the
/// walk statistics. Member order within a bucket is discovery order, which is
/// deterministic because directory entries are sorted during the walk.
#[must_use]
pub fn bucket_by_size(
    root: &Path,
    config: &BucketerConfig,
) -> (BTreeMap<u64, Vec<FileRecord>>, BucketStats) {
    let mut all_buckets: BTreeMap<u64, Vec<FileRecord>> = BTreeMap::new();
    let mut stats = BucketStats::default();

    let walk_dir = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .skip_hidden(false)
        .process_read_dir(|_depth, _path, _read_dir_state, children| {
            // Sort children for deterministic discovery order.
            children.sort_by(|a, b| match (a, b) {
                (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => std::cmp::Ordering::Equal,
            });
        });

    for entry_result in walk_dir {
        if config.is_shutdown_requested() {
            log::debug!("Bucketer: shutdown requested, stopping walk");
            stats.interrupted = true;
            break;
        }

        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map_or_else(|| root.to_path_buf(), std::borrow::ToOwned::to_owned);
                log::warn!("Walk error for {}: {}", path.display(), e);
                stats.skipped.push(AccessError::Io {
                    path,
                    source: std::io::Error::other(e.to_string()),
                });
                continue;
            }
        };

        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_symlink() && !config.follow_symlinks {
            log::trace!("Skipping symlink: {}", path.display());
            continue;
        }

        match stat_candidate(&path, config) {
            Ok(Some(record)) => {
                stats.files_seen += 1;
                all_buckets.entry(record.size).or_default().push(record);
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("Could not stat {}: {}", path.display(), e);
                stats.skipped.push(e);
            }
        }
    }

    // First pruning stage: a size seen once cannot hold a duplicate.
    let buckets: BTreeMap<u64, Vec<FileRecord>> = all_buckets
        .into_iter()
        .filter(|(size, files)| {
            if files.len() == 1 {
                stats.singleton_sizes += 1;
                log::trace!(
                    "Eliminated unique size {}: {}",
                    size,
                    files[0].path.display()
                );
                false
            } else {
                stats.files_bucketed += files.len();
                true
            }
        })
        .collect();

    log::info!(
        "Size bucketing complete: {} files seen, {} candidates in {} buckets, {} skipped",
        stats.files_seen,
        stats.files_bucketed,
        buckets.len(),
        stats.skipped.len()
    );

    (buckets, stats)
}

/// Stat one candidate and build its record, applying the size filter.
///
/// Returns `Ok(None)` for files filtered out by policy (too small, or not a
/// regular file after following a symlink).
fn stat_candidate(path: &Path, config: &BucketerConfig) -> Result<Option<FileRecord>, AccessError> {
    let metadata = if config.follow_symlinks {
        std::fs::metadata(path)
    } else {
        std::fs::symlink_metadata(path)
    }
    .map_err(|e| AccessError::from_io(path, e))?;

    if !metadata.is_file() {
        return Ok(None);
    }
    let size = metadata.len();
    if size < config.min_size {
        log::trace!("Skipping file under min size ({}): {}", size, path.display());
        return Ok(None);
    }

    let mtime: DateTime<Utc> = metadata
        .modified()
        .map_err(|e| AccessError::from_io(path, e))?
        .into();

    #[cfg(unix)]
    let file_identity = identity::identity_from_metadata(&metadata);
    #[cfg(not(unix))]
    let file_identity = identity::resolve_identity(path)?;

    Ok(Some(FileRecord::new(
        path.to_path_buf(),
        size,
        mtime,
        file_identity,
    )))
}
