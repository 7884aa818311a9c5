//! Serialized scan result shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::duplicates::DuplicateGroup;
use crate::scanner::HashAlgorithm;

/// Current on-disk format version. Bump on incompatible changes.
pub const RESULT_VERSION: u32 = 1;

/// A complete scan result: the scan parameters plus every duplicate group.
///
/// Serialized as versioned JSON so results survive between the scan and the
/// action phase, possibly across program runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Format version, checked on load.
    pub version: u32,
    /// When the scan completed.
    pub scanned_at: DateTime<Utc>,
    /// Root directory that was scanned.
    pub root: PathBuf,
    /// Minimum file size the scan used.
    pub min_size: u64,
    /// Hash algorithm the scan used.
    pub hash_algorithm: HashAlgorithm,
    /// Duplicate groups, ordered by reclaimable space descending.
    pub groups: Vec<DuplicateGroup>,
}

impl ScanResult {
    /// Total files across all groups.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::len).sum()
    }

    /// Total bytes freed if every group were reduced to one copy.
    #[must_use]
    pub fn total_reclaimable(&self) -> u64 {
        self.groups
            .iter()
            .map(DuplicateGroup::reclaimable_space)
            .sum()
    }
}
