//! The duplicate group: same-size, same-digest files, persisted in results.

use serde::{Deserialize, Serialize};

use crate::scanner::hasher::digest_hex;
use crate::scanner::{digest_to_hex, Digest, FileIdentity, FileRecord};

/// A set of files with identical size and content digest.
///
/// Members keep the discovery order from the scan. A group always has at
/// least two members; [`crate::results`] rejects anything smaller on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    /// Size of every member, in bytes.
    pub size: u64,
    /// Shared content digest, stored as lowercase hex.
    #[serde(with = "digest_hex")]
    pub digest: Digest,
    /// Explicit keeper choice, set by review tooling. Absent after a scan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keeper_index: Option<usize>,
    /// Group members, in discovery order.
    pub members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bytes freed if the group were reduced to a single copy:
    /// `size * (members - 1)`.
    #[must_use]
    pub fn reclaimable_space(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }

    /// The digest as lowercase hex.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_to_hex(&self.digest)
    }

    /// Partition members that are already hardlinked to each other.
    ///
    /// Returns member indices grouped by file identity, keeping only subsets
    /// with two or more entries. Subsets are ordered by their first member
    /// index, and indices within each subset are ascending.
    #[must_use]
    pub fn hardlinked_subsets(&self) -> Vec<Vec<usize>> {
        let mut order: Vec<FileIdentity> = Vec::new();
        let mut by_identity: std::collections::HashMap<FileIdentity, Vec<usize>> =
            std::collections::HashMap::new();

        for (index, member) in self.members.iter().enumerate() {
            let entry = by_identity.entry(member.identity).or_insert_with(|| {
                order.push(member.identity);
                Vec::new()
            });
            entry.push(index);
        }

        order
            .into_iter()
            .filter_map(|identity| {
                let indices = by_identity.remove(&identity)?;
                (indices.len() > 1).then_some(indices)
            })
            .collect()
    }
}
