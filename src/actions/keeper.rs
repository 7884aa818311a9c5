//! Keeper selection: which member of a duplicate group survives.
//!
//! Selection is deterministic and uses only metadata recorded at scan time,
//! so the same result file always yields the same keeper regardless of when
//! or where the action phase runs.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::duplicates::DuplicateGroup;
use crate::scanner::FileRecord;

/// Policy for choosing the kept copy in each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeeperPolicy {
    /// Keep the first-discovered member.
    First,
    /// Keep the member with the earliest modification time. The default:
    /// the oldest copy is most likely the original.
    #[default]
    OldestMtime,
    /// Keep the member with the latest modification time.
    NewestMtime,
    /// Keep the member with the shortest path.
    ShortestPath,
    /// Keep the member with the longest path.
    LongestPath,
}

impl KeeperPolicy {
    /// Select the keeper index for a group.
    ///
    /// Ties under the policy key fall back to shortest path, then
    /// lexicographic path order, then the lowest member index, so the
    /// choice is total and deterministic.
    #[must_use]
    pub fn select(&self, group: &DuplicateGroup) -> usize {
        if matches!(self, Self::First) || group.members.len() < 2 {
            return 0;
        }

        let mut best = 0;
        for index in 1..group.members.len() {
            if self.prefer(&group.members[index], &group.members[best]) == Ordering::Less {
                best = index;
            }
        }
        best
    }

    /// `Less` means `a` is the better keeper than `b`.
    fn prefer(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        let primary = match self {
            Self::First => Ordering::Equal,
            Self::OldestMtime => a.mtime.cmp(&b.mtime),
            Self::NewestMtime => b.mtime.cmp(&a.mtime),
            Self::ShortestPath => path_len(a).cmp(&path_len(b)),
            Self::LongestPath => path_len(b).cmp(&path_len(a)),
        };
        primary
            .then_with(|| path_len(a).cmp(&path_len(b)))
            .then_with(|| a.path.cmp(&b.path))
    }
}

fn path_len(record: &FileRecord) -> usize {
    record.path.as_os_str().len()
}

impl std::fmt::Display for KeeperPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::OldestMtime => write!(f, "oldest-mtime"),
            Self::NewestMtime => write!(f, "newest-mtime"),
            Self::ShortestPath => write!(f, "shortest-path"),
            Self::LongestPath => write!(f, "longest-path"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::FileIdentity;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn member(path: &str, mtime_secs: i64, inode: u64) -> FileRecord {
        FileRecord::new(
            PathBuf::from(path),
            100,
            Utc.timestamp_opt(mtime_secs, 0).unwrap(),
            FileIdentity::Posix { dev: 1, inode },
        )
    }

    fn group(members: Vec<FileRecord>) -> DuplicateGroup {
        DuplicateGroup {
            size: 100,
            digest: [1u8; 32],
            keeper_index: None,
            members,
        }
    }

    #[test]
    fn test_first_keeps_index_zero() {
        let g = group(vec![
            member("/b/newer", 200, 1),
            member("/a/older", 100, 2),
        ]);
        assert_eq!(KeeperPolicy::First.select(&g), 0);
    }

    #[test]
    fn test_oldest_mtime_wins() {
        let g = group(vec![
            member("/copy", 300, 1),
            member("/original", 100, 2),
            member("/backup", 200, 3),
        ]);
        assert_eq!(KeeperPolicy::OldestMtime.select(&g), 1);
    }

    #[test]
    fn test_newest_mtime_wins() {
        let g = group(vec![
            member("/copy", 300, 1),
            member("/original", 100, 2),
        ]);
        assert_eq!(KeeperPolicy::NewestMtime.select(&g), 0);
    }

    #[test]
    fn test_shortest_and_longest_path() {
        let g = group(vec![
            member("/a/very/deep/nested/file.txt", 100, 1),
            member("/f.txt", 100, 2),
        ]);
        assert_eq!(KeeperPolicy::ShortestPath.select(&g), 1);
        assert_eq!(KeeperPolicy::LongestPath.select(&g), 0);
    }

    #[test]
    fn test_mtime_tie_breaks_on_shorter_path() {
        let g = group(vec![
            member("/docs/report-final-v2.txt", 100, 1),
            member("/docs/report.txt", 100, 2),
        ]);
        assert_eq!(KeeperPolicy::OldestMtime.select(&g), 1);
    }

    #[test]
    fn test_full_tie_breaks_lexicographically() {
        // Same mtime, same path length.
        let g = group(vec![member("/dir/bb.txt", 100, 1), member("/dir/aa.txt", 100, 2)]);
        assert_eq!(KeeperPolicy::OldestMtime.select(&g), 1);
    }

    #[test]
    fn test_selection_is_order_independent() {
        let a = member("/one", 100, 1);
        let b = member("/two", 200, 2);
        let c = member("/three", 300, 3);

        let forward = group(vec![a.clone(), b.clone(), c.clone()]);
        let reversed = group(vec![c, b, a]);

        let policy = KeeperPolicy::OldestMtime;
        let kept_forward = &forward.members[policy.select(&forward)].path;
        let kept_reversed = &reversed.members[policy.select(&reversed)].path;
        assert_eq!(kept_forward, kept_reversed);
    }
}
