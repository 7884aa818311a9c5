//! Turns raw hash groups into ordered duplicate groups.

use crate::scanner::HashGroup;

use super::DuplicateGroup;

/// Build the final, ordered list of duplicate groups.
///
/// Groups are sorted by reclaimable space (`size * (members - 1)`)
/// descending; the sort is stable, so ties keep their discovery order.
/// Member order inside each group is untouched.
#[must_use]
pub fn build_groups(hash_groups: Vec<HashGroup>) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = hash_groups
        .into_iter()
        .filter(|g| g.files.len() >= 2)
        .map(|g| DuplicateGroup {
            size: g.size,
            digest: g.digest,
            keeper_index: None,
            members: g.files,
        })
        .collect();

    groups.sort_by(|a, b| b.reclaimable_space().cmp(&a.reclaimable_space()));

    log::debug!("Built {} duplicate groups", groups.len());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{FileIdentity, FileRecord};
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(name: &str, size: u64, inode: u64) -> FileRecord {
        FileRecord::new(
            PathBuf::from(name),
            size,
            Utc::now(),
            FileIdentity::Posix { dev: 1, inode },
        )
    }

    fn hash_group(size: u64, tag: u8, names: &[&str]) -> HashGroup {
        HashGroup {
            size,
            digest: [tag; 32],
            files: names
                .iter()
                .enumerate()
                .map(|(i, n)| record(n, size, u64::try_from(i).unwrap() + u64::from(tag) * 100))
                .collect(),
        }
    }

    #[test]
    fn test_orders_by_reclaimable_space_descending() {
        let groups = build_groups(vec![
            hash_group(10, 1, &["a", "b"]),         // reclaimable 10
            hash_group(100, 2, &["c", "d"]),        // reclaimable 100
            hash_group(20, 3, &["e", "f", "g"]),    // reclaimable 40
        ]);

        let reclaimable: Vec<u64> = groups.iter().map(DuplicateGroup::reclaimable_space).collect();
        assert_eq!(reclaimable, vec![100, 40, 10]);
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        // 50*2 == 100*1: equal reclaimable space.
        let groups = build_groups(vec![
            hash_group(50, 1, &["first-a", "first-b", "first-c"]),
            hash_group(100, 2, &["second-a", "second-b"]),
        ]);

        assert_eq!(groups[0].members[0].path, PathBuf::from("first-a"));
        assert_eq!(groups[1].members[0].path, PathBuf::from("second-a"));
    }

    #[test]
    fn test_member_order_preserved() {
        let groups = build_groups(vec![hash_group(10, 1, &["z", "a", "m"])]);
        let names: Vec<_> = groups[0].members.iter().map(|m| m.path.clone()).collect();
        assert_eq!(
            names,
            vec![PathBuf::from("z"), PathBuf::from("a"), PathBuf::from("m")]
        );
    }

    #[test]
    fn test_singletons_dropped() {
        let groups = build_groups(vec![hash_group(10, 1, &["only"])]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_keeper_index_unset_after_build() {
        let groups = build_groups(vec![hash_group(10, 1, &["a", "b"])]);
        assert_eq!(groups[0].keeper_index, None);
    }
}
