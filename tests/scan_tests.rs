//! End-to-end scan pipeline tests: walk, bucket, hash, group, persist.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use clonereaper::duplicates::{DuplicateFinder, FinderConfig};
use clonereaper::results::{ScanResult, RESULT_VERSION};
use clonereaper::scanner::HashAlgorithm;

fn create_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

fn scan(root: &Path) -> ScanResult {
    DuplicateFinder::new(FinderConfig::new(1))
        .scan(root)
        .unwrap()
        .0
}

#[test]
fn same_size_different_content_is_not_a_duplicate() {
    let dir = TempDir::new().unwrap();
    create_file(dir.path(), "one.txt", b"abc");
    create_file(dir.path(), "two.txt", b"abc");
    create_file(dir.path(), "three.txt", b"xyz");

    let result = scan(dir.path());

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.size, 3);
    assert_eq!(group.members.len(), 2);
    let names: Vec<_> = group
        .members
        .iter()
        .map(|m| m.path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert!(names.contains(&"one.txt"));
    assert!(names.contains(&"two.txt"));
    assert!(!names.contains(&"three.txt"));
}

#[test]
fn hardlinked_files_group_with_separate_copies() {
    let dir = TempDir::new().unwrap();
    let a = create_file(dir.path(), "a.txt", b"shared content");
    let b = dir.path().join("b.txt");
    fs::hard_link(&a, &b).unwrap();
    create_file(dir.path(), "c.txt", b"shared content");

    let result = scan(dir.path());

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(group.members.len(), 3);

    // a and b share an identity; c stands alone.
    let subsets = group.hardlinked_subsets();
    assert_eq!(subsets.len(), 1);
    assert_eq!(subsets[0].len(), 2);
    let linked_names: Vec<_> = subsets[0]
        .iter()
        .map(|&i| group.members[i].path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert!(linked_names.contains(&"a.txt"));
    assert!(linked_names.contains(&"b.txt"));
}

#[test]
fn groups_ordered_by_reclaimable_space_descending() {
    let dir = TempDir::new().unwrap();
    // 4-byte pair: 4 reclaimable. 10-byte triple: 20 reclaimable.
    create_file(dir.path(), "s1.txt", b"tiny");
    create_file(dir.path(), "s2.txt", b"tiny");
    create_file(dir.path(), "b1.txt", b"0123456789");
    create_file(dir.path(), "b2.txt", b"0123456789");
    create_file(dir.path(), "b3.txt", b"0123456789");

    let result = scan(dir.path());

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].reclaimable_space(), 20);
    assert_eq!(result.groups[1].reclaimable_space(), 4);
    assert_eq!(result.total_reclaimable(), 24);
}

#[test]
fn nested_directories_are_scanned() {
    let dir = TempDir::new().unwrap();
    create_file(dir.path(), "top.dat", b"payload");
    create_file(dir.path(), "a/b/c/deep.dat", b"payload");

    let result = scan(dir.path());
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].members.len(), 2);
}

#[test]
fn min_size_excludes_small_files() {
    let dir = TempDir::new().unwrap();
    create_file(dir.path(), "small1.txt", b"aa");
    create_file(dir.path(), "small2.txt", b"aa");
    create_file(dir.path(), "big1.txt", b"0123456789");
    create_file(dir.path(), "big2.txt", b"0123456789");

    let (result, _) = DuplicateFinder::new(FinderConfig::new(5))
        .scan(dir.path())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].size, 10);
    assert_eq!(result.min_size, 5);
}

#[test]
fn sha256_and_blake3_find_the_same_groups() {
    let dir = TempDir::new().unwrap();
    create_file(dir.path(), "a.txt", b"dup content");
    create_file(dir.path(), "b.txt", b"dup content");
    create_file(dir.path(), "c.txt", b"other stuff");

    for algorithm in [HashAlgorithm::Blake3, HashAlgorithm::Sha256] {
        let (result, _) =
            DuplicateFinder::new(FinderConfig::new(1).with_algorithm(algorithm))
                .scan(dir.path())
                .unwrap();
        assert_eq!(result.groups.len(), 1, "{algorithm} found wrong groups");
        assert_eq!(result.groups[0].members.len(), 2);
        assert_eq!(result.hash_algorithm, algorithm);
    }
}

#[test]
fn result_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    create_file(dir.path(), "a.txt", b"persisted");
    create_file(dir.path(), "b.txt", b"persisted");

    let result = scan(dir.path());
    let out = dir.path().join("result.json");
    result.save(&out).unwrap();
    let loaded = ScanResult::load(&out).unwrap();

    assert_eq!(loaded.version, RESULT_VERSION);
    assert_eq!(loaded.root, result.root);
    assert_eq!(loaded.min_size, result.min_size);
    assert_eq!(loaded.hash_algorithm, result.hash_algorithm);
    assert_eq!(loaded.groups.len(), result.groups.len());
    for (lg, rg) in loaded.groups.iter().zip(&result.groups) {
        assert_eq!(lg.size, rg.size);
        assert_eq!(lg.digest, rg.digest);
        assert_eq!(lg.keeper_index, rg.keeper_index);
        assert_eq!(lg.members.len(), rg.members.len());
        for (lm, rm) in lg.members.iter().zip(&rg.members) {
            assert_eq!(lm.path, rm.path);
            assert_eq!(lm.identity, rm.identity);
            // Size and digest are rehydrated from the group on load.
            assert_eq!(lm.size, rm.size);
            assert_eq!(lm.digest, rm.digest);
        }
    }
}

#[test]
fn scan_of_unreadable_subdir_is_partial_not_fatal() {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        create_file(dir.path(), "a.txt", b"visible");
        create_file(dir.path(), "b.txt", b"visible");
        let locked = dir.path().join("locked");
        create_file(&locked, "hidden.txt", b"visible");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let outcome = DuplicateFinder::new(FinderConfig::new(1)).scan(dir.path());

        // Restore permissions before asserting so the tempdir can clean up.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let (result, _stats) = outcome.unwrap();
        assert_eq!(result.groups.len(), 1);
        // Running as root sees through the permission bits and finds all
        // three copies; unprivileged runs find the two readable ones.
        assert!(result.groups[0].members.len() >= 2);
    }
}
