//! Save and load scan results with validation.
//!
//! Loading is fail-closed: a version mismatch, malformed JSON, or a
//! structurally invalid group rejects the whole file with a [`FormatError`]
//! rather than acting on partial data.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::data::{ScanResult, RESULT_VERSION};

/// Fatal errors when persisting or loading a scan result.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// File could not be read or written.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path of the result file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Content is not valid result JSON.
    #[error("invalid result file {path}: {source}")]
    Parse {
        /// Path of the result file.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The file declares a format version this build does not support.
    #[error("unsupported result version {found} (supported: {supported})")]
    VersionMismatch {
        /// Version found in the file.
        found: u32,
        /// Version this build reads and writes.
        supported: u32,
    },

    /// The file parsed but violates a structural rule.
    #[error("invalid result structure: {0}")]
    Invalid(String),
}

impl ScanResult {
    /// Write the result as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::Io`] on write failure.
    pub fn save(&self, path: &Path) -> Result<(), FormatError> {
        let file = File::create(path).map_err(|e| FormatError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self).map_err(|e| FormatError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        log::info!("Saved scan result to {}", path.display());
        Ok(())
    }

    /// Load and validate a result file.
    ///
    /// Group-level size and digest are rehydrated onto each member record so
    /// downstream code sees fully populated [`crate::scanner::FileRecord`]s.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] when the file cannot be read, is not valid
    /// JSON, declares an unsupported version, or contains a group with
    /// fewer than two members.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let file = File::open(path).map_err(|e| FormatError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = BufReader::new(file);
        let mut result: Self =
            serde_json::from_reader(reader).map_err(|e| FormatError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;

        if result.version != RESULT_VERSION {
            return Err(FormatError::VersionMismatch {
                found: result.version,
                supported: RESULT_VERSION,
            });
        }

        for (index, group) in result.groups.iter_mut().enumerate() {
            if group.members.len() < 2 {
                return Err(FormatError::Invalid(format!(
                    "group {} has {} member(s), expected at least 2",
                    index,
                    group.members.len()
                )));
            }
            if let Some(keeper) = group.keeper_index {
                if keeper >= group.members.len() {
                    return Err(FormatError::Invalid(format!(
                        "group {} keeper index {} out of range",
                        index, keeper
                    )));
                }
            }
            for member in &mut group.members {
                member.size = group.size;
                member.digest = Some(group.digest);
            }
        }

        log::info!(
            "Loaded scan result from {} ({} groups)",
            path.display(),
            result.groups.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::DuplicateGroup;
    use crate::scanner::{FileIdentity, FileRecord, HashAlgorithm};
    use chrono::Utc;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample_result() -> ScanResult {
        let members = vec![
            FileRecord::new(
                PathBuf::from("/data/a.txt"),
                42,
                Utc::now(),
                FileIdentity::Posix { dev: 1, inode: 10 },
            ),
            FileRecord::new(
                PathBuf::from("/data/b.txt"),
                42,
                Utc::now(),
                FileIdentity::Posix { dev: 1, inode: 11 },
            ),
        ];
        ScanResult {
            version: RESULT_VERSION,
            scanned_at: Utc::now(),
            root: PathBuf::from("/data"),
            min_size: 1,
            hash_algorithm: HashAlgorithm::Blake3,
            groups: vec![DuplicateGroup {
                size: 42,
                digest: [9u8; 32],
                keeper_index: None,
                members,
            }],
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let original = sample_result();

        original.save(&path).unwrap();
        let loaded = ScanResult::load(&path).unwrap();

        assert_eq!(loaded.version, original.version);
        assert_eq!(loaded.root, original.root);
        assert_eq!(loaded.min_size, original.min_size);
        assert_eq!(loaded.hash_algorithm, original.hash_algorithm);
        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.groups[0].digest, original.groups[0].digest);
        assert_eq!(
            loaded.groups[0].members[0].path,
            original.groups[0].members[0].path
        );
    }

    #[test]
    fn test_load_rehydrates_member_size_and_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let original = sample_result();
        original.save(&path).unwrap();

        let loaded = ScanResult::load(&path).unwrap();
        for member in &loaded.groups[0].members {
            assert_eq!(member.size, 42);
            assert_eq!(member.digest, Some([9u8; 32]));
        }
    }

    #[test]
    fn test_load_rejects_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let mut result = sample_result();
        result.version = 99;
        result.save(&path).unwrap();

        let err = ScanResult::load(&path).unwrap_err();
        assert!(matches!(
            err,
            FormatError::VersionMismatch {
                found: 99,
                supported: RESULT_VERSION
            }
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"{ this is not json").unwrap();

        let err = ScanResult::load(&path).unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));
    }

    #[test]
    fn test_load_rejects_single_member_group() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let mut result = sample_result();
        result.groups[0].members.truncate(1);
        result.save(&path).unwrap();

        let err = ScanResult::load(&path).unwrap_err();
        assert!(matches!(err, FormatError::Invalid(_)));
    }

    #[test]
    fn test_load_rejects_out_of_range_keeper() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("result.json");
        let mut result = sample_result();
        result.groups[0].keeper_index = Some(5);
        result.save(&path).unwrap();

        let err = ScanResult::load(&path).unwrap_err();
        assert!(matches!(err, FormatError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ScanResult::load(Path::new("/no/such/result.json")).unwrap_err();
        assert!(matches!(err, FormatError::Io { .. }));
    }
}
