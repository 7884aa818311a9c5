//! Content hashing: the second pruning stage of duplicate detection.
//!
//! # Overview
//!
//! Every file that survived size bucketing is streamed through a
//! cryptographic digest on a dedicated rayon pool sized for I/O-bound work.
//! Files are then regrouped by `(size, digest)`; only groups with two or more
//! members are duplicates. BLAKE3 is the default algorithm, SHA-256 is
//! available for interoperability with older scan results.
//!
//! Per-file read failures are recorded and excluded from grouping; they never
//! abort the phase.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::{AccessError, FileRecord};
use crate::progress::ProgressCallback;

/// Fixed-size content digest. Both supported algorithms emit 32 bytes.
pub type Digest = [u8; 32];

/// Read buffer size for streaming hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Render a digest as lowercase hex.
#[must_use]
pub fn digest_to_hex(digest: &Digest) -> String {
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Parse a 64-character lowercase hex string back into a digest.
#[must_use]
pub fn hex_to_digest(hex: &str) -> Option<Digest> {
    if hex.len() != 64 {
        return None;
    }
    let mut digest = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).ok()?;
        digest[i] = u8::from_str_radix(s, 16).ok()?;
    }
    Some(digest)
}

/// Serde adapter storing digests as hex strings in JSON.
pub mod digest_hex {
    use super::{digest_to_hex, hex_to_digest, Digest};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&digest_to_hex(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Digest, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex_to_digest(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid digest hex: {hex}")))
    }
}

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// BLAKE3, the default. Fast and parallel-friendly.
    #[default]
    Blake3,
    /// SHA-256, for compatibility with externally produced results.
    Sha256,
}

impl HashAlgorithm {
    /// Parse an algorithm name as given on the command line.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blake3" => Some(Self::Blake3),
            "sha256" | "sha-256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// A group of same-size files sharing one content digest.
///
/// Member order is the discovery order from the bucketing walk.
#[derive(Debug, Clone)]
pub struct HashGroup {
    /// Size of every member, in bytes.
    pub size: u64,
    /// Shared content digest.
    pub digest: Digest,
    /// Members, in discovery order.
    pub files: Vec<FileRecord>,
}

/// Configuration for the hashing phase.
#[derive(Clone, Default)]
pub struct HashEngineConfig {
    /// Worker threads for the I/O-bound hashing pool. 0 means the default.
    pub io_threads: usize,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl HashEngineConfig {
    /// Default number of hashing threads.
    ///
    /// Hashing is I/O bound on most media, so this is deliberately smaller
    /// than the CPU count.
    pub const DEFAULT_IO_THREADS: usize = 4;

    /// Create a configuration with the default thread count.
    #[must_use]
    pub fn new() -> Self {
        Self {
            io_threads: Self::DEFAULT_IO_THREADS,
            ..Self::default()
        }
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

impl fmt::Debug for HashEngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashEngineConfig")
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag.is_some())
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

/// Statistics from the hashing phase.
#[derive(Debug, Default)]
pub struct HashStats {
    /// Files handed to the engine.
    pub input_files: usize,
    /// Files successfully hashed.
    pub hashed_files: usize,
    /// Files that failed to read.
    pub failed_files: usize,
    /// Total content bytes hashed.
    pub bytes_hashed: u64,
    /// Distinct digests observed across all buckets.
    pub unique_digests: usize,
    /// Per-file failures.
    pub errors: Vec<AccessError>,
    /// Whether hashing was cut short by the shutdown flag.
    pub interrupted: bool,
}

enum Hasher {
    Blake3(blake3::Hasher),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Self::Blake3(blake3::Hasher::new()),
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(data);
            }
            Self::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> Digest {
        match self {
            Self::Blake3(h) => *h.finalize().as_bytes(),
            Self::Sha256(h) => {
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&h.finalize());
                digest
            }
        }
    }
}

/// Streaming hash engine for one algorithm.
#[derive(Debug, Clone, Copy)]
pub struct HashEngine {
    algorithm: HashAlgorithm,
}

impl HashEngine {
    /// Create an engine for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Algorithm this engine computes.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the full content of one file in fixed-size chunks.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError`] when the file cannot be opened or read.
    pub fn hash_file(&self, path: &Path) -> Result<Digest, AccessError> {
        let mut file = File::open(path).map_err(|e| AccessError::from_io(path, e))?;
        let mut hasher = Hasher::new(self.algorithm);
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let read = file
                .read(&mut buffer)
                .map_err(|e| AccessError::from_io(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hasher.finalize())
    }
}

/// Hash every bucket in parallel and regroup by `(size, digest)`.
///
/// Groups with a single member after hashing are discarded. Member order
/// within each group, and group discovery order across the output, follow
/// the bucket input order.
#[must_use]
pub fn hash_buckets(
    algorithm: HashAlgorithm,
    buckets: BTreeMap<u64, Vec<FileRecord>>,
    config: &HashEngineConfig,
) -> (Vec<HashGroup>, HashStats) {
    use rayon::prelude::*;

    let engine = HashEngine::new(algorithm);
    let mut stats = HashStats::default();

    let files: Vec<FileRecord> = buckets.into_values().flatten().collect();
    stats.input_files = files.len();

    if let Some(cb) = &config.progress_callback {
        cb.on_phase_start("Hashing", files.len());
    }

    let threads = if config.io_threads == 0 {
        HashEngineConfig::DEFAULT_IO_THREADS
    } else {
        config.io_threads
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("cr-hash-{i}"))
        .build();

    let shutdown = config.shutdown_flag.clone();
    let progress = config.progress_callback.clone();
    let completed = AtomicUsize::new(0);

    let hash_one = |record: FileRecord| -> (FileRecord, Option<Result<Digest, AccessError>>) {
        if shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
        {
            return (record, None);
        }
        let outcome = engine.hash_file(&record.path);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = &progress {
            let name = record
                .path
                .file_name()
                .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
            cb.on_progress(done, &name);
        }
        (record, Some(outcome))
    };

    // The indexed parallel map preserves input order, so regrouping below
    // sees files in discovery order.
    let outcomes: Vec<(FileRecord, Option<Result<Digest, AccessError>>)> = match pool {
        Ok(pool) => pool.install(|| files.into_par_iter().map(hash_one).collect()),
        Err(e) => {
            log::warn!("Could not build hashing pool ({e}), hashing sequentially");
            files.into_iter().map(hash_one).collect()
        }
    };

    if let Some(cb) = &config.progress_callback {
        cb.on_phase_end("Hashing");
    }

    let mut order: Vec<(u64, Digest)> = Vec::new();
    let mut grouped: HashMap<(u64, Digest), Vec<FileRecord>> = HashMap::new();
    let mut digests_seen: HashSet<Digest> = HashSet::new();

    for (mut record, outcome) in outcomes {
        match outcome {
            Some(Ok(digest)) => {
                stats.hashed_files += 1;
                stats.bytes_hashed += record.size;
                digests_seen.insert(digest);
                record.digest = Some(digest);
                let key = (record.size, digest);
                let members = grouped.entry(key).or_insert_with(|| {
                    order.push(key);
                    Vec::new()
                });
                members.push(record);
            }
            Some(Err(e)) => {
                log::warn!("Could not hash {}: {}", record.path.display(), e);
                stats.failed_files += 1;
                stats.errors.push(e);
            }
            None => stats.interrupted = true,
        }
    }
    stats.unique_digests = digests_seen.len();

    let groups: Vec<HashGroup> = order
        .into_iter()
        .filter_map(|key| {
            let files = grouped.remove(&key)?;
            if files.len() < 2 {
                return None;
            }
            Some(HashGroup {
                size: key.0,
                digest: key.1,
                files,
            })
        })
        .collect();

    log::info!(
        "Hashing complete: {}/{} files hashed, {} duplicate groups, {} failures",
        stats.hashed_files,
        stats.input_files,
        groups.len(),
        stats.failed_files
    );

    (groups, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::FileIdentity;
    use chrono::Utc;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    fn record(path: PathBuf, size: u64, n: u64) -> FileRecord {
        FileRecord::new(
            path,
            size,
            Utc::now(),
            FileIdentity::Posix { dev: 1, inode: n },
        )
    }

    #[test]
    fn test_hex_round_trip() {
        let digest: Digest = [0xAB; 32];
        let hex = digest_to_hex(&digest);
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("abab"));
        assert_eq!(hex_to_digest(&hex), Some(digest));
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert!(hex_to_digest("ab").is_none());
        assert!(hex_to_digest(&"zz".repeat(32)).is_none());
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(HashAlgorithm::parse("blake3"), Some(HashAlgorithm::Blake3));
        assert_eq!(HashAlgorithm::parse("SHA256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("sha-256"), Some(HashAlgorithm::Sha256));
        assert_eq!(HashAlgorithm::parse("md5"), None);
    }

    #[test]
    fn test_same_content_same_digest() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "a.txt", b"identical content");
        let b = create_file(&dir, "b.txt", b"identical content");

        let engine = HashEngine::new(HashAlgorithm::Blake3);
        assert_eq!(engine.hash_file(&a).unwrap(), engine.hash_file(&b).unwrap());
    }

    #[test]
    fn test_different_content_different_digest() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "a.txt", b"content one");
        let b = create_file(&dir, "b.txt", b"content two");

        let engine = HashEngine::new(HashAlgorithm::Blake3);
        assert_ne!(engine.hash_file(&a).unwrap(), engine.hash_file(&b).unwrap());
    }

    #[test]
    fn test_sha256_known_vector() {
        let dir = TempDir::new().unwrap();
        let path = create_file(&dir, "abc.txt", b"abc");

        let engine = HashEngine::new(HashAlgorithm::Sha256);
        let digest = engine.hash_file(&path).unwrap();
        assert_eq!(
            digest_to_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_streams_across_chunk_boundary() {
        let dir = TempDir::new().unwrap();
        let big = vec![0x5Au8; CHUNK_SIZE * 2 + 17];
        let whole = create_file(&dir, "big.bin", &big);

        let engine = HashEngine::new(HashAlgorithm::Blake3);
        let streamed = engine.hash_file(&whole).unwrap();
        assert_eq!(streamed, *blake3::hash(&big).as_bytes());
    }

    #[test]
    fn test_missing_file_is_access_error() {
        let engine = HashEngine::new(HashAlgorithm::Blake3);
        let err = engine.hash_file(Path::new("/no/such/file")).unwrap_err();
        assert!(matches!(err, AccessError::NotFound(_)));
    }

    #[test]
    fn test_hash_buckets_groups_by_content() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "a.txt", b"dup");
        let b = create_file(&dir, "b.txt", b"dup");
        let c = create_file(&dir, "c.txt", b"two"); // same size, different bytes

        let mut buckets = BTreeMap::new();
        buckets.insert(3, vec![record(a, 3, 1), record(b, 3, 2), record(c, 3, 3)]);

        let (groups, stats) = hash_buckets(
            HashAlgorithm::Blake3,
            buckets,
            &HashEngineConfig::new().with_io_threads(2),
        );

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 2);
        assert_eq!(groups[0].size, 3);
        assert_eq!(stats.hashed_files, 3);
        assert_eq!(stats.unique_digests, 2);
        assert_eq!(stats.bytes_hashed, 9);
        for file in &groups[0].files {
            assert_eq!(file.digest, Some(groups[0].digest));
        }
    }

    #[test]
    fn test_hash_buckets_preserves_discovery_order() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "apple.txt", b"dup");
        let b = create_file(&dir, "mango.txt", b"dup");
        let c = create_file(&dir, "zebra.txt", b"dup");

        let mut buckets = BTreeMap::new();
        buckets.insert(
            3,
            vec![
                record(a.clone(), 3, 1),
                record(b.clone(), 3, 2),
                record(c.clone(), 3, 3),
            ],
        );

        let (groups, _) = hash_buckets(HashAlgorithm::Blake3, buckets, &HashEngineConfig::new());
        let paths: Vec<_> = groups[0].files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![a, b, c]);
    }

    #[test]
    fn test_hash_buckets_isolates_failures() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "a.txt", b"dup");
        let b = create_file(&dir, "b.txt", b"dup");
        let gone = dir.path().join("vanished.txt");

        let mut buckets = BTreeMap::new();
        buckets.insert(3, vec![record(a, 3, 1), record(b, 3, 2), record(gone, 3, 3)]);

        let (groups, stats) = hash_buckets(HashAlgorithm::Blake3, buckets, &HashEngineConfig::new());

        assert_eq!(groups.len(), 1);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.errors.len(), 1);
    }

    #[test]
    fn test_hash_buckets_honors_shutdown() {
        let dir = TempDir::new().unwrap();
        let a = create_file(&dir, "a.txt", b"dup");
        let b = create_file(&dir, "b.txt", b"dup");

        let mut buckets = BTreeMap::new();
        buckets.insert(3, vec![record(a, 3, 1), record(b, 3, 2)]);

        let flag = Arc::new(AtomicBool::new(true));
        let config = HashEngineConfig::new().with_shutdown_flag(flag);
        let (groups, stats) = hash_buckets(HashAlgorithm::Blake3, buckets, &config);

        assert!(groups.is_empty());
        assert!(stats.interrupted);
        assert_eq!(stats.hashed_files, 0);
    }
}
