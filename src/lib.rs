//! CloneReaper - Duplicate File Finder and Manager
//!
//! A cross-platform Rust library and CLI for finding byte-exact duplicate files
//! using content hashing (BLAKE3 or SHA-256) and eliminating the redundancy by
//! replacing duplicates with hardlinks, quarantining them, or deleting them.
//!
//! The pipeline has two independent phases connected by a durable JSON scan
//! result: `scan` (size bucketing, parallel hashing, duplicate group building)
//! and `act` (keeper selection plus per-file quarantine/delete/link operations
//! under confirmation gates).

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod results;
pub mod scanner;
pub mod signal;
