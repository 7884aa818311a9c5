//! Versioned persistence for scan results.
//!
//! [`data`] defines the serialized shape, [`io`] handles save/load with
//! version and structure validation.

pub mod data;
pub mod io;

pub use data::{ScanResult, RESULT_VERSION};
pub use io::FormatError;
