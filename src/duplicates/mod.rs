//! Duplicate group construction and scan orchestration.
//!
//! [`groups`] defines the persisted duplicate group shape, [`builder`] turns
//! raw hash groups into ordered duplicate groups, and [`finder`] drives the
//! full scan pipeline from root directory to [`crate::results::ScanResult`].

pub mod builder;
pub mod finder;
pub mod groups;

pub use builder::build_groups;
pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanStats};
pub use groups::DuplicateGroup;
