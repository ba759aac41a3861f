//! Error types for the hwdb library
//!
//! A single error type wraps format errors, plain I/O failures, and the
//! commit step of the atomic database replace. Per-line and per-file input
//! problems are not errors at this level; the importer logs and skips them
//! so one bad source cannot deny the whole database.

use std::path::PathBuf;

use thiserror::Error;

pub use hwdb_format::FormatError;

/// Main error type for hwdb operations
#[derive(Error, Debug)]
pub enum HwdbError {
    /// The database file (or the trie being serialized) violates the format
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Renaming the finished temporary file over the target failed
    ///
    /// The temporary file has been removed; a previously existing database
    /// at the target path is left untouched.
    #[error("failed to commit database to '{}': {source}", path.display())]
    Commit {
        /// The target path of the database
        path: PathBuf,
        /// The rename failure
        source: std::io::Error,
    },
}

/// Result type alias for hwdb operations
pub type Result<T> = std::result::Result<T, HwdbError>;
