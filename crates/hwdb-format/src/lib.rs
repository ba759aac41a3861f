//! hwdb Database File Format
//!
//! This crate defines the binary layout of hwdb database files: a radix trie
//! over device match patterns, serialized with absolute byte offsets so the
//! file can be memory-mapped and walked without any parse step.
//!
//! The layout is produced by the builder in the `hwdb` crate and consumed by
//! its reader; this crate only knows about record shapes, region boundaries
//! and offsets.

// Public modules
pub mod error;
pub mod offset_format;
mod validation;

pub use validation::{validate_trie, TrieStats, TrieValidationResult};

// Re-exports for convenience
pub use error::FormatError;
pub use offset_format::*;
