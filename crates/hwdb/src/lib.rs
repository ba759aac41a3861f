//! hwdb - Hardware Description Database Compiler
//!
//! hwdb compiles directories of human-readable hardware description files
//! into a single compact binary database, indexed by device match strings
//! ("modalias" patterns). The database is a Patricia trie over the match
//! patterns; a query memory-maps the file and walks the trie directly, so
//! lookups need no parsing and no allocation proportional to file size.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! // Compile every *.hwdb file from the source directories
//! let dirs = [PathBuf::from("/etc/udev/hwdb.d")];
//! hwdb::update(&dirs, Path::new("/etc/udev/hwdb.bin"))?;
//!
//! // Query the compiled database
//! let db = hwdb::Database::open("/etc/udev/hwdb.bin")?;
//! for (key, value) in db.query("usb:v046DpC077d0100")? {
//!     println!("{key}={value}");
//! }
//! # Ok::<(), hwdb::HwdbError>(())
//! ```
//!
//! # Source format
//!
//! ```text
//! # comment
//! usb:v046DpC077*
//!  ID_VENDOR_FROM_DATABASE=Logitech, Inc.
//!  ID_MODEL_FROM_DATABASE=M105 Optical Mouse
//! ```
//!
//! Records are separated by blank lines; the first line is the match
//! pattern, each following line starts with one space and carries a
//! `KEY=VALUE` property. Patterns may use shell-style globs, which are
//! stored literally and only interpreted at query time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod error;
mod fnmatch;
pub mod import;
pub mod strpool;
pub mod trie;
pub mod writer;

pub use database::Database;
pub use error::{HwdbError, Result};
pub use import::enumerate_sources;
pub use strpool::{StrRef, StringPool};
pub use trie::Trie;
pub use writer::{store, DiskStats};

/// On-disk format definitions, re-exported from the `hwdb-format` crate
pub use hwdb_format as format;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// File name suffix selecting hardware description sources
pub const SOURCE_SUFFIX: &str = ".hwdb";

/// Rebuild the binary database from the given source directories
///
/// Sources are gathered with [`enumerate_sources`]: directories listed
/// later override earlier ones per file name. Files that cannot be read
/// are logged and skipped so a single bad source does not prevent the
/// database from being built; failures while writing or committing the
/// output are fatal and leave any previous database in place.
pub fn update(dirs: &[PathBuf], output: &Path) -> Result<DiskStats> {
    let files = enumerate_sources(dirs, SOURCE_SUFFIX);

    let mut trie = Trie::new();
    for file in &files {
        if let Err(err) = trie.import_file(file) {
            warn!(file = %file.display(), %err, "skipping unreadable source file");
        }
    }

    debug!("=== trie in-memory ===");
    debug!(count = trie.node_count(), "nodes");
    debug!(count = trie.child_count(), "children arrays");
    debug!(count = trie.value_count(), "values arrays");
    debug!(
        count = trie.strings().incoming_count(),
        bytes = trie.strings().incoming_len(),
        "strings incoming"
    );

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let stats = store(&mut trie, output)?;

    debug!(
        count = trie.strings().shared_count(),
        bytes = trie.strings().shared_len(),
        "strings deduplicated"
    );

    Ok(stats)
}

/// Library version string
pub const HWDB_VERSION: &str = env!("CARGO_PKG_VERSION");
