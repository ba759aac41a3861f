//! Source file import
//!
//! Hardware description sources are record-oriented text files. A record is
//! one match pattern line followed by property lines, each starting with a
//! single space and holding `KEY=VALUE`; an empty line ends the record and
//! `#` starts a comment. The parse is tolerant: lines that fit no rule are
//! logged and dropped so one malformed entry cannot poison a whole file.
//!
//! Patterns and values are treated as raw bytes end to end, so sources are
//! read with `read_until` rather than any UTF-8 line iterator.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::trie::Trie;

impl Trie {
    /// Import every record of one source file
    pub fn import_file(&mut self, path: &Path) -> io::Result<()> {
        debug!(file = %path.display(), "reading source file");
        let file = File::open(path)?;
        self.import_records(BufReader::new(file))
    }

    /// Import records from any buffered byte stream
    pub fn import_records<R: BufRead>(&mut self, mut reader: R) -> io::Result<()> {
        let mut line: Vec<u8> = Vec::new();
        let mut pattern: Option<Vec<u8>> = None;

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line[0] == b'#' {
                continue;
            }
            // a blank line ends the record
            if line[0] == b'\n' {
                pattern = None;
                continue;
            }
            if line.len() < 2 {
                continue;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }

            let Some(pat) = pattern.as_deref() else {
                // first line of a record is the match pattern
                pattern = Some(line.clone());
                continue;
            };

            if line[0] != b' ' {
                debug!(
                    line = %String::from_utf8_lossy(&line),
                    "ignoring extra pattern line inside record"
                );
                continue;
            }
            match line.iter().position(|&b| b == b'=') {
                Some(eq) => {
                    let key = &line[1..eq];
                    let value = &line[eq + 1..];
                    self.insert(pat, key, value);
                }
                None => {
                    debug!(
                        line = %String::from_utf8_lossy(&line),
                        "skipping property line without '='"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Collect the source files to compile, in build order
///
/// Scans `dirs` for regular files whose name ends in `suffix`. When the same
/// file name appears in several directories the last directory wins, and the
/// final sequence is sorted by file name, so overrides are deterministic
/// regardless of filesystem order. Unreadable directories are skipped.
pub fn enumerate_sources(dirs: &[PathBuf], suffix: &str) -> Vec<PathBuf> {
    let mut by_name: BTreeMap<OsString, PathBuf> = BTreeMap::new();
    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(dir = %dir.display(), %err, "skipping source directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(suffix) {
                continue;
            }
            by_name.insert(name, path);
        }
    }
    by_name.into_values().collect()
}
