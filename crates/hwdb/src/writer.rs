//! Two-pass database serializer with atomic replace
//!
//! Pass one sizes the node region so the start of the string region is
//! known before anything is written; every string reference in a record is
//! an absolute file offset. Pass two streams the nodes post-order into a
//! temporary file next to the target: children are written before the
//! parent that points at them, so child offsets are always known. The
//! string region follows, then the header is written back at offset zero.
//! Writing the header last means a file that lost its process mid-build
//! carries no valid signature.
//!
//! The temporary file is set read-only and renamed over the target path as
//! the single commit point. Any failure before the rename removes the
//! temporary file and leaves a previously existing database untouched.

use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;
use zerocopy::IntoBytes;

use hwdb_format::{
    FormatError, TrieChildRec, TrieHeader, TrieNodeRec, TrieValueRec, CHILD_RECORD_SIZE,
    NODE_RECORD_SIZE, TRIE_HEADER_SIZE, VALUE_RECORD_SIZE,
};

use crate::error::{HwdbError, Result};
use crate::strpool::StringPool;
use crate::trie::{Trie, TrieNode};

/// Counters describing a written database file
#[derive(Debug, Clone, Copy)]
pub struct DiskStats {
    /// Total file size in bytes
    pub file_size: u64,
    /// Size of the node region in bytes
    pub nodes_len: u64,
    /// Size of the string region in bytes
    pub strings_len: u64,
    /// Node records written
    pub nodes: u64,
    /// Child entries written
    pub children: u64,
    /// Value entries written
    pub values: u64,
}

/// Serialize the trie and atomically replace the database at `path`
pub fn store(trie: &mut Trie, path: &Path) -> Result<DiskStats> {
    trie.finalize();
    let (root, strings) = trie.parts();

    // pass 1: the node region size fixes where the string region starts
    let nodes_len = region_size(root)?;
    let strings_off = TRIE_HEADER_SIZE as u64 + nodes_len;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".hwdb-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    set_database_permissions(tmp.as_file())?;

    // pass 2: post-order node emission, then the string region
    let (root_off, nodes, children, values) = {
        let mut emitter = Emitter {
            w: BufWriter::new(tmp.as_file_mut()),
            pos: TRIE_HEADER_SIZE as u64,
            strings,
            strings_off,
            nodes: 0,
            children: 0,
            values: 0,
        };
        emitter.w.seek(SeekFrom::Start(TRIE_HEADER_SIZE as u64))?;
        let root_off = emitter.emit(root)?;
        debug_assert_eq!(emitter.pos, strings_off);
        emitter.w.write_all(strings.buffer())?;
        emitter.w.flush()?;
        (root_off, emitter.nodes, emitter.children, emitter.values)
    };

    let mut header = TrieHeader::new(tool_version());
    header.file_size = (strings_off + strings.len() as u64).into();
    header.nodes_root_off = root_off.into();
    header.nodes_len = nodes_len.into();
    header.strings_len = (strings.len() as u64).into();

    let stats = DiskStats {
        file_size: header.file_size.get(),
        nodes_len,
        strings_len: strings.len() as u64,
        nodes,
        children,
        values,
    };

    let file = tmp.as_file_mut();
    file.seek(SeekFrom::Start(0))?;
    file.write_all(header.as_bytes())?;

    tmp.persist(path).map_err(|err| HwdbError::Commit {
        path: path.to_path_buf(),
        source: err.error,
    })?;

    debug!("=== trie on-disk ===");
    debug!(bytes = stats.file_size, "size");
    debug!(bytes = TRIE_HEADER_SIZE, "header");
    debug!(
        bytes = stats.nodes * NODE_RECORD_SIZE as u64,
        count = stats.nodes,
        "nodes"
    );
    debug!(
        bytes = stats.children * CHILD_RECORD_SIZE as u64,
        count = stats.children,
        "child entries"
    );
    debug!(
        bytes = stats.values * VALUE_RECORD_SIZE as u64,
        count = stats.values,
        "value entries"
    );
    debug!(bytes = stats.strings_len, start = strings_off, "string store");

    Ok(stats)
}

/// Bytes the node region needs for this subtree
fn region_size(node: &TrieNode) -> Result<u64> {
    if node.children.len() > u8::MAX as usize {
        return Err(FormatError::TooManyChildren(node.children.len()).into());
    }
    let mut size = (NODE_RECORD_SIZE
        + node.children.len() * CHILD_RECORD_SIZE
        + node.values.len() * VALUE_RECORD_SIZE) as u64;
    for child in &node.children {
        size += region_size(&child.node)?;
    }
    Ok(size)
}

struct Emitter<'a, W: Write> {
    w: W,
    pos: u64,
    strings: &'a StringPool,
    strings_off: u64,
    nodes: u64,
    children: u64,
    values: u64,
}

impl<W: Write> Emitter<'_, W> {
    /// Write the subtree below `node` and return the node's file offset
    fn emit(&mut self, node: &TrieNode) -> Result<u64> {
        let mut child_recs = Vec::with_capacity(node.children.len());
        for entry in &node.children {
            let child_off = self.emit(&entry.node)?;
            child_recs.push(TrieChildRec::new(entry.c, child_off));
        }

        let node_off = self.pos;
        let rec = TrieNodeRec::new(
            self.strings_off + self.strings.offset(node.prefix),
            node.children.len() as u8,
            node.values.len() as u64,
        );
        self.write(rec.as_bytes())?;

        for rec in &child_recs {
            self.write(rec.as_bytes())?;
            self.children += 1;
        }
        for value in &node.values {
            let rec = TrieValueRec::new(
                self.strings_off + self.strings.offset(value.key),
                self.strings_off + self.strings.offset(value.value),
            );
            self.write(rec.as_bytes())?;
            self.values += 1;
        }

        self.nodes += 1;
        Ok(node_off)
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.w.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }
}

#[cfg(unix)]
fn set_database_permissions(file: &std::fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
fn set_database_permissions(_file: &std::fs::File) -> io::Result<()> {
    Ok(())
}

fn tool_version() -> u64 {
    env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0)
}
