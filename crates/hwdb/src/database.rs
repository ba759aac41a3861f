//! Database reader
//!
//! Opens a compiled database (memory-mapped from disk, or from an owned
//! byte buffer) and resolves device match strings against it. The trie is
//! walked directly in the mapped buffer; nothing is parsed up front beyond
//! the header checks.
//!
//! A query descends literally while the stored patterns stay literal. As
//! soon as a glob character appears on an edge, the remaining subtree is
//! expanded into candidate patterns and matched with fnmatch semantics.
//! Properties of every matching pattern are merged into one map; a match
//! found later overrides an earlier value for the same key, so the exact
//! pattern wins over glob patterns.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::str;

use memmap2::Mmap;
use zerocopy::FromBytes;

use hwdb_format::{
    read_cstring, validate_trie, FormatError, TrieChildRec, TrieHeader, TrieNodeRec,
    TrieValueRec, TrieValidationResult, CHILD_RECORD_SIZE, NODE_RECORD_SIZE, VALUE_RECORD_SIZE,
};

use crate::error::Result;
use crate::fnmatch;

/// Storage for database data, either owned or memory-mapped
enum DatabaseStorage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl DatabaseStorage {
    fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseStorage::Owned(v) => v.as_slice(),
            DatabaseStorage::Mmap(m) => &m[..],
        }
    }
}

/// A compiled hardware database ready for queries
///
/// # Examples
///
/// ```no_run
/// use hwdb::Database;
///
/// let db = Database::open("/etc/udev/hwdb.bin")?;
/// for (key, value) in db.query("usb:v046DpC077d0100")? {
///     println!("{key}={value}");
/// }
/// # Ok::<(), hwdb::HwdbError>(())
/// ```
pub struct Database {
    storage: DatabaseStorage,
    header: TrieHeader,
}

/// One node's record and tables, borrowed from the database buffer
#[derive(Clone, Copy)]
struct NodeRef<'a> {
    rec: &'a TrieNodeRec,
    children: &'a [TrieChildRec],
    values: &'a [TrieValueRec],
}

impl Database {
    /// Memory-map and open the database file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file) }?;
        Self::from_storage(DatabaseStorage::Mmap(mmap))
    }

    /// Open a database held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_storage(DatabaseStorage::Owned(bytes))
    }

    fn from_storage(storage: DatabaseStorage) -> Result<Self> {
        let data = storage.as_slice();
        let header = *TrieHeader::ref_from_prefix(data)
            .map_err(|_| FormatError::Truncated {
                expected: hwdb_format::TRIE_HEADER_SIZE as u64,
                actual: data.len() as u64,
            })?
            .0;
        header.validate()?;
        header.validate_bounds(data.len())?;
        Ok(Self { storage, header })
    }

    fn data(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Version of the tool that wrote this file
    pub fn tool_version(&self) -> u64 {
        self.header.tool_version.get()
    }

    /// Look up all properties for a device match string
    ///
    /// Every stored pattern that matches `modalias` contributes its
    /// properties; keys repeated across matches keep the last value found.
    pub fn query(&self, modalias: &str) -> Result<BTreeMap<String, String>> {
        let mut props = BTreeMap::new();
        let mut pattern_buf = Vec::new();
        let root = self.node_at(self.header.nodes_root_off.get())?;
        self.search(root, modalias.as_bytes(), &mut pattern_buf, &mut props)?;
        Ok(props)
    }

    /// Enumerate every `(pattern, key, value)` triple in the database
    pub fn entries(&self) -> Result<Vec<(String, String, String)>> {
        let mut out = Vec::new();
        let root = self.node_at(self.header.nodes_root_off.get())?;
        self.walk(root, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    /// Run the full structural validation pass over the buffer
    pub fn validate(&self) -> TrieValidationResult {
        validate_trie(self.data())
    }

    /// Literal descent along `search`, handing glob work to
    /// [`Self::match_subtree`] as soon as a glob byte shows up.
    fn search<'a>(
        &'a self,
        mut node: NodeRef<'a>,
        search: &[u8],
        buf: &mut Vec<u8>,
        props: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let mut i = 0usize;
        loop {
            let prefix = self.string_at(node.rec.prefix_off.get())?;
            for (p, &c) in prefix.iter().enumerate() {
                if matches!(c, b'*' | b'?' | b'[') {
                    return self.match_subtree(node, p, buf, &search[i + p..], props);
                }
                if search.get(i + p) != Some(&c) {
                    return Ok(());
                }
            }
            i += prefix.len();

            // glob edges are tried first, so the values of a more specific
            // literal match are merged last and win
            for glob in [b'*', b'?', b'['] {
                if let Some(child) = self.lookup_child(node, glob)? {
                    buf.push(glob);
                    self.match_subtree(child, 0, buf, &search[i..], props)?;
                    buf.pop();
                }
            }

            if i == search.len() {
                self.collect_values(node, props)?;
                return Ok(());
            }

            match self.lookup_child(node, search[i])? {
                Some(child) => {
                    node = child;
                    i += 1;
                }
                None => return Ok(()),
            }
        }
    }

    /// Expand every pattern in the subtree into `buf` and fnmatch it
    /// against the remaining search string.
    fn match_subtree(
        &self,
        node: NodeRef<'_>,
        skip: usize,
        buf: &mut Vec<u8>,
        search: &[u8],
        props: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let prefix = self.string_at(node.rec.prefix_off.get())?;
        let mark = buf.len();
        buf.extend_from_slice(&prefix[skip..]);

        for child in node.children {
            buf.push(child.c);
            let child_node = self.node_at(child.child_off.get())?;
            self.match_subtree(child_node, 0, buf, search, props)?;
            buf.pop();
        }

        if !node.values.is_empty() && fnmatch::matches(buf, search) {
            self.collect_values(node, props)?;
        }

        buf.truncate(mark);
        Ok(())
    }

    fn walk(
        &self,
        node: NodeRef<'_>,
        pattern: &mut Vec<u8>,
        out: &mut Vec<(String, String, String)>,
    ) -> Result<()> {
        let prefix = self.string_at(node.rec.prefix_off.get())?;
        let mark = pattern.len();
        pattern.extend_from_slice(prefix);

        for value in node.values {
            let pattern = as_utf8(&pattern[..], node.rec.prefix_off.get())?;
            let key = self.utf8_at(value.key_off.get())?;
            let val = self.utf8_at(value.value_off.get())?;
            out.push((pattern.to_string(), key.to_string(), val.to_string()));
        }
        for child in node.children {
            pattern.push(child.c);
            let child_node = self.node_at(child.child_off.get())?;
            self.walk(child_node, pattern, out)?;
            pattern.pop();
        }

        pattern.truncate(mark);
        Ok(())
    }

    fn collect_values(
        &self,
        node: NodeRef<'_>,
        props: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        for value in node.values {
            let key = self.utf8_at(value.key_off.get())?;
            let val = self.utf8_at(value.value_off.get())?;
            props.insert(key.to_string(), val.to_string());
        }
        Ok(())
    }

    fn lookup_child(&self, node: NodeRef<'_>, c: u8) -> Result<Option<NodeRef<'_>>> {
        match node.children.binary_search_by_key(&c, |e| e.c) {
            Ok(idx) => Ok(Some(self.node_at(node.children[idx].child_off.get())?)),
            Err(_) => Ok(None),
        }
    }

    fn node_at(&self, off: u64) -> Result<NodeRef<'_>> {
        let data = self.data();
        let out_of_bounds = || FormatError::OutOfBounds {
            offset: off,
            len: data.len() as u64,
        };
        let node_region_end = self.header.strings_off() as usize;

        let start = usize::try_from(off).map_err(|_| out_of_bounds())?;
        let rec_end = checked_end(start, NODE_RECORD_SIZE, node_region_end)
            .ok_or_else(out_of_bounds)?;
        let rec = TrieNodeRec::ref_from_bytes(&data[start..rec_end])
            .map_err(|_| out_of_bounds())?;

        let children_len = rec.children_count as usize * CHILD_RECORD_SIZE;
        let children_end =
            checked_end(rec_end, children_len, node_region_end).ok_or_else(out_of_bounds)?;
        let children = <[TrieChildRec]>::ref_from_bytes(&data[rec_end..children_end])
            .map_err(|_| out_of_bounds())?;

        let values_len = usize::try_from(rec.values_count.get())
            .ok()
            .and_then(|n| n.checked_mul(VALUE_RECORD_SIZE))
            .ok_or_else(out_of_bounds)?;
        let values_end =
            checked_end(children_end, values_len, node_region_end).ok_or_else(out_of_bounds)?;
        let values = <[TrieValueRec]>::ref_from_bytes(&data[children_end..values_end])
            .map_err(|_| out_of_bounds())?;

        Ok(NodeRef {
            rec,
            children,
            values,
        })
    }

    fn string_at(&self, off: u64) -> Result<&[u8]> {
        Ok(read_cstring(self.data(), off)?)
    }

    fn utf8_at(&self, off: u64) -> Result<&str> {
        as_utf8(self.string_at(off)?, off)
    }
}

fn as_utf8(bytes: &[u8], off: u64) -> Result<&str> {
    Ok(str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8 { offset: off })?)
}

fn checked_end(start: usize, len: usize, region_end: usize) -> Option<usize> {
    match start.checked_add(len) {
        Some(end) if end <= region_end => Some(end),
        _ => None,
    }
}
