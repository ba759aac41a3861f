//! Structural validation for untrusted database files
//!
//! Walks every node reachable from the root and checks that all offsets stay
//! inside their regions, that child and value tables are strictly ordered,
//! and that every referenced string is NUL-terminated. Child offsets must be
//! strictly smaller than their parent's offset (the serializer emits
//! children first), which also rules out reference cycles and bounds the
//! walk.

use zerocopy::FromBytes;

use crate::error::FormatError;
use crate::offset_format::{
    read_cstring, TrieChildRec, TrieHeader, TrieNodeRec, TrieValueRec,
    CHILD_RECORD_SIZE, NODE_RECORD_SIZE, TRIE_HEADER_SIZE, VALUE_RECORD_SIZE,
};

/// Result of a structural validation pass
#[derive(Debug, Clone, Default)]
pub struct TrieValidationResult {
    /// Errors found during validation
    pub errors: Vec<String>,
    /// Warnings about suspicious but tolerated structure
    pub warnings: Vec<String>,
    /// Counters accumulated during the walk
    pub stats: TrieStats,
}

/// Counters accumulated while walking the trie
#[derive(Debug, Clone, Copy, Default)]
pub struct TrieStats {
    /// Nodes visited
    pub nodes: u64,
    /// Child entries visited
    pub children: u64,
    /// Value entries visited
    pub values: u64,
    /// Deepest node below the root
    pub max_depth: usize,
}

impl TrieValidationResult {
    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }
}

/// Validate the full structure of a database buffer
pub fn validate_trie(buffer: &[u8]) -> TrieValidationResult {
    let mut result = TrieValidationResult::default();

    let header = match TrieHeader::ref_from_prefix(buffer) {
        Ok((header, _)) => *header,
        Err(_) => {
            result.error(format!(
                "buffer of {} bytes is too small for a header",
                buffer.len()
            ));
            return result;
        }
    };
    if let Err(err) = header.validate() {
        result.error(err.to_string());
        return result;
    }
    if let Err(err) = header.validate_bounds(buffer.len()) {
        result.error(err.to_string());
        return result;
    }

    walk(
        buffer,
        header.strings_off(),
        header.nodes_root_off.get(),
        0,
        &mut result,
    );
    result
}

fn walk(
    buffer: &[u8],
    strings_off: u64,
    node_off: u64,
    depth: usize,
    result: &mut TrieValidationResult,
) {
    result.stats.nodes += 1;
    result.stats.max_depth = result.stats.max_depth.max(depth);

    let (rec, children, values) = match node_at(buffer, strings_off, node_off) {
        Ok(node) => node,
        Err(err) => {
            result.error(format!("node at offset {}: {}", node_off, err));
            return;
        }
    };

    if let Err(err) = check_string(buffer, strings_off, rec.prefix_off.get()) {
        result.error(format!("node at offset {}: prefix: {}", node_off, err));
    }

    if depth > 0 && children.is_empty() && values.is_empty() {
        result.warnings.push(format!(
            "node at offset {} has no children and no values",
            node_off
        ));
    }

    let mut prev_c = None;
    for child in children {
        result.stats.children += 1;
        if prev_c.is_some() && prev_c >= Some(child.c) {
            result.error(format!(
                "node at offset {}: child table not strictly ordered at byte {:#04x}",
                node_off, child.c
            ));
        }
        prev_c = Some(child.c);

        let child_off = child.child_off.get();
        if child_off >= node_off {
            // children are emitted before their parent
            result.error(format!(
                "node at offset {}: child offset {} does not precede its parent",
                node_off, child_off
            ));
            continue;
        }
        walk(buffer, strings_off, child_off, depth + 1, result);
    }

    let mut prev_key: Option<&[u8]> = None;
    for value in values {
        result.stats.values += 1;
        let key = match check_string(buffer, strings_off, value.key_off.get()) {
            Ok(key) => key,
            Err(err) => {
                result.error(format!("node at offset {}: key: {}", node_off, err));
                continue;
            }
        };
        if let Err(err) = check_string(buffer, strings_off, value.value_off.get()) {
            result.error(format!("node at offset {}: value: {}", node_off, err));
        }
        if prev_key.is_some() && prev_key >= Some(key) {
            result.error(format!(
                "node at offset {}: value table not strictly ordered by key",
                node_off
            ));
        }
        prev_key = Some(key);
    }
}

#[allow(clippy::type_complexity)]
fn node_at(
    buffer: &[u8],
    strings_off: u64,
    off: u64,
) -> Result<(&TrieNodeRec, &[TrieChildRec], &[TrieValueRec]), FormatError> {
    let out_of_bounds = || FormatError::OutOfBounds {
        offset: off,
        len: buffer.len() as u64,
    };
    let node_region_end = strings_off as usize;
    let start = usize::try_from(off).map_err(|_| out_of_bounds())?;
    if start < TRIE_HEADER_SIZE {
        return Err(out_of_bounds());
    }

    let rec_end = bounded(start, NODE_RECORD_SIZE, node_region_end).ok_or_else(out_of_bounds)?;
    let rec = TrieNodeRec::ref_from_bytes(&buffer[start..rec_end])
        .map_err(|_| out_of_bounds())?;

    let children_len = rec.children_count as usize * CHILD_RECORD_SIZE;
    let children_end = bounded(rec_end, children_len, node_region_end).ok_or_else(out_of_bounds)?;
    let children = <[TrieChildRec]>::ref_from_bytes(&buffer[rec_end..children_end])
        .map_err(|_| out_of_bounds())?;

    let values_len = usize::try_from(rec.values_count.get())
        .ok()
        .and_then(|n| n.checked_mul(VALUE_RECORD_SIZE))
        .ok_or_else(out_of_bounds)?;
    let values_end = bounded(children_end, values_len, node_region_end).ok_or_else(out_of_bounds)?;
    let values = <[TrieValueRec]>::ref_from_bytes(&buffer[children_end..values_end])
        .map_err(|_| out_of_bounds())?;

    Ok((rec, children, values))
}

fn check_string(buffer: &[u8], strings_off: u64, off: u64) -> Result<&[u8], FormatError> {
    if off < strings_off {
        return Err(FormatError::OutOfBounds {
            offset: off,
            len: buffer.len() as u64,
        });
    }
    read_cstring(buffer, off)
}

fn bounded(start: usize, len: usize, region_end: usize) -> Option<usize> {
    match start.checked_add(len) {
        Some(end) if end <= region_end => Some(end),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::byteorder::little_endian::U64;
    use zerocopy::IntoBytes;

    /// Build a minimal valid file: one leaf under the root, one value.
    ///
    /// String region: "\0" (empty root prefix), "x\0", "k\0", "v\0".
    fn minimal_file() -> Vec<u8> {
        let strings: &[u8] = b"\0x\0k\0v\0";
        let leaf_off = TRIE_HEADER_SIZE as u64;
        let root_off = leaf_off + (NODE_RECORD_SIZE + VALUE_RECORD_SIZE) as u64;
        let nodes_len =
            (2 * NODE_RECORD_SIZE + CHILD_RECORD_SIZE + VALUE_RECORD_SIZE) as u64;
        let strings_off = TRIE_HEADER_SIZE as u64 + nodes_len;

        let mut header = TrieHeader::new(1);
        header.nodes_root_off = U64::new(root_off);
        header.nodes_len = U64::new(nodes_len);
        header.strings_len = U64::new(strings.len() as u64);
        header.file_size = U64::new(strings_off + strings.len() as u64);

        let mut buf = Vec::new();
        buf.extend_from_slice(header.as_bytes());
        // leaf: prefix "x", value k=v
        buf.extend_from_slice(TrieNodeRec::new(strings_off + 1, 0, 1).as_bytes());
        buf.extend_from_slice(TrieValueRec::new(strings_off + 3, strings_off + 5).as_bytes());
        // root: empty prefix, one child under b'a'
        buf.extend_from_slice(TrieNodeRec::new(strings_off, 1, 0).as_bytes());
        buf.extend_from_slice(TrieChildRec::new(b'a', leaf_off).as_bytes());
        buf.extend_from_slice(strings);
        buf
    }

    #[test]
    fn test_validate_minimal_file() {
        let buf = minimal_file();
        let result = validate_trie(&buf);
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert_eq!(result.stats.nodes, 2);
        assert_eq!(result.stats.children, 1);
        assert_eq!(result.stats.values, 1);
        assert_eq!(result.stats.max_depth, 1);
    }

    #[test]
    fn test_validate_rejects_bad_magic() {
        let mut buf = minimal_file();
        buf[0] = b'X';
        let result = validate_trie(&buf);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_rejects_forward_child_offset() {
        let mut buf = minimal_file();
        // child_off lives in the root's child entry, 8 bytes into the record
        let child_entry = TRIE_HEADER_SIZE
            + NODE_RECORD_SIZE
            + VALUE_RECORD_SIZE
            + NODE_RECORD_SIZE
            + 8;
        let root_off = (TRIE_HEADER_SIZE + NODE_RECORD_SIZE + VALUE_RECORD_SIZE) as u64;
        buf[child_entry..child_entry + 8].copy_from_slice(&root_off.to_le_bytes());
        let result = validate_trie(&buf);
        assert!(result
            .errors
            .iter()
            .any(|e| e.contains("does not precede")));
    }

    #[test]
    fn test_validate_rejects_truncated_buffer() {
        let buf = minimal_file();
        let result = validate_trie(&buf[..buf.len() - 2]);
        assert!(!result.is_valid());
    }
}
