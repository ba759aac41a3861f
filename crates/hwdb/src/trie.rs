//! In-memory radix trie
//!
//! The trie maps match patterns to sets of key/value properties. Each node
//! carries one compressed edge: an interned `prefix` consumed on the way in,
//! a child table sorted by discriminating byte, and a value table sorted by
//! key string. Nodes own their subtrees through plain `Box` links, so the
//! whole structure is released bottom-up when the trie is dropped.

use std::mem;

use crate::strpool::{StrRef, StringPool};

#[derive(Debug)]
pub(crate) struct ChildEntry {
    pub(crate) c: u8,
    pub(crate) node: Box<TrieNode>,
}

#[derive(Debug)]
pub(crate) struct ValueEntry {
    pub(crate) key: StrRef,
    pub(crate) value: StrRef,
}

/// One node of the radix trie
#[derive(Debug)]
pub struct TrieNode {
    pub(crate) prefix: StrRef,
    pub(crate) children: Vec<ChildEntry>,
    pub(crate) values: Vec<ValueEntry>,
}

impl TrieNode {
    fn new(prefix: StrRef) -> Self {
        Self {
            prefix,
            children: Vec::new(),
            values: Vec::new(),
        }
    }

    fn child_index(&self, c: u8) -> Result<usize, usize> {
        self.children.binary_search_by_key(&c, |e| e.c)
    }
}

/// Radix trie under construction, together with its string pool
///
/// Patterns sharing prefixes share nodes; inserting a pattern that diverges
/// in the middle of an existing edge splits that edge. Re-inserting a
/// `(pattern, key)` pair replaces the recorded value.
pub struct Trie {
    pub(crate) root: Box<TrieNode>,
    pub(crate) strings: StringPool,
    nodes_count: u64,
    children_count: u64,
    values_count: u64,
}

impl Trie {
    /// Create a trie holding only a root node with an empty prefix
    pub fn new() -> Self {
        let mut strings = StringPool::new();
        let root = Box::new(TrieNode::new(strings.intern(b"")));
        Self {
            root,
            strings,
            nodes_count: 1,
            children_count: 0,
            values_count: 0,
        }
    }

    /// Record `key=value` under `pattern`
    ///
    /// The pattern is stored as a literal byte sequence; glob characters are
    /// given no meaning here. A later insert with the same pattern and key
    /// replaces the value.
    pub fn insert(&mut self, pattern: &[u8], key: &[u8], value: &[u8]) {
        let Trie {
            root,
            strings,
            nodes_count,
            children_count,
            values_count,
        } = self;

        let mut node: &mut TrieNode = root;
        let mut i = 0usize;
        loop {
            // find where the node's prefix and the remaining pattern diverge
            let (prefix_len, split_at) = {
                let prefix = strings.bytes(node.prefix);
                let mut split = None;
                for (p, &c) in prefix.iter().enumerate() {
                    if pattern.get(i + p) != Some(&c) {
                        split = Some(p);
                        break;
                    }
                }
                (prefix.len(), split)
            };

            if let Some(p) = split_at {
                // Split: the tail of the prefix moves into a new child that
                // adopts this node's children and values wholesale, keeping
                // every existing mapping reachable.
                let (head, edge, tail) = {
                    let prefix = strings.bytes(node.prefix);
                    (prefix[..p].to_vec(), prefix[p], prefix[p + 1..].to_vec())
                };
                let tail_ref = strings.intern(&tail);
                let head_ref = strings.intern(&head);

                let mut adopted = Box::new(TrieNode::new(tail_ref));
                adopted.children = mem::take(&mut node.children);
                adopted.values = mem::take(&mut node.values);
                node.prefix = head_ref;
                node.children.push(ChildEntry {
                    c: edge,
                    node: adopted,
                });
                *nodes_count += 1;
                *children_count += 1;
                i += p;
            } else {
                i += prefix_len;
            }

            if i == pattern.len() {
                Self::upsert_value(strings, node, key, value, values_count);
                return;
            }

            let c = pattern[i];
            match node.child_index(c) {
                Ok(idx) => {
                    node = &mut node.children[idx].node;
                    i += 1;
                }
                Err(idx) => {
                    let rest = strings.intern(&pattern[i + 1..]);
                    let mut child = Box::new(TrieNode::new(rest));
                    Self::upsert_value(strings, &mut child, key, value, values_count);
                    node.children.insert(idx, ChildEntry { c, node: child });
                    *nodes_count += 1;
                    *children_count += 1;
                    return;
                }
            }
        }
    }

    fn upsert_value(
        strings: &mut StringPool,
        node: &mut TrieNode,
        key: &[u8],
        value: &[u8],
        values_count: &mut u64,
    ) {
        let v = strings.intern(value);
        match node
            .values
            .binary_search_by(|e| strings.bytes(e.key).cmp(key))
        {
            Ok(idx) => node.values[idx].value = v,
            Err(idx) => {
                let k = strings.intern(key);
                node.values.insert(idx, ValueEntry { key: k, value: v });
                *values_count += 1;
            }
        }
    }

    /// Seal the string pool so offsets can be resolved
    ///
    /// Must run before serialization; idempotent.
    pub fn finalize(&mut self) {
        self.strings.finalize();
    }

    /// Nodes allocated, including the root
    pub fn node_count(&self) -> u64 {
        self.nodes_count
    }

    /// Child entries across all nodes
    pub fn child_count(&self) -> u64 {
        self.children_count
    }

    /// Value entries across all nodes
    pub fn value_count(&self) -> u64 {
        self.values_count
    }

    /// The string pool backing this trie
    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub(crate) fn parts(&self) -> (&TrieNode, &StringPool) {
        (&self.root, &self.strings)
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flatten the trie into `(pattern, key, value)` triples, in trie order.
    fn entries(trie: &Trie) -> Vec<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        fn walk(
            node: &TrieNode,
            strings: &StringPool,
            pattern: &mut Vec<u8>,
            out: &mut Vec<(Vec<u8>, Vec<u8>, Vec<u8>)>,
        ) {
            let mark = pattern.len();
            pattern.extend_from_slice(strings.bytes(node.prefix));
            for v in &node.values {
                out.push((
                    pattern.clone(),
                    strings.bytes(v.key).to_vec(),
                    strings.bytes(v.value).to_vec(),
                ));
            }
            for child in &node.children {
                pattern.push(child.c);
                walk(&child.node, strings, pattern, out);
                pattern.pop();
            }
            pattern.truncate(mark);
        }

        let mut out = Vec::new();
        walk(&trie.root, &trie.strings, &mut Vec::new(), &mut out);
        out
    }

    fn prefix_of<'a>(trie: &'a Trie, node: &TrieNode) -> &'a [u8] {
        trie.strings.bytes(node.prefix)
    }

    #[test]
    fn test_single_insert() {
        let mut trie = Trie::new();
        trie.insert(b"usb:v046DpC077*", b"ID_VENDOR", b"Logitech");

        assert_eq!(
            entries(&trie),
            vec![(
                b"usb:v046DpC077*".to_vec(),
                b"ID_VENDOR".to_vec(),
                b"Logitech".to_vec()
            )]
        );
        assert_eq!(trie.node_count(), 2);
    }

    #[test]
    fn test_split_on_divergence() {
        let mut trie = Trie::new();
        trie.insert(b"abc", b"k1", b"v1");
        trie.insert(b"abd", b"k2", b"v2");

        // root -> 'a' node("b") -> children 'c' and 'd'
        assert_eq!(trie.root.children.len(), 1);
        let a = &trie.root.children[0];
        assert_eq!(a.c, b'a');
        assert_eq!(prefix_of(&trie, &a.node), b"b");
        assert_eq!(a.node.children.len(), 2);
        assert_eq!(a.node.children[0].c, b'c');
        assert_eq!(a.node.children[1].c, b'd');
        assert_eq!(a.node.children[0].node.values.len(), 1);
        assert_eq!(a.node.children[1].node.values.len(), 1);
        assert!(a.node.values.is_empty());
    }

    #[test]
    fn test_split_mid_edge() {
        let mut trie = Trie::new();
        trie.insert(b"abra", b"k", b"1");
        trie.insert(b"abcd", b"k", b"2");

        let a = &trie.root.children[0];
        assert_eq!(a.c, b'a');
        assert_eq!(prefix_of(&trie, &a.node), b"b");
        let inner = &a.node;
        assert_eq!(inner.children[0].c, b'c');
        assert_eq!(prefix_of(&trie, &inner.children[0].node), b"d");
        assert_eq!(inner.children[1].c, b'r');
        assert_eq!(prefix_of(&trie, &inner.children[1].node), b"a");

        let mut got = entries(&trie);
        got.sort();
        assert_eq!(
            got,
            vec![
                (b"abcd".to_vec(), b"k".to_vec(), b"2".to_vec()),
                (b"abra".to_vec(), b"k".to_vec(), b"1".to_vec()),
            ]
        );
    }

    #[test]
    fn test_overwrite_same_pattern_and_key() {
        let mut trie = Trie::new();
        trie.insert(b"abc", b"k", b"v1");
        trie.insert(b"abc", b"k", b"v2");

        assert_eq!(
            entries(&trie),
            vec![(b"abc".to_vec(), b"k".to_vec(), b"v2".to_vec())]
        );
        assert_eq!(trie.value_count(), 1);
    }

    #[test]
    fn test_pattern_prefix_of_other_pattern() {
        let mut trie = Trie::new();
        trie.insert(b"ab", b"k", b"1");
        trie.insert(b"abc", b"k", b"2");

        let mut got = entries(&trie);
        got.sort();
        assert_eq!(
            got,
            vec![
                (b"ab".to_vec(), b"k".to_vec(), b"1".to_vec()),
                (b"abc".to_vec(), b"k".to_vec(), b"2".to_vec()),
            ]
        );

        // the shorter pattern terminates on the interior node
        let a = &trie.root.children[0];
        assert_eq!(prefix_of(&trie, &a.node), b"b");
        assert_eq!(a.node.values.len(), 1);
        assert_eq!(a.node.children.len(), 1);
    }

    #[test]
    fn test_longer_pattern_inserted_first() {
        let mut trie = Trie::new();
        trie.insert(b"abc", b"k", b"2");
        trie.insert(b"ab", b"k", b"1");

        let mut got = entries(&trie);
        got.sort();
        assert_eq!(
            got,
            vec![
                (b"ab".to_vec(), b"k".to_vec(), b"1".to_vec()),
                (b"abc".to_vec(), b"k".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_values_sorted_by_key() {
        let mut trie = Trie::new();
        trie.insert(b"pat", b"ID_VENDOR", b"Logitech");
        trie.insert(b"pat", b"ID_MODEL", b"Mouse");
        trie.insert(b"pat", b"ID_CLASS", b"hid");

        let node = &trie.root.children[0].node;
        let keys: Vec<_> = node
            .values
            .iter()
            .map(|v| trie.strings.bytes(v.key))
            .collect();
        assert_eq!(keys, vec![b"ID_CLASS".as_slice(), b"ID_MODEL", b"ID_VENDOR"]);
    }

    #[test]
    fn test_children_sorted_by_byte() {
        let mut trie = Trie::new();
        for c in [b'z', b'a', b'm', b'b'] {
            trie.insert(&[c, b'x'], b"k", b"v");
        }
        let bytes: Vec<_> = trie.root.children.iter().map(|e| e.c).collect();
        assert_eq!(bytes, vec![b'a', b'b', b'm', b'z']);
    }

    #[test]
    fn test_many_overlapping_patterns_last_write_wins() {
        let mut trie = Trie::new();
        let patterns: &[&[u8]] = &[
            b"usb:v046DpC077*",
            b"usb:v046Dp*",
            b"usb:v046DpC077d0001",
            b"usb:*",
            b"bluetooth:v001D*",
        ];
        for (n, pat) in patterns.iter().enumerate() {
            trie.insert(pat, b"N", n.to_string().as_bytes());
            trie.insert(pat, b"N", (n * 10).to_string().as_bytes());
        }

        let got = entries(&trie);
        assert_eq!(got.len(), patterns.len());
        for (n, pat) in patterns.iter().enumerate() {
            let (_, _, value) = got
                .iter()
                .find(|(p, _, _)| p == pat)
                .expect("pattern present");
            assert_eq!(value, (n * 10).to_string().as_bytes());
        }
    }
}
