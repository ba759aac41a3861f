//! Deduplicating string pool
//!
//! Every byte string referenced by the trie (edge prefixes, property keys
//! and values) is interned here. `intern` returns a stable [`StrRef`]
//! handle; equal inputs always yield the same handle. The final byte
//! offsets only exist after [`StringPool::finalize`] has packed the buffer,
//! so handles must not be resolved to offsets before that.
//!
//! Packing shares suffixes: the unique strings are sorted by their reversed
//! bytes, which places every string directly after a superstring it is a
//! suffix of, so `"pC077*"` can reuse the tail of `"usb:v046DpC077*"`
//! including the NUL terminator. Offset 0 always holds the empty string.

use indexmap::IndexSet;

/// Handle for an interned string
///
/// Only meaningful for the pool that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrRef(u32);

/// Append-only interning pool with suffix-shared packing
#[derive(Debug, Default)]
pub struct StringPool {
    strings: IndexSet<Box<[u8]>>,
    offsets: Vec<u64>,
    buf: Vec<u8>,
    in_len: u64,
    in_count: u64,
    shared_len: u64,
    shared_count: u64,
    finalized: bool,
}

impl StringPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a byte string and return its handle
    ///
    /// Must not be called after [`finalize`](Self::finalize).
    pub fn intern(&mut self, bytes: &[u8]) -> StrRef {
        debug_assert!(!self.finalized, "intern called after finalize");
        self.in_count += 1;
        self.in_len += bytes.len() as u64 + 1;
        if let Some(idx) = self.strings.get_index_of(bytes) {
            return StrRef(idx as u32);
        }
        let (idx, _) = self.strings.insert_full(bytes.into());
        StrRef(idx as u32)
    }

    /// The bytes originally passed to `intern` for this handle
    ///
    /// Valid before and after finalization.
    pub fn bytes(&self, r: StrRef) -> &[u8] {
        &self.strings[r.0 as usize]
    }

    /// Pack the buffer and fix all offsets
    ///
    /// Idempotent; after the first call the pool is immutable.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        // offset 0 is the empty string
        self.buf.push(0);
        self.offsets = vec![0; self.strings.len()];

        let mut order: Vec<usize> = (0..self.strings.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            self.strings[b]
                .iter()
                .rev()
                .cmp(self.strings[a].iter().rev())
        });

        // In descending reversed order every string follows its
        // superstrings, so comparing against the last emitted string is
        // enough to find a shareable tail.
        let mut last: Option<(usize, u64)> = None;
        for idx in order {
            let s: &[u8] = &self.strings[idx];
            if s.is_empty() {
                continue;
            }
            if let Some((last_idx, last_off)) = last {
                let l: &[u8] = &self.strings[last_idx];
                if l.len() >= s.len() && &l[l.len() - s.len()..] == s {
                    self.offsets[idx] = last_off + (l.len() - s.len()) as u64;
                    self.shared_count += 1;
                    self.shared_len += s.len() as u64 + 1;
                    continue;
                }
            }
            let off = self.buf.len() as u64;
            self.buf.extend_from_slice(s);
            self.buf.push(0);
            self.offsets[idx] = off;
            last = Some((idx, off));
        }
    }

    /// Final offset of an interned string within the packed buffer
    ///
    /// Only valid after [`finalize`](Self::finalize).
    pub fn offset(&self, r: StrRef) -> u64 {
        debug_assert!(self.finalized, "offset taken before finalize");
        self.offsets[r.0 as usize]
    }

    /// The packed buffer (only after finalization)
    pub fn buffer(&self) -> &[u8] {
        debug_assert!(self.finalized, "buffer read before finalize");
        &self.buf
    }

    /// Size of the packed buffer in bytes (only after finalization)
    pub fn len(&self) -> usize {
        debug_assert!(self.finalized, "len taken before finalize");
        self.buf.len()
    }

    /// Whether the packed buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `finalize` has run
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of unique strings interned
    pub fn unique_count(&self) -> usize {
        self.strings.len()
    }

    /// Total bytes passed to `intern`, counting duplicates and terminators
    pub fn incoming_len(&self) -> u64 {
        self.in_len
    }

    /// Total `intern` calls
    pub fn incoming_count(&self) -> u64 {
        self.in_count
    }

    /// Bytes saved by suffix sharing during packing
    pub fn shared_len(&self) -> u64 {
        self.shared_len
    }

    /// Strings that reuse the tail of another string
    pub fn shared_count(&self) -> u64 {
        self.shared_count
    }
}
