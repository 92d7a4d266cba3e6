//! Compact serializable trie
//!
//! Two representations of the same structure: a mutable [`TrieNode`] tree
//! used while inserting keys, and a frozen [`CompactTrie`] that packs the
//! whole tree into one contiguous byte buffer for allocation-free lookup
//! and byte-for-byte persistence.
//!
//! # Byte layout
//!
//! Nodes are laid out in pre-order. Each node is encoded as:
//!
//! ```text
//! u8            child count
//! [u8, u32-le]  per child: edge byte + absolute offset of the child node
//! u16-le        payload count
//! [u32-le]      payload values
//! ```
//!
//! Child offsets are reserved first and patched in once the child subtree
//! has been written. There is no header or length prefix at this layer;
//! the caller owns buffer boundaries and versioning.

use std::collections::BTreeMap;

const CHILD_SLOT_SIZE: usize = 5;

// =============================================================================
// Mutable build tree
// =============================================================================

/// Mutable trie used to build a [`CompactTrie`]. Discardable after freezing.
#[derive(Debug, Default)]
pub struct TrieNode {
    children: BTreeMap<u8, TrieNode>,
    payload: Vec<u32>,
}

impl TrieNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key, attaching `value` to its terminal node.
    pub fn insert(&mut self, key: &str, value: u32) {
        let mut node = self;
        for &b in key.as_bytes() {
            node = node.children.entry(b).or_default();
        }
        node.payload.push(value);
    }

    /// Freeze the tree into its flat-buffer form. The root lands at offset 0.
    pub fn freeze(&self) -> CompactTrie {
        let mut buf = Vec::new();
        write_node(self, &mut buf);
        CompactTrie { buf, root: 0 }
    }
}

fn write_node(node: &TrieNode, buf: &mut Vec<u8>) -> u32 {
    let offset = buf.len() as u32;

    // The encoding caps fan-out and payload count; exceeding either
    // would truncate silently, so fail the build instead.
    assert!(
        node.children.len() <= u8::MAX as usize,
        "trie node fan-out exceeds 255 children"
    );
    assert!(
        node.payload.len() <= u16::MAX as usize,
        "trie node payload count exceeds 65535"
    );

    buf.push(node.children.len() as u8);
    let slots_start = buf.len();
    buf.resize(slots_start + node.children.len() * CHILD_SLOT_SIZE, 0);

    buf.extend_from_slice(&(node.payload.len() as u16).to_le_bytes());
    for &value in &node.payload {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    for (i, (&edge, child)) in node.children.iter().enumerate() {
        let child_offset = write_node(child, buf);
        let slot = slots_start + i * CHILD_SLOT_SIZE;
        buf[slot] = edge;
        buf[slot + 1..slot + 5].copy_from_slice(&child_offset.to_le_bytes());
    }

    offset
}

// =============================================================================
// Frozen flat-buffer form
// =============================================================================

/// Immutable flat-buffer trie. Lookups never allocate; the buffer written
/// by [`CompactTrie::as_bytes`] is exactly what [`CompactTrie::from_bytes`]
/// reads back.
pub struct CompactTrie {
    buf: Vec<u8>,
    root: u32,
}

impl CompactTrie {
    /// Reconstruct a trie from serialized bytes. `root` is the offset of
    /// the root node (0 for a freshly built buffer).
    pub fn from_bytes(buf: Vec<u8>, root: u32) -> Self {
        Self { buf, root }
    }

    /// The serialized form. Identity with respect to `from_bytes`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Look up `key` exactly. A missing edge is a miss; a hit returns the
    /// terminal node's payload values (possibly empty).
    pub fn find(&self, key: &str) -> Option<Vec<u32>> {
        let mut offset = self.root as usize;
        for &b in key.as_bytes() {
            offset = self.child_offset(offset, b)?;
        }
        self.read_payload(offset)
    }

    /// Walk `key`, accumulating the payload of every node visited along
    /// the path, root included. Prefix-stacked keys ("app" and "apple")
    /// all contribute, in path order. The walk stops at the first missing
    /// edge and returns what was collected up to that point.
    pub fn collect_payload(&self, key: &str) -> Vec<u32> {
        let mut collected = Vec::new();
        let mut offset = self.root as usize;

        if let Some(payload) = self.read_payload(offset) {
            collected.extend(payload);
        }
        for &b in key.as_bytes() {
            offset = match self.child_offset(offset, b) {
                Some(next) => next,
                None => break,
            };
            if let Some(payload) = self.read_payload(offset) {
                collected.extend(payload);
            }
        }

        collected
    }

    fn child_offset(&self, node: usize, edge: u8) -> Option<usize> {
        let count = *self.buf.get(node)? as usize;
        for i in 0..count {
            let slot = node + 1 + i * CHILD_SLOT_SIZE;
            if *self.buf.get(slot)? == edge {
                let bytes = self.buf.get(slot + 1..slot + 5)?;
                return Some(u32::from_le_bytes(bytes.try_into().ok()?) as usize);
            }
        }
        None
    }

    fn read_payload(&self, node: usize) -> Option<Vec<u32>> {
        let count = *self.buf.get(node)? as usize;
        let payload_offset = node + 1 + count * CHILD_SLOT_SIZE;
        let count_bytes = self.buf.get(payload_offset..payload_offset + 2)?;
        let payload_count = u16::from_le_bytes(count_bytes.try_into().ok()?) as usize;

        let mut payload = Vec::with_capacity(payload_count);
        for i in 0..payload_count {
            let start = payload_offset + 2 + i * 4;
            let bytes = self.buf.get(start..start + 4)?;
            payload.push(u32::from_le_bytes(bytes.try_into().ok()?));
        }
        Some(payload)
    }
}

// =============================================================================
// Prefix matcher
// =============================================================================

/// Answers "does this string start with one of these literals" in a
/// single pass over the input. Built once over a small prefix set.
pub struct PrefixMatcher {
    trie: CompactTrie,
    prefixes: Vec<String>,
}

impl PrefixMatcher {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        let mut root = TrieNode::new();
        for (i, prefix) in prefixes.iter().enumerate() {
            root.insert(prefix, i as u32);
        }
        Self {
            trie: root.freeze(),
            prefixes,
        }
    }

    /// Longest prefix of `input` present in the set, if any.
    pub fn longest_match(&self, input: &str) -> Option<&str> {
        let hits = self.trie.collect_payload(input);
        hits.last()
            .map(|&i| self.prefixes[i as usize].as_str())
    }

    pub fn matches(&self, input: &str) -> bool {
        self.longest_match(input).is_some()
    }
}
