//! Byte-keyed prefix tree used for longest-match lookups.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]; the root is
//! [`Trie::ROOT`]. A node carries a value only when a full key ends there.

use rustc_hash::FxHashMap;

use super::vocab::TokenId;

/// Handle to a node inside a [`Trie`].
pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: FxHashMap<u8, NodeId>,
    value: Option<TokenId>,
}

#[derive(Debug, Clone)]
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Insert `key`, overwriting any value already stored for it.
    pub fn insert(&mut self, key: &[u8], value: TokenId) {
        let mut node = Self::ROOT;
        for &byte in key {
            node = match self.nodes[node].children.get(&byte) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children.insert(byte, child);
                    child
                }
            };
        }
        self.nodes[node].value = Some(value);
    }

    /// Step from `node` along `byte`.
    #[inline]
    pub fn traverse(&self, node: NodeId, byte: u8) -> Option<NodeId> {
        self.nodes.get(node)?.children.get(&byte).copied()
    }

    #[inline]
    pub fn value(&self, node: NodeId) -> Option<TokenId> {
        self.nodes.get(node)?.value
    }

    /// Exact lookup.
    pub fn get(&self, key: &[u8]) -> Option<TokenId> {
        let mut node = Self::ROOT;
        for &byte in key {
            node = self.traverse(node, byte)?;
        }
        self.value(node)
    }

    /// Number of bytes of `text[offset..]` that can be followed through the
    /// tree. The walk does not require the final node to hold a value, so
    /// callers pair it with [`Trie::value`] when they need a complete key.
    pub fn longest_prefix(&self, text: &[u8], offset: usize) -> usize {
        let mut node = Self::ROOT;
        let mut consumed = 0;
        for &byte in text.get(offset..).unwrap_or_default() {
            match self.traverse(node, byte) {
                Some(next) => {
                    node = next;
                    consumed += 1;
                }
                None => break,
            }
        }
        consumed
    }

    /// Iterate over the keys that are prefixes of `text`, shortest first,
    /// yielding `(key_len, value)`.
    pub fn prefix_matches<'a>(&'a self, text: &'a [u8]) -> PrefixMatches<'a> {
        PrefixMatches {
            trie: self,
            text,
            node: Some(Self::ROOT),
            pos: 0,
        }
    }

    /// Node count, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Iterator returned by [`Trie::prefix_matches`].
pub struct PrefixMatches<'a> {
    trie: &'a Trie,
    text: &'a [u8],
    node: Option<NodeId>,
    pos: usize,
}

impl Iterator for PrefixMatches<'_> {
    type Item = (usize, TokenId);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.node {
            let &byte = self.text.get(self.pos)?;
            let next = self.trie.traverse(node, byte);
            self.node = next;
            self.pos += 1;
            if let Some(value) = next.and_then(|n| self.trie.value(n)) {
                return Some((self.pos, value));
            }
        }
        None
    }
}
