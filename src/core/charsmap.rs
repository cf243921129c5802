//! Precompiled character normalization map used by unigram vocabularies.
//!
//! The serialized form is a little-endian `u32` byte count, followed by that
//! many bytes of a compact double-array trie (XCDA), followed by a block of
//! NUL-terminated replacement strings. Trie values are offsets into the
//! replacement block.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CharsMapError {
    #[error("Charsmap blob is too short to hold its header ({0} bytes)")]
    TooShort(usize),
    #[error("Charsmap trie of {trie_bytes} bytes does not fit in a {total} byte blob")]
    TrieOutOfBounds { trie_bytes: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsMap {
    xcda: Vec<u32>,
    replacements: Vec<u8>,
}

impl CharsMap {
    pub fn parse(blob: &[u8]) -> Result<Self, CharsMapError> {
        let header: [u8; 4] = blob
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or(CharsMapError::TooShort(blob.len()))?;
        let trie_bytes = u32::from_le_bytes(header) as usize;
        if trie_bytes + 4 >= blob.len() {
            return Err(CharsMapError::TrieOutOfBounds {
                trie_bytes,
                total: blob.len(),
            });
        }

        let xcda = blob[4..4 + trie_bytes]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let replacements = blob[4 + trie_bytes..].to_vec();
        Ok(Self { xcda, replacements })
    }

    #[inline]
    fn base(&self, index: u32) -> Option<u32> {
        let packed = *self.xcda.get(index as usize)?;
        Some((packed >> 10) << ((packed & (1 << 9)) >> 6))
    }

    #[inline]
    fn lcheck(&self, index: u32) -> Option<u32> {
        let packed = *self.xcda.get(index as usize)?;
        Some(packed & ((1 << 31) | 0xff))
    }

    #[inline]
    fn is_leaf(&self, index: u32) -> Option<bool> {
        let packed = *self.xcda.get(index as usize)?;
        Some((packed >> 8) & 1 == 1)
    }

    #[inline]
    fn value(&self, index: u32) -> Option<u32> {
        let packed = *self.xcda.get(index as usize)?;
        Some(packed & ((1 << 31) - 1))
    }

    /// Longest rule matching a prefix of `input`, as `(replacement, matched_len)`.
    ///
    /// Matching stops at a NUL byte. An index outside the trie ends the walk
    /// as if the path did not exist.
    pub fn longest_match(&self, input: &[u8]) -> Option<(&[u8], usize)> {
        let mut node = self.base(0)?;
        let mut best = None;
        for (i, &c) in input.iter().enumerate() {
            if c == 0 {
                break;
            }
            node ^= u32::from(c);
            if self.lcheck(node) != Some(u32::from(c)) {
                break;
            }
            let Some(leaf) = self.is_leaf(node) else {
                break;
            };
            let Some(base) = self.base(node) else {
                break;
            };
            node ^= base;
            if leaf {
                let Some(value) = self.value(node) else {
                    break;
                };
                best = Some((value as usize, i + 1));
            }
        }

        let (offset, len) = best?;
        let tail = self.replacements.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some((&tail[..end], len))
    }
}
