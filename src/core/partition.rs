//! Splitting raw input around special tokens.
//!
//! Before any subword scheme runs, the input is cut into an ordered list of
//! [`Fragment`]s: spans of raw text still to be segmented, and special tokens
//! that were matched literally. Special tokens are tried longest text first;
//! each one splits every raw fragment produced by the tokens before it.
//! Tokens marked `LSTRIP`/`RSTRIP` also swallow adjacent whitespace.

use std::ops::Range;

use aho_corasick::AhoCorasick;

use super::vocab::{TokenAttr, TokenId, Vocabulary};

/// A piece of the partitioned input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment<'a> {
    /// A special token matched at `offset..offset + len` of the input.
    Token {
        id: TokenId,
        offset: usize,
        len: usize,
    },
    /// Text still to be tokenized, starting at `offset` of the input.
    RawText { text: &'a [u8], offset: usize },
}

impl Fragment<'_> {
    /// Byte span of the fragment within the partitioned input.
    pub fn span(&self) -> Range<usize> {
        match *self {
            Fragment::Token { offset, len, .. } => offset..offset + len,
            Fragment::RawText { text, offset } => offset..offset + text.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct SpecialMatcher {
    id: TokenId,
    attr: TokenAttr,
    len: usize,
    finder: AhoCorasick,
}

/// Partitions input text around the special tokens of a vocabulary.
#[derive(Debug, Clone)]
pub struct FragmentPartitioner {
    matchers: Vec<SpecialMatcher>,
}

impl FragmentPartitioner {
    pub fn new(vocab: &Vocabulary) -> Result<Self, aho_corasick::BuildError> {
        let mut matchers = Vec::with_capacity(vocab.special_tokens_by_length().len());
        for &id in vocab.special_tokens_by_length() {
            let Some(entry) = vocab.entry(id) else {
                continue;
            };
            if entry.text.is_empty() {
                continue;
            }
            matchers.push(SpecialMatcher {
                id,
                attr: entry.attr,
                len: entry.text.len(),
                finder: AhoCorasick::new([&entry.text])?,
            });
        }
        Ok(Self { matchers })
    }

    /// Number of special tokens this partitioner can match.
    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Split `text` into fragments.
    ///
    /// When `parse_special` is false, CONTROL and UNKNOWN tokens are left in
    /// the raw text; USER_DEFINED tokens always match.
    pub fn partition<'a>(&self, text: &'a [u8], parse_special: bool) -> Vec<Fragment<'a>> {
        let mut fragments = Vec::new();
        if text.is_empty() {
            return fragments;
        }
        fragments.push(Fragment::RawText { text, offset: 0 });

        for matcher in &self.matchers {
            if !parse_special && matcher.attr.intersects(TokenAttr::CONTROL | TokenAttr::UNKNOWN) {
                continue;
            }
            let mut next = Vec::with_capacity(fragments.len() + 2);
            for fragment in fragments {
                match fragment {
                    Fragment::RawText { text, offset } => matcher.split(text, offset, &mut next),
                    token => next.push(token),
                }
            }
            fragments = next;
        }
        fragments
    }
}

impl SpecialMatcher {
    fn split<'a>(&self, text: &'a [u8], base: usize, out: &mut Vec<Fragment<'a>>) {
        let mut start = 0;
        while start < text.len() {
            let Some(found) = self.finder.find(&text[start..]) else {
                break;
            };
            let match_start = start + found.start();
            let match_end = match_start + self.len;

            let mut left_end = match_start;
            if self.attr.contains(TokenAttr::LSTRIP) {
                while left_end > start && is_space(text[left_end - 1]) {
                    left_end -= 1;
                }
            }
            if left_end > start {
                out.push(Fragment::RawText {
                    text: &text[start..left_end],
                    offset: base + start,
                });
            }

            out.push(Fragment::Token {
                id: self.id,
                offset: base + match_start,
                len: self.len,
            });

            let mut right_start = match_end;
            if self.attr.contains(TokenAttr::RSTRIP) {
                while right_start < text.len() && is_space(text[right_start]) {
                    right_start += 1;
                }
            }
            start = right_start;
        }
        if start < text.len() {
            out.push(Fragment::RawText {
                text: &text[start..],
                offset: base + start,
            });
        }
    }
}

/// C-locale whitespace: space, tab, newline, vertical tab, form feed, CR.
#[inline]
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t'..=b'\r')
}
