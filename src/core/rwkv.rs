//! Greedy trie tokenization for RWKV "world" vocabularies.
//!
//! Token texts are stored escaped (`\n`, `\t`, `\r`, `\xHH`); the matcher is
//! built over their unescaped bytes and consumes the input by repeated
//! longest match.

use super::trie::Trie;
use super::vocab::{TokenId, Vocabulary};

/// Undo the escaping used in RWKV vocabulary files.
pub fn unescape_token(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut iter = escaped.iter().copied();
    while let Some(c) = iter.next() {
        if c != b'\\' {
            out.push(c);
            continue;
        }
        match iter.next() {
            Some(b't') => out.push(b'\t'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b'x') => {
                let hi = iter.next().map_or(0, hex_value);
                let lo = iter.next().map_or(0, hex_value);
                out.push((hi << 4) | lo);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn hex_value(c: u8) -> u8 {
    (c as char).to_digit(16).map_or(0, |d| d as u8)
}

#[derive(Debug, Clone)]
pub(crate) struct GreedyTrieTokenizer {
    matcher: Trie,
}

impl GreedyTrieTokenizer {
    pub fn new(vocab: &Vocabulary) -> Self {
        let mut matcher = Trie::new();
        for (id, entry) in vocab.entries().iter().enumerate() {
            matcher.insert(&unescape_token(&entry.text), id as TokenId);
        }
        Self { matcher }
    }

    pub fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        let unk = vocab.special().unk;
        let mut pos = 0;
        while pos < text.len() {
            match self.matcher.prefix_matches(&text[pos..]).last() {
                Some((len, id)) => {
                    output.push(id);
                    pos += len;
                }
                None => {
                    output.extend(unk);
                    pos += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vocab::{Scheme, TokenAttr, VocabularyBuilder};

    fn make_vocab() -> Vocabulary {
        VocabularyBuilder::new(Scheme::GreedyTrie)
            .token("a", 0.0, TokenAttr::NORMAL)
            .token("ab", 0.0, TokenAttr::NORMAL)
            .token("abcd", 0.0, TokenAttr::NORMAL)
            .token("\\n", 0.0, TokenAttr::NORMAL)
            .token("\\x41\\t", 0.0, TokenAttr::NORMAL)
            .build()
            .unwrap()
    }

    fn tokenize(vocab: &Vocabulary, text: &[u8]) -> Vec<TokenId> {
        let mut out = Vec::new();
        GreedyTrieTokenizer::new(vocab).tokenize(vocab, text, &mut out);
        out
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_token(b"\\n\\t\\r"), b"\n\t\r");
        assert_eq!(unescape_token(b"\\x41\\xff"), b"A\xff");
        assert_eq!(unescape_token(b"\\\\q\\'"), b"\\q'");
        assert_eq!(unescape_token(b"plain"), b"plain");
    }

    #[test]
    fn test_longest_match() {
        let vocab = make_vocab();
        assert_eq!(tokenize(&vocab, b"abcdab"), vec![2, 1]);
        assert_eq!(tokenize(&vocab, b"A\t\n"), vec![4, 3]);
    }

    #[test]
    fn test_dead_end_backs_off_to_last_value() {
        let vocab = make_vocab();
        // "abc" walks past "ab" but "abc" itself is not a token.
        assert_eq!(tokenize(&vocab, b"abca"), vec![1, 0]);
    }

    #[test]
    fn test_unmatched_bytes_use_unk() {
        let vocab = make_vocab();
        assert_eq!(tokenize(&vocab, b"zaz"), vec![0]);

        let vocab = VocabularyBuilder::new(Scheme::GreedyTrie)
            .token("<unk>", 0.0, TokenAttr::UNKNOWN)
            .token("a", 0.0, TokenAttr::NORMAL)
            .update_special_tokens(|s| s.unk = Some(0))
            .build()
            .unwrap();
        assert_eq!(tokenize(&vocab, b"zaz"), vec![0, 1, 0]);
    }
}
