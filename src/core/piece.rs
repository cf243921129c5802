//! Rendering token ids back to text.
//!
//! Every token's rendered piece is computed once, with control tokens
//! included, and kept in a [`PieceCache`]. Detokenization concatenates cached
//! pieces and optionally tidies the spacing around punctuation the way
//! tokenizer decoders conventionally do.

use super::byte_level;
use super::rwkv::unescape_token;
use super::vocab::{parse_byte_token, Scheme, TokenAttr, TokenId, Vocabulary};

const ESCAPED_SPACE: &[u8] = "\u{2581}".as_bytes();

/// Render one token.
///
/// With `special` false, CONTROL and UNKNOWN tokens render as nothing.
pub fn render_piece(vocab: &Vocabulary, id: TokenId, special: bool) -> Vec<u8> {
    let Some(entry) = vocab.entry(id) else {
        return Vec::new();
    };
    let attr = entry.attr;
    if !special && attr.intersects(TokenAttr::UNKNOWN | TokenAttr::CONTROL) {
        return Vec::new();
    }
    let text = entry.text.as_slice();

    match vocab.scheme() {
        Scheme::ByteBpeMerge | Scheme::Unigram | Scheme::WordPiece => {
            if attr.intersects(TokenAttr::UNKNOWN | TokenAttr::CONTROL | TokenAttr::USER_DEFINED) {
                text.to_vec()
            } else if attr.contains(TokenAttr::NORMAL) {
                let text = if vocab.scheme() == Scheme::WordPiece {
                    text.strip_prefix(b"##").unwrap_or(text)
                } else {
                    text
                };
                unescape_whitespace(text)
            } else if attr.contains(TokenAttr::BYTE) {
                parse_byte_token(text).map(|b| vec![b]).unwrap_or_default()
            } else {
                Vec::new()
            }
        }
        Scheme::RegexBpe => {
            if attr.intersects(TokenAttr::UNKNOWN | TokenAttr::CONTROL | TokenAttr::USER_DEFINED) {
                text.to_vec()
            } else if attr.contains(TokenAttr::NORMAL) {
                byte_level::decode_piece(text)
            } else {
                Vec::new()
            }
        }
        Scheme::GreedyTrie => unescape_token(text),
        Scheme::None => Vec::new(),
    }
}

/// Replace every `▁` with a plain space.
fn unescape_whitespace(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(ESCAPED_SPACE) {
            out.push(b' ');
            rest = tail;
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}

/// Precomputed rendered piece for every token id.
#[derive(Debug, Clone, Default)]
pub struct PieceCache {
    pieces: Vec<Vec<u8>>,
}

impl PieceCache {
    pub fn build(vocab: &Vocabulary) -> Self {
        let pieces = (0..vocab.len() as TokenId)
            .map(|id| render_piece(vocab, id, true))
            .collect();
        Self { pieces }
    }

    #[inline]
    pub fn get(&self, id: TokenId) -> Option<&[u8]> {
        self.pieces.get(id as usize).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Total bytes held by the cache.
    pub fn total_bytes(&self) -> usize {
        self.pieces.iter().map(Vec::len).sum()
    }
}

/// Drop up to `count` leading spaces.
pub(crate) fn strip_leading_spaces(mut piece: &[u8], count: usize) -> &[u8] {
    for _ in 0..count {
        match piece.split_first() {
            Some((b' ', rest)) => piece = rest,
            _ => break,
        }
    }
    piece
}

/// Conventional decoder clean-up, applied in place:
///
/// 1. drop a space before `?`, `!`, `.` and `,`
/// 2. collapse `" ' "` to `"'"`
/// 3. drop a space before `'s`, `'m`, `'re` and `'ve`
pub(crate) fn clean_spaces(text: &mut Vec<u8>) {
    drop_space_before_punctuation(text);
    collapse_spaced_apostrophe(text);
    attach_contractions(text);
}

fn drop_space_before_punctuation(text: &mut Vec<u8>) {
    let n = text.len();
    if n == 0 {
        return;
    }
    let mut total = 1;
    for i in 1..n {
        let x = text[i];
        if text[i - 1] == b' ' && matches!(x, b'?' | b'!' | b'.' | b',') {
            total -= 1;
        }
        text[total] = x;
        total += 1;
    }
    text.truncate(total);
}

fn collapse_spaced_apostrophe(text: &mut Vec<u8>) {
    let n = text.len();
    if n == 0 {
        return;
    }
    let mut total = 1;
    let mut i = 1;
    while i < n {
        let x = text[i];
        if x == b'\'' && i + 1 < n && text[i - 1] == b' ' && text[i + 1] == b' ' {
            total -= 1;
            i += 1;
            text[i] = 0;
        }
        text[total] = x;
        total += 1;
        i += 1;
    }
    text.truncate(total);
}

fn attach_contractions(text: &mut Vec<u8>) {
    let n = text.len();
    if n == 0 {
        return;
    }
    let mut total = 1;
    for i in 1..n {
        let x = text[i];
        if text[i - 1] == b' ' && x == b'\'' && i + 1 < n {
            let x1 = text[i + 1];
            if x1 == b's' || x1 == b'm' {
                total -= 1;
            } else if i + 2 < n {
                let x2 = text[i + 2];
                if (x1 == b'r' && x2 == b'e') || (x1 == b'v' && x2 == b'e') {
                    total -= 1;
                }
            }
        }
        text[total] = x;
        total += 1;
    }
    text.truncate(total);
}
