//! Unigram language-model tokenization (T5 and friends).
//!
//! Input is first normalized: user-defined tokens pass through literally, the
//! precompiled charsmap rewrites what it matches, invalid UTF-8 becomes
//! U+FFFD, and whitespace is escaped and optionally collapsed. The normalized
//! bytes are then segmented by Viterbi search for the maximum total score,
//! with an unknown-token transition over any single code point.

use tracing::debug;

use super::bpe::utf8_len;
use super::charsmap::{CharsMap, CharsMapError};
use super::trie::Trie;
use super::vocab::{TokenAttr, TokenId, Vocabulary};

const ESCAPED_SPACE: &[u8] = "\u{2581}".as_bytes();
const REPLACEMENT: &[u8] = "\u{FFFD}".as_bytes();
const UNKNOWN_PENALTY: f64 = 10.0;

/// One cell of the Viterbi lattice: the best way to reach a byte offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestTokenization {
    pub token_id: Option<TokenId>,
    pub back_offset: usize,
    pub score_sum: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct UnigramTokenizer {
    charsmap: Option<CharsMap>,
    token_matcher: Trie,
    user_defined_matcher: Trie,
    unknown_token_score: f64,
}

impl UnigramTokenizer {
    pub fn new(vocab: &Vocabulary) -> Result<Self, CharsMapError> {
        let charsmap = vocab.charsmap().map(CharsMap::parse).transpose()?;

        let mut token_matcher = Trie::new();
        let mut user_defined_matcher = Trie::new();
        let mut min_score = f64::MAX;
        let mut max_score = f64::MIN;

        for (id, entry) in vocab.entries().iter().enumerate() {
            let id = id as TokenId;
            if entry.attr.contains(TokenAttr::NORMAL) {
                min_score = min_score.min(f64::from(entry.score));
                max_score = max_score.max(f64::from(entry.score));
            }
            if entry
                .attr
                .intersects(TokenAttr::NORMAL | TokenAttr::USER_DEFINED | TokenAttr::UNUSED)
            {
                token_matcher.insert(&entry.text, id);
            }
            if entry.attr.contains(TokenAttr::USER_DEFINED) {
                user_defined_matcher.insert(&entry.text, id);
            }
        }

        let unknown_token_score = min_score - UNKNOWN_PENALTY;
        debug!(
            min_score,
            max_score,
            unknown_token_score,
            has_charsmap = charsmap.is_some(),
            "unigram model initialized"
        );

        Ok(Self {
            charsmap,
            token_matcher,
            user_defined_matcher,
            unknown_token_score,
        })
    }

    pub fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        let normalized = self.normalize(vocab, text);
        let lattice = self.viterbi(vocab, &normalized);
        backtrack(vocab, &lattice, output);
    }

    /// Normalize raw input bytes.
    pub fn normalize(&self, vocab: &Vocabulary, input: &[u8]) -> Vec<u8> {
        let flags = vocab.flags();
        let space: &[u8] = if flags.escape_whitespace {
            ESCAPED_SPACE
        } else {
            b" "
        };
        let shall_prepend = !flags.treat_whitespace_as_suffix && flags.add_space_prefix;
        let shall_append = flags.treat_whitespace_as_suffix && flags.add_space_prefix;
        let shall_merge = flags.remove_extra_whitespace;

        let mut out = Vec::with_capacity(input.len() * 3);
        let mut in_word = false;
        let mut prepended = false;
        let mut offset = 0;

        while offset < input.len() {
            let (piece, consumed) = self.normalize_prefix(input, offset);
            for &c in piece {
                if c != b' ' {
                    if !in_word {
                        in_word = true;
                        if (shall_prepend && !prepended) || shall_merge {
                            out.extend_from_slice(space);
                            prepended = true;
                        }
                    }
                    out.push(c);
                } else {
                    in_word = false;
                    if !shall_merge {
                        out.extend_from_slice(space);
                    }
                }
            }
            offset += consumed;
        }

        if shall_append {
            out.extend_from_slice(space);
        }
        out
    }

    /// Normalized form of the text at `offset` and the number of input bytes
    /// it replaces. Always consumes at least one byte.
    fn normalize_prefix<'a>(&'a self, input: &'a [u8], offset: usize) -> (&'a [u8], usize) {
        let rest = &input[offset..];

        // Any walkable path counts, even one that stops short of a full token.
        let user_len = self.user_defined_matcher.longest_prefix(input, offset);
        if user_len > 0 {
            return (&rest[..user_len], user_len);
        }

        if let Some((replacement, len)) = self.charsmap.as_ref().and_then(|m| m.longest_match(rest)) {
            return (replacement, len);
        }

        let len = utf8_len(rest[0]);
        match rest.get(..len) {
            Some(cpt) if std::str::from_utf8(cpt).is_ok() => (cpt, len),
            _ => (REPLACEMENT, 1),
        }
    }

    /// Fill the lattice over `normalized`; cell `i` holds the best
    /// segmentation of the first `i` bytes.
    pub fn viterbi(&self, vocab: &Vocabulary, normalized: &[u8]) -> Vec<BestTokenization> {
        let unk = vocab.special().unk;
        let n = normalized.len();
        let mut best = vec![
            BestTokenization {
                token_id: unk,
                back_offset: 0,
                score_sum: f64::NEG_INFINITY,
            };
            n + 1
        ];
        best[0].score_sum = 0.0;

        let mut offset = 0;
        while offset < n {
            let n_units = utf8_len(normalized[offset]).min(n - offset);
            let current = best[offset].score_sum;
            let mut single_codepoint_found = false;

            for (len, id) in self.token_matcher.prefix_matches(&normalized[offset..]) {
                if len == n_units {
                    single_codepoint_found = true;
                }
                let score = if vocab.is_user_defined(id) {
                    0.0
                } else {
                    vocab.token_score(id).map_or(0.0, f64::from)
                };
                let challenger = current + score;
                let cell = &mut best[offset + len];
                if challenger > cell.score_sum {
                    *cell = BestTokenization {
                        token_id: Some(id),
                        back_offset: offset,
                        score_sum: challenger,
                    };
                }
            }

            if !single_codepoint_found {
                let challenger = current + self.unknown_token_score;
                let cell = &mut best[offset + n_units];
                if challenger > cell.score_sum {
                    *cell = BestTokenization {
                        token_id: unk,
                        back_offset: offset,
                        score_sum: challenger,
                    };
                }
            }
            offset += n_units;
        }
        best
    }
}

/// Walk the lattice back from the end, collapsing runs of unknown tokens.
fn backtrack(vocab: &Vocabulary, lattice: &[BestTokenization], output: &mut Vec<TokenId>) {
    let Some(last) = lattice.len().checked_sub(1) else {
        return;
    };
    if last == 0 {
        return;
    }

    let unk = vocab.special().unk;
    let start = output.len();
    let mut pos = last;
    let mut prev_unknown = false;
    loop {
        let cell = lattice[pos];
        let is_unknown = cell.token_id == unk;
        if !(prev_unknown && is_unknown) {
            if let Some(id) = cell.token_id {
                output.push(id);
            }
        }
        if cell.back_offset == 0 {
            break;
        }
        prev_unknown = is_unknown;
        pos = cell.back_offset;
    }
    output[start..].reverse();
}
