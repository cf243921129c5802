//! Score-driven merging for SentencePiece-style BPE vocabularies.
//!
//! The input arrives with spaces already escaped to `▁`. Adjacent symbols
//! merge when their concatenation is a vocabulary token, highest score first.
//! A final symbol that is not itself a token is split back along the merge
//! that produced it; anything still unknown falls back to one token per byte.

use std::cmp::Ordering;
use std::ops::Range;

use rustc_hash::FxHashMap;

use super::bpe::{live_symbols, merge_symbols, split_symbols};
use super::vocab::{TokenId, Vocabulary};

/// Total order over token scores.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Score(f32);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SpmTokenizer;

impl SpmTokenizer {
    pub fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        let mut symbols = split_symbols(text);
        if symbols.is_empty() {
            return;
        }

        let mut rev_merge: FxHashMap<&[u8], (Range<usize>, Range<usize>)> = FxHashMap::default();
        merge_symbols(&mut symbols, |left, right| {
            let joined = &text[left.start..right.end];
            let id = vocab.token_id(joined)?;
            let score = vocab.token_score(id)?;
            rev_merge.insert(joined, (left, right));
            Some(Score(score))
        });

        for symbol in live_symbols(&symbols) {
            resegment(vocab, text, symbol.range(), &rev_merge, output);
        }
    }
}

fn resegment(
    vocab: &Vocabulary,
    text: &[u8],
    span: Range<usize>,
    rev_merge: &FxHashMap<&[u8], (Range<usize>, Range<usize>)>,
    output: &mut Vec<TokenId>,
) {
    let piece = &text[span.clone()];
    if let Some(id) = vocab.token_id(piece) {
        output.push(id);
        return;
    }

    if let Some((left, right)) = rev_merge.get(piece) {
        // Spans were recorded at their first position; shift to this one.
        let shift = |r: &Range<usize>| {
            let base = r.start - left.start + span.start;
            base..base + r.len()
        };
        resegment(vocab, text, shift(left), rev_merge, output);
        resegment(vocab, text, shift(right), rev_merge, output);
        return;
    }

    let unk = vocab.special().unk;
    output.extend(piece.iter().filter_map(|&b| vocab.byte_to_token(b).or(unk)));
}
