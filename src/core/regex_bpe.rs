//! Rank-driven merging for GPT-2-style BPE vocabularies.
//!
//! Text is split into words by the vocabulary's pre-tokenizer, each word is
//! mapped into the byte-level alphabet, and adjacent symbols merge in order of
//! their merge rank (lower first).

use std::cmp::Reverse;

use super::bpe::{live_symbols, merge_symbols, split_symbols, utf8_chunks};
use super::byte_level;
use super::pretokenizer::PreTokenizer;
use super::vocab::{TokenId, Vocabulary};

#[derive(Debug, Clone)]
pub(crate) struct RegexBpeTokenizer {
    pre_tokenizer: PreTokenizer,
}

impl RegexBpeTokenizer {
    pub fn new(vocab: &Vocabulary) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            pre_tokenizer: PreTokenizer::new(vocab.pre_tokenizer())?,
        })
    }

    pub fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        let text = String::from_utf8_lossy(text);
        for word in self.pre_tokenizer.split(&text) {
            let word = byte_level::encode(word.as_bytes());
            self.tokenize_word(vocab, word.as_bytes(), output);
        }
    }

    fn tokenize_word(&self, vocab: &Vocabulary, word: &[u8], output: &mut Vec<TokenId>) {
        if vocab.flags().ignore_merges {
            if let Some(id) = vocab.token_id(word) {
                output.push(id);
                return;
            }
        }

        let mut symbols = split_symbols(word);
        merge_symbols(&mut symbols, |left, right| {
            vocab.merge_rank(&word[left], &word[right]).map(Reverse)
        });

        for symbol in live_symbols(&symbols) {
            let piece = &word[symbol.range()];
            match vocab.token_id(piece) {
                Some(id) => output.push(id),
                None => {
                    output.extend(utf8_chunks(piece).filter_map(|ch| vocab.token_id(ch)));
                }
            }
        }
    }
}
