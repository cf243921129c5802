//! Core tokenization engine for vocabkit.
//!
//! # Architecture
//!
//! - [`Vocabulary`]: immutable token table, built with [`VocabularyBuilder`]
//! - [`Trie`]: arena byte trie used for longest-match lookups
//! - [`FragmentPartitioner`]: splits input around literal special tokens
//! - five segmentation strategies, one per [`Scheme`]: score-driven merging
//!   (`spm`), rank-driven byte-level BPE (`regex_bpe`), greedy WordPiece
//!   (`wordpiece`), Viterbi unigram (`unigram`) and greedy trie (`rwkv`)
//! - [`PieceCache`]: rendered text of every token, used for detokenization
//! - [`Tokenizer`]: picks the strategy for a vocabulary and frames the output
//!   with special tokens
//!
//! Everything is built once per vocabulary; tokenize and detokenize calls only
//! read shared state, and the batch APIs spread inputs across cores with
//! Rayon.

mod bpe;
pub mod byte_level;
mod charsmap;
mod partition;
mod piece;
mod pretokenizer;
mod regex_bpe;
mod rwkv;
mod spm;
mod tokenizer;
mod trie;
mod unigram;
mod vocab;
mod wordpiece;

pub use charsmap::{CharsMap, CharsMapError};
pub use partition::{Fragment, FragmentPartitioner};
pub use piece::{render_piece, PieceCache};
pub use pretokenizer::{PreTokenizer, PreTokenizerKind};
pub use rwkv::unescape_token;
pub use tokenizer::{Tokenizer, TokenizerError};
pub use trie::{NodeId, PrefixMatches, Trie};
pub use unigram::BestTokenization;
pub use vocab::{
    Scheme, SpecialTokens, TokenAttr, TokenId, TokenizerFlags, VocabEntry, VocabError,
    Vocabulary, VocabularyBuilder,
};
