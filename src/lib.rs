//! vocabkit - subword tokenization for language-model vocabularies.
//!
//! One [`Tokenizer`] type covers five vocabulary schemes:
//! - SentencePiece-style BPE driven by token scores, with byte fallback
//! - GPT-2-style byte-level BPE driven by merge ranks and regex pre-splitting
//! - BERT-style WordPiece
//! - T5-style unigram language model with a precompiled normalizer
//! - RWKV-style greedy longest match
//!
//! Special tokens are matched literally before segmentation, and
//! detokenization renders ids back to the exact bytes they stand for.

pub mod core;

pub use crate::core::{
    byte_level, render_piece, unescape_token, BestTokenization, CharsMap, CharsMapError,
    Fragment, FragmentPartitioner, NodeId, PieceCache, PreTokenizer, PreTokenizerKind,
    PrefixMatches, Scheme, SpecialTokens, TokenAttr, TokenId, Tokenizer, TokenizerError,
    TokenizerFlags, Trie, VocabEntry, VocabError, Vocabulary, VocabularyBuilder,
};
