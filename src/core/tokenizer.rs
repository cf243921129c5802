//! The public tokenizer: scheme dispatch, special-token framing and
//! detokenization.
//!
//! A [`Tokenizer`] owns an immutable [`Vocabulary`] together with everything
//! derived from it at construction: the strategy for the vocabulary's scheme,
//! the special-token partitioner and the rendered piece of every token. All
//! per-call state is local to the call, so a tokenizer can be shared freely
//! across threads.
//!
//! # Example
//!
//! ```
//! use vocabkit::{Scheme, TokenAttr, Tokenizer, VocabularyBuilder};
//!
//! let vocab = VocabularyBuilder::new(Scheme::GreedyTrie)
//!     .token("hello", 0.0, TokenAttr::NORMAL)
//!     .token(" ", 0.0, TokenAttr::NORMAL)
//!     .token("world", 0.0, TokenAttr::NORMAL)
//!     .token("\\n", 0.0, TokenAttr::NORMAL)
//!     .build()
//!     .unwrap();
//! let tokenizer = Tokenizer::new(vocab).unwrap();
//!
//! let ids = tokenizer.tokenize("hello world", false, false);
//! assert_eq!(ids, vec![0, 1, 2]);
//! assert_eq!(tokenizer.decode(&ids).unwrap(), "hello world");
//! ```

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use super::charsmap::CharsMapError;
use super::partition::{Fragment, FragmentPartitioner};
use super::piece::{clean_spaces, strip_leading_spaces, PieceCache};
use super::regex_bpe::RegexBpeTokenizer;
use super::rwkv::GreedyTrieTokenizer;
use super::spm::SpmTokenizer;
use super::unigram::UnigramTokenizer;
use super::vocab::{
    Scheme, SpecialTokens, TokenAttr, TokenId, TokenizerFlags, VocabError, Vocabulary,
};
use super::wordpiece::WordPieceTokenizer;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Normalization map error: {0}")]
    CharsMapError(#[from] CharsMapError),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("Vocabulary has no tokenization scheme")]
    NoVocabulary,
    #[error("Decoding error: invalid UTF-8")]
    Utf8Error,
}

const ESCAPED_SPACE: &[u8] = "\u{2581}".as_bytes();

/// The segmentation algorithm selected by the vocabulary's scheme.
#[derive(Debug, Clone)]
enum Strategy {
    Spm(SpmTokenizer),
    RegexBpe(RegexBpeTokenizer),
    WordPiece(WordPieceTokenizer),
    Unigram(UnigramTokenizer),
    GreedyTrie(GreedyTrieTokenizer),
}

impl Strategy {
    fn new(vocab: &Vocabulary) -> Result<Self, TokenizerError> {
        Ok(match vocab.scheme() {
            Scheme::None => return Err(TokenizerError::NoVocabulary),
            Scheme::ByteBpeMerge => Self::Spm(SpmTokenizer),
            Scheme::RegexBpe => Self::RegexBpe(RegexBpeTokenizer::new(vocab)?),
            Scheme::WordPiece => Self::WordPiece(WordPieceTokenizer),
            Scheme::Unigram => Self::Unigram(UnigramTokenizer::new(vocab)?),
            Scheme::GreedyTrie => Self::GreedyTrie(GreedyTrieTokenizer::new(vocab)),
        })
    }

    fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        match self {
            Self::Spm(s) => s.tokenize(vocab, text, output),
            Self::RegexBpe(s) => s.tokenize(vocab, text, output),
            Self::WordPiece(s) => s.tokenize(vocab, text, output),
            Self::Unigram(s) => s.tokenize(vocab, text, output),
            Self::GreedyTrie(s) => s.tokenize(vocab, text, output),
        }
    }
}

/// Tokenizer bound to one vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: Vocabulary,
    strategy: Strategy,
    partitioner: FragmentPartitioner,
    pieces: PieceCache,
    newline: Option<TokenId>,
}

impl Tokenizer {
    /// Build the strategy, partitioner and piece cache for `vocab`.
    ///
    /// Fails for [`Scheme::None`], for a regex set that does not compile and
    /// for a malformed normalization map.
    pub fn new(vocab: Vocabulary) -> Result<Self, TokenizerError> {
        let strategy = Strategy::new(&vocab)?;
        let partitioner = FragmentPartitioner::new(&vocab)?;
        let pieces = PieceCache::build(&vocab);

        let mut tokenizer = Self {
            vocab,
            strategy,
            partitioner,
            pieces,
            newline: None,
        };
        tokenizer.newline = tokenizer.resolve_newline();

        debug!(
            scheme = tokenizer.vocab.scheme().name(),
            n_vocab = tokenizer.vocab.len(),
            n_special = tokenizer.partitioner.len(),
            piece_bytes = tokenizer.pieces.total_bytes(),
            newline = ?tokenizer.newline,
            "tokenizer initialized"
        );
        Ok(tokenizer)
    }

    fn resolve_newline(&self) -> Option<TokenId> {
        match self.vocab.scheme() {
            Scheme::ByteBpeMerge => self.vocab.byte_to_token(b'\n').or_else(|| {
                warn!("SPM vocabulary has no newline token, using the pad token instead");
                self.vocab.special().pad
            }),
            Scheme::WordPiece => self.vocab.special().pad,
            Scheme::GreedyTrie => self.tokenize("\n", false, false).first().copied(),
            _ => self.tokenize("\u{010A}", false, false).first().copied(),
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn scheme(&self) -> Scheme {
        self.vocab.scheme()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn special(&self) -> &SpecialTokens {
        self.vocab.special()
    }

    pub fn flags(&self) -> &TokenizerFlags {
        self.vocab.flags()
    }

    /// Token used for line breaks, resolved at construction.
    pub fn newline_token(&self) -> Option<TokenId> {
        self.newline
    }

    /// Byte-fallback token for a raw byte.
    pub fn byte_to_token(&self, byte: u8) -> Option<TokenId> {
        self.vocab.byte_to_token(byte)
    }

    /// True for the end-of-sequence, end-of-turn and end-of-message tokens.
    pub fn is_end_of_generation(&self, id: TokenId) -> bool {
        let special = self.vocab.special();
        [special.eos, special.eot, special.eom].contains(&Some(id))
    }

    /// Tokenize `text`.
    ///
    /// `add_special` frames the output with the scheme's BOS/EOS (or CLS/SEP)
    /// tokens as the vocabulary flags request. `parse_special` lets CONTROL
    /// tokens written literally in the text match as tokens.
    pub fn tokenize(&self, text: &str, add_special: bool, parse_special: bool) -> Vec<TokenId> {
        self.tokenize_bytes(text.as_bytes(), add_special, parse_special)
    }

    /// Tokenize raw bytes. Invalid UTF-8 is tolerated.
    pub fn tokenize_bytes(&self, text: &[u8], add_special: bool, parse_special: bool) -> Vec<TokenId> {
        let fragments = self.partitioner.partition(text, parse_special);
        let vocab = &self.vocab;
        let special = vocab.special();
        let flags = vocab.flags();
        let mut output = Vec::with_capacity(text.len() / 2 + 2);

        match vocab.scheme() {
            Scheme::ByteBpeMerge => {
                let mut is_prev_special = true;
                if add_special && flags.add_bos {
                    output.extend(special.bos);
                }
                for fragment in &fragments {
                    match *fragment {
                        Fragment::RawText { text, .. } => {
                            let mut raw = Vec::with_capacity(text.len() + 1);
                            if flags.add_space_prefix && is_prev_special {
                                raw.push(b' ');
                            }
                            raw.extend_from_slice(text);
                            let escaped = escape_whitespace(&raw);
                            self.strategy.tokenize(vocab, &escaped, &mut output);
                            is_prev_special = false;
                        }
                        Fragment::Token { id, .. } => {
                            output.push(id);
                            is_prev_special = true;
                        }
                    }
                }
                if add_special && flags.add_bos {
                    warn_double_bos(&output, special.bos);
                }
                if add_special && flags.add_eos {
                    output.extend(special.eos);
                }
            }
            Scheme::RegexBpe => {
                if add_special && flags.add_bos {
                    output.extend(special.bos);
                }
                self.tokenize_fragments(&fragments, &mut output);
                if add_special {
                    if flags.add_eos {
                        output.extend(special.eos);
                    }
                    if flags.add_bos {
                        warn_double_bos(&output, special.bos);
                    }
                    if flags.add_eos {
                        warn_double_eos(&output, special.eos);
                    }
                }
            }
            Scheme::WordPiece => {
                if add_special {
                    output.extend(special.cls);
                }
                self.tokenize_fragments(&fragments, &mut output);
                if add_special {
                    output.extend(special.sep);
                }
            }
            Scheme::Unigram => {
                if add_special && flags.add_bos {
                    output.extend(special.bos);
                }
                self.tokenize_fragments(&fragments, &mut output);
                if add_special && flags.add_bos {
                    warn_double_bos(&output, special.bos);
                }
                if add_special && flags.add_eos {
                    output.extend(special.eos);
                }
            }
            Scheme::GreedyTrie => self.tokenize_fragments(&fragments, &mut output),
            Scheme::None => {}
        }
        output
    }

    fn tokenize_fragments(&self, fragments: &[Fragment<'_>], output: &mut Vec<TokenId>) {
        for fragment in fragments {
            match *fragment {
                Fragment::RawText { text, .. } => self.strategy.tokenize(&self.vocab, text, output),
                Fragment::Token { id, .. } => output.push(id),
            }
        }
    }

    /// Tokenize into a caller-provided buffer.
    ///
    /// Returns the number of ids written, or the negated number of ids needed
    /// when `out` is too small; nothing is written in that case.
    pub fn tokenize_into(
        &self,
        text: &str,
        out: &mut [TokenId],
        add_special: bool,
        parse_special: bool,
    ) -> i32 {
        let ids = self.tokenize(text, add_special, parse_special);
        let n = clamp_len(ids.len());
        if ids.len() > out.len() {
            return -n;
        }
        out[..ids.len()].copy_from_slice(&ids);
        n
    }

    /// Tokenize many texts in parallel.
    pub fn tokenize_batch(
        &self,
        texts: &[String],
        add_special: bool,
        parse_special: bool,
    ) -> Vec<Vec<TokenId>> {
        texts
            .par_iter()
            .map(|text| self.tokenize(text, add_special, parse_special))
            .collect()
    }

    /// Rendered bytes of one token.
    ///
    /// With `special` false, CONTROL and UNKNOWN tokens render as nothing.
    /// Unknown ids render as nothing.
    pub fn token_to_piece(&self, id: TokenId, special: bool) -> &[u8] {
        if !special
            && self
                .vocab
                .token_attr(id)
                .intersects(TokenAttr::CONTROL | TokenAttr::UNKNOWN)
        {
            return &[];
        }
        self.pieces.get(id).unwrap_or_default()
    }

    /// Copy one token's piece into `buf`, first dropping up to `lstrip`
    /// leading spaces.
    ///
    /// Returns the number of bytes written, or the negated size needed when
    /// `buf` is too small.
    pub fn token_to_piece_into(&self, id: TokenId, buf: &mut [u8], lstrip: usize, special: bool) -> i32 {
        let piece = strip_leading_spaces(self.token_to_piece(id, special), lstrip);
        copy_into(piece, buf)
    }

    /// Render ids back to bytes.
    ///
    /// `remove_special` drops a leading BOS and trailing EOS when the
    /// vocabulary adds them; `unparse_special` renders CONTROL tokens as
    /// their text.
    pub fn detokenize(&self, ids: &[TokenId], remove_special: bool, unparse_special: bool) -> Vec<u8> {
        let mut text = self.assemble(ids, remove_special, unparse_special);
        if self.vocab.flags().clean_spaces {
            clean_spaces(&mut text);
        }
        text
    }

    /// Detokenize into a caller-provided buffer.
    ///
    /// Returns the number of bytes written, or the negated size needed when
    /// `buf` is too small; the needed size is measured before space clean-up.
    pub fn detokenize_into(
        &self,
        ids: &[TokenId],
        buf: &mut [u8],
        remove_special: bool,
        unparse_special: bool,
    ) -> i32 {
        let mut text = self.assemble(ids, remove_special, unparse_special);
        if text.len() > buf.len() {
            return -clamp_len(text.len());
        }
        if self.vocab.flags().clean_spaces {
            clean_spaces(&mut text);
        }
        copy_into(&text, buf)
    }

    /// Concatenated pieces, before clean-up.
    fn assemble(&self, mut ids: &[TokenId], remove_special: bool, unparse_special: bool) -> Vec<u8> {
        let special = self.vocab.special();
        let flags = self.vocab.flags();
        let mut remove_space = flags.add_space_prefix;

        if remove_special && flags.add_bos {
            if let Some((&first, rest)) = ids.split_first() {
                if Some(first) == special.bos {
                    remove_space = false;
                    ids = rest;
                }
            }
        }
        if remove_special && flags.add_eos {
            if let Some((&last, rest)) = ids.split_last() {
                if Some(last) == special.eos {
                    ids = rest;
                }
            }
        }

        let mut text = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            let piece = self.token_to_piece(id, unparse_special);
            let piece = strip_leading_spaces(piece, usize::from(remove_space));
            remove_space = false;
            text.extend_from_slice(piece);
        }
        text
    }

    /// Decode ids to a string, dropping framing tokens and CONTROL text.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        let bytes = self.detokenize(ids, true, false);
        String::from_utf8(bytes).map_err(|_| TokenizerError::Utf8Error)
    }

    /// Like [`decode`](Self::decode), replacing invalid UTF-8.
    pub fn decode_lossy(&self, ids: &[TokenId]) -> String {
        let bytes = self.detokenize(ids, true, false);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Detokenize many id lists in parallel.
    pub fn detokenize_batch(
        &self,
        id_lists: &[Vec<TokenId>],
        remove_special: bool,
        unparse_special: bool,
    ) -> Vec<Vec<u8>> {
        id_lists
            .par_iter()
            .map(|ids| self.detokenize(ids, remove_special, unparse_special))
            .collect()
    }

    /// Decode many id lists in parallel.
    pub fn decode_batch(&self, id_lists: &[Vec<TokenId>]) -> Result<Vec<String>, TokenizerError> {
        id_lists.par_iter().map(|ids| self.decode(ids)).collect()
    }
}

fn escape_whitespace(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 8);
    for &b in text {
        if b == b' ' {
            out.extend_from_slice(ESCAPED_SPACE);
        } else {
            out.push(b);
        }
    }
    out
}

fn warn_double_bos(output: &[TokenId], bos: Option<TokenId>) {
    if output.len() >= 2 && bos.is_some() && output.get(1).copied() == bos {
        warn!(
            n_tokens = output.len(),
            "added a BOS token to a prompt that already starts with one; the prompt now has two"
        );
    }
}

fn warn_double_eos(output: &[TokenId], eos: Option<TokenId>) {
    if output.len() >= 2 && eos.is_some() && output.get(output.len() - 2).copied() == eos {
        warn!(
            n_tokens = output.len(),
            "added an EOS token to a prompt that already ends with one; the prompt now has two"
        );
    }
}

fn clamp_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

fn copy_into(src: &[u8], buf: &mut [u8]) -> i32 {
    let n = clamp_len(src.len());
    if src.len() > buf.len() {
        return -n;
    }
    buf[..src.len()].copy_from_slice(src);
    n
}
