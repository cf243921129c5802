//! Vocabulary model shared by every tokenization scheme.
//!
//! A [`Vocabulary`] is the immutable table the tokenizers read from: token
//! texts with their scores and attribute bits, the reverse lookup from text to
//! id, BPE merge ranks, special-token ids and behavioural flags. It is built
//! once through [`VocabularyBuilder`], which also performs the fix-ups a model
//! loader would apply (scheme defaults, end-of-turn detection, per-model token
//! attributes, the special-token cache).
//!
//! # Example
//!
//! ```
//! use vocabkit::{Scheme, TokenAttr, VocabularyBuilder};
//!
//! let vocab = VocabularyBuilder::new(Scheme::GreedyTrie)
//!     .token("a", 0.0, TokenAttr::NORMAL)
//!     .token("ab", 0.0, TokenAttr::NORMAL)
//!     .build()
//!     .unwrap();
//! assert_eq!(vocab.token_id(b"ab"), Some(1));
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::byte_level::byte_to_char;
use super::pretokenizer::PreTokenizerKind;

/// Index of a token in its vocabulary.
pub type TokenId = u32;

/// Errors raised while assembling a vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VocabError {
    #[error("Unknown tokenizer model: '{0}'")]
    UnknownScheme(String),
    #[error("Unknown pre-tokenizer type: '{0}'")]
    UnknownPreTokenizer(String),
    #[error("Duplicate token text {text:?} at ids {first} and {second}")]
    DuplicateToken {
        text: String,
        first: TokenId,
        second: TokenId,
    },
    #[error("Flag requires the {0} token but none is configured")]
    MissingSpecialToken(&'static str),
    #[error("Regex BPE vocabulary has no merges")]
    MissingMerges,
    #[error("Invalid merge rule: {0:?}")]
    InvalidMerge(String),
    #[error("Token {0:?} is not in the vocabulary")]
    UnknownToken(String),
}

/// Attribute bit set attached to every vocabulary entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenAttr(u32);

impl TokenAttr {
    pub const UNDEFINED: Self = Self(0);
    pub const UNKNOWN: Self = Self(1 << 0);
    pub const UNUSED: Self = Self(1 << 1);
    pub const NORMAL: Self = Self(1 << 2);
    /// Markup such as BOS/EOS; hidden from rendered text unless requested.
    pub const CONTROL: Self = Self(1 << 3);
    pub const USER_DEFINED: Self = Self(1 << 4);
    /// A `<0xHH>` byte-fallback token.
    pub const BYTE: Self = Self(1 << 5);
    pub const NORMALIZED: Self = Self(1 << 6);
    /// Swallow whitespace to the left when matched as a special token.
    pub const LSTRIP: Self = Self(1 << 7);
    /// Swallow whitespace to the right when matched as a special token.
    pub const RSTRIP: Self = Self(1 << 8);
    pub const SINGLE_WORD: Self = Self(1 << 9);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any bit of `other` is set.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    /// Map the legacy GGUF token-type enumeration onto attribute bits.
    pub fn from_token_type(token_type: i32) -> Self {
        match token_type {
            1 => Self::NORMAL,
            2 => Self::UNKNOWN,
            3 => Self::CONTROL,
            4 => Self::USER_DEFINED,
            5 => Self::UNUSED,
            6 => Self::BYTE,
            _ => Self::UNDEFINED,
        }
    }
}

impl BitOr for TokenAttr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TokenAttr {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TokenAttr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for TokenAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(TokenAttr, &str); 10] = [
            (TokenAttr::UNKNOWN, "UNKNOWN"),
            (TokenAttr::UNUSED, "UNUSED"),
            (TokenAttr::NORMAL, "NORMAL"),
            (TokenAttr::CONTROL, "CONTROL"),
            (TokenAttr::USER_DEFINED, "USER_DEFINED"),
            (TokenAttr::BYTE, "BYTE"),
            (TokenAttr::NORMALIZED, "NORMALIZED"),
            (TokenAttr::LSTRIP, "LSTRIP"),
            (TokenAttr::RSTRIP, "RSTRIP"),
            (TokenAttr::SINGLE_WORD, "SINGLE_WORD"),
        ];
        if self.is_empty() {
            return f.write_str("TokenAttr(UNDEFINED)");
        }
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(attr, _)| self.contains(*attr))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "TokenAttr({})", names.join(" | "))
    }
}

/// Subword scheme a vocabulary was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Vocabulary-less model; tokenization is refused.
    None,
    /// SentencePiece-style score-driven merging with byte fallback.
    ByteBpeMerge,
    /// GPT-2-style regex pre-tokenization plus rank-driven merges.
    RegexBpe,
    /// BERT-style greedy longest match.
    WordPiece,
    /// T5-style unigram language model (Viterbi).
    Unigram,
    /// RWKV greedy trie match over escaped tokens.
    GreedyTrie,
}

impl Scheme {
    /// Resolve a tokenizer model name as stored in model metadata.
    pub fn from_name(name: &str) -> Result<Self, VocabError> {
        match name {
            "no_vocab" => Ok(Self::None),
            "llama" => Ok(Self::ByteBpeMerge),
            "gpt2" => Ok(Self::RegexBpe),
            "bert" => Ok(Self::WordPiece),
            "t5" => Ok(Self::Unigram),
            "rwkv" => Ok(Self::GreedyTrie),
            other => Err(VocabError::UnknownScheme(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "no_vocab",
            Self::ByteBpeMerge => "llama",
            Self::RegexBpe => "gpt2",
            Self::WordPiece => "bert",
            Self::Unigram => "t5",
            Self::GreedyTrie => "rwkv",
        }
    }
}

/// Ids of the tokens with a reserved meaning. `None` means not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecialTokens {
    pub bos: Option<TokenId>,
    pub eos: Option<TokenId>,
    pub unk: Option<TokenId>,
    pub sep: Option<TokenId>,
    pub pad: Option<TokenId>,
    pub cls: Option<TokenId>,
    pub mask: Option<TokenId>,
    pub prefix: Option<TokenId>,
    pub suffix: Option<TokenId>,
    pub middle: Option<TokenId>,
    pub eot: Option<TokenId>,
    pub eom: Option<TokenId>,
}

impl SpecialTokens {
    /// Default ids for each scheme, matching the conventions of the models
    /// that use it.
    pub fn for_scheme(scheme: Scheme) -> Self {
        match scheme {
            Scheme::None | Scheme::GreedyTrie => Self::default(),
            Scheme::ByteBpeMerge => Self {
                bos: Some(1),
                eos: Some(2),
                unk: Some(0),
                ..Self::default()
            },
            Scheme::RegexBpe => Self {
                bos: Some(11),
                eos: Some(11),
                ..Self::default()
            },
            Scheme::WordPiece => Self {
                unk: Some(100),
                sep: Some(102),
                pad: Some(0),
                cls: Some(101),
                mask: Some(103),
                ..Self::default()
            },
            Scheme::Unigram => Self {
                eos: Some(1),
                unk: Some(2),
                pad: Some(0),
                ..Self::default()
            },
        }
    }

    fn slots_mut(&mut self) -> [(&'static str, &mut Option<TokenId>); 12] {
        [
            ("bos", &mut self.bos),
            ("eos", &mut self.eos),
            ("unk", &mut self.unk),
            ("sep", &mut self.sep),
            ("pad", &mut self.pad),
            ("cls", &mut self.cls),
            ("mask", &mut self.mask),
            ("prefix", &mut self.prefix),
            ("suffix", &mut self.suffix),
            ("middle", &mut self.middle),
            ("eot", &mut self.eot),
            ("eom", &mut self.eom),
        ]
    }
}

/// Behavioural switches that travel with a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerFlags {
    pub add_space_prefix: bool,
    pub add_bos: bool,
    pub add_eos: bool,
    pub ignore_merges: bool,
    pub clean_spaces: bool,
    pub remove_extra_whitespace: bool,
    pub escape_whitespace: bool,
    pub treat_whitespace_as_suffix: bool,
}

impl Default for TokenizerFlags {
    fn default() -> Self {
        Self {
            add_space_prefix: false,
            add_bos: false,
            add_eos: false,
            ignore_merges: false,
            clean_spaces: false,
            remove_extra_whitespace: false,
            escape_whitespace: true,
            treat_whitespace_as_suffix: false,
        }
    }
}

impl TokenizerFlags {
    pub fn for_scheme(scheme: Scheme) -> Self {
        let base = Self::default();
        match scheme {
            Scheme::None => base,
            Scheme::ByteBpeMerge => Self {
                add_space_prefix: true,
                clean_spaces: false,
                add_bos: true,
                add_eos: false,
                ..base
            },
            Scheme::RegexBpe => Self {
                add_space_prefix: false,
                clean_spaces: true,
                ..base
            },
            Scheme::WordPiece => Self {
                add_space_prefix: false,
                clean_spaces: true,
                add_bos: true,
                add_eos: false,
                ..base
            },
            Scheme::Unigram => Self {
                add_bos: false,
                add_eos: true,
                ..base
            },
            Scheme::GreedyTrie => Self {
                add_space_prefix: false,
                clean_spaces: false,
                add_bos: false,
                add_eos: false,
                ..base
            },
        }
    }
}

/// One vocabulary row.
#[derive(Debug, Clone, PartialEq)]
pub struct VocabEntry {
    pub text: Vec<u8>,
    pub score: f32,
    pub attr: TokenAttr,
}

/// Immutable vocabulary shared by all tokenizer operations.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    scheme: Scheme,
    pre_tokenizer: PreTokenizerKind,
    entries: Vec<VocabEntry>,
    token_to_id: FxHashMap<Vec<u8>, TokenId>,
    merge_ranks: FxHashMap<Vec<u8>, FxHashMap<Vec<u8>, u32>>,
    special: SpecialTokens,
    flags: TokenizerFlags,
    charsmap: Option<Vec<u8>>,
    special_cache: Vec<TokenId>,
    max_token_len: usize,
}

impl Vocabulary {
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn pre_tokenizer(&self) -> PreTokenizerKind {
        self.pre_tokenizer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn special(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn flags(&self) -> &TokenizerFlags {
        &self.flags
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    #[inline]
    pub fn entry(&self, id: TokenId) -> Option<&VocabEntry> {
        self.entries.get(id as usize)
    }

    #[inline]
    pub fn token_id(&self, text: &[u8]) -> Option<TokenId> {
        self.token_to_id.get(text).copied()
    }

    /// Text of a token, or `None` for an out-of-range id.
    pub fn token_text(&self, id: TokenId) -> Option<&[u8]> {
        self.entry(id).map(|e| e.text.as_slice())
    }

    pub fn token_score(&self, id: TokenId) -> Option<f32> {
        self.entry(id).map(|e| e.score)
    }

    /// Attribute bits of a token; out-of-range ids report `UNDEFINED`.
    #[inline]
    pub fn token_attr(&self, id: TokenId) -> TokenAttr {
        self.entry(id).map(|e| e.attr).unwrap_or_default()
    }

    pub fn is_normal(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::NORMAL)
    }

    pub fn is_unknown(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::UNKNOWN)
    }

    pub fn is_control(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::CONTROL)
    }

    pub fn is_byte(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::BYTE)
    }

    pub fn is_user_defined(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::USER_DEFINED)
    }

    pub fn is_unused(&self, id: TokenId) -> bool {
        self.token_attr(id).contains(TokenAttr::UNUSED)
    }

    /// Rank of the merge `(left, right)`; lower merges first.
    #[inline]
    pub fn merge_rank(&self, left: &[u8], right: &[u8]) -> Option<u32> {
        self.merge_ranks.get(left)?.get(right).copied()
    }

    pub fn merge_count(&self) -> usize {
        self.merge_ranks.values().map(|m| m.len()).sum()
    }

    /// Serialized normalization table used by the unigram scheme.
    pub fn charsmap(&self) -> Option<&[u8]> {
        self.charsmap.as_deref()
    }

    /// Ids with CONTROL, USER_DEFINED or UNKNOWN attributes, longest text first.
    pub fn special_tokens_by_length(&self) -> &[TokenId] {
        &self.special_cache
    }

    /// Length in bytes of the longest token text.
    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    /// Token that encodes a single raw byte, if the vocabulary has one.
    pub fn byte_to_token(&self, byte: u8) -> Option<TokenId> {
        match self.scheme {
            Scheme::ByteBpeMerge | Scheme::Unigram => {
                let hex = format!("<0x{byte:02X}>");
                self.token_id(hex.as_bytes())
                    .or_else(|| self.token_id(&[byte]))
            }
            Scheme::RegexBpe | Scheme::WordPiece => {
                let mut buf = [0u8; 4];
                let ch = byte_to_char(byte).encode_utf8(&mut buf);
                self.token_id(ch.as_bytes())
            }
            Scheme::GreedyTrie => self.token_id(&[byte]),
            Scheme::None => None,
        }
    }

    /// Token to the byte value of a `<0xHH>` byte-fallback token.
    pub fn token_to_byte(&self, id: TokenId) -> Option<u8> {
        let text = self.token_text(id)?;
        match self.scheme {
            Scheme::ByteBpeMerge | Scheme::Unigram => parse_byte_token(text),
            Scheme::RegexBpe | Scheme::WordPiece => {
                let text = std::str::from_utf8(text).ok()?;
                let mut chars = text.chars();
                let ch = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                super::byte_level::char_to_byte(ch)
            }
            Scheme::GreedyTrie | Scheme::None => None,
        }
    }
}

/// Parse the `HH` out of a `<0xHH>` token text.
pub(crate) fn parse_byte_token(text: &[u8]) -> Option<u8> {
    let hex = text.get(3..5)?;
    let hex = std::str::from_utf8(hex).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

const EOT_CANDIDATES: [&str; 5] = [
    "<|eot_id|>",
    "<|im_end|>",
    "<|end|>",
    "<end_of_turn>",
    "<|endoftext|>",
];

const EOM_CANDIDATE: &str = "<|eom_id|>";

/// Assembles a [`Vocabulary`].
///
/// Scheme defaults for special ids and flags are applied on construction and
/// can be overridden afterwards; a pre-tokenizer applies its own flag
/// overrides when it is set.
#[derive(Debug, Clone)]
pub struct VocabularyBuilder {
    scheme: Scheme,
    pre_tokenizer: PreTokenizerKind,
    entries: Vec<VocabEntry>,
    merges: Vec<(Vec<u8>, Vec<u8>)>,
    special: SpecialTokens,
    flags: TokenizerFlags,
    charsmap: Option<Vec<u8>>,
    model_name: Option<String>,
    pre_tokenizer_name: Option<String>,
    attr_overrides: Vec<(Vec<u8>, TokenAttr, bool)>,
}

impl VocabularyBuilder {
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            pre_tokenizer: PreTokenizerKind::Default,
            entries: Vec::new(),
            merges: Vec::new(),
            special: SpecialTokens::for_scheme(scheme),
            flags: TokenizerFlags::for_scheme(scheme),
            charsmap: None,
            model_name: None,
            pre_tokenizer_name: None,
            attr_overrides: Vec::new(),
        }
    }

    /// Start from a tokenizer model name such as `"llama"` or `"gpt2"`.
    pub fn from_model_name(name: &str) -> Result<Self, VocabError> {
        Scheme::from_name(name).map(Self::new)
    }

    /// Append a token; its id is the number of tokens added before it.
    pub fn token(mut self, text: impl AsRef<[u8]>, score: f32, attr: TokenAttr) -> Self {
        self.entries.push(VocabEntry {
            text: text.as_ref().to_vec(),
            score,
            attr,
        });
        self
    }

    pub fn tokens<I, T>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, f32, TokenAttr)>,
        T: AsRef<[u8]>,
    {
        for (text, score, attr) in tokens {
            self = self.token(text, score, attr);
        }
        self
    }

    /// Append a merge rule; rank is the insertion order.
    pub fn merge(mut self, left: impl AsRef<[u8]>, right: impl AsRef<[u8]>) -> Self {
        self.merges
            .push((left.as_ref().to_vec(), right.as_ref().to_vec()));
        self
    }

    /// Append merge rules written as `"left right"`.
    ///
    /// The separator is searched from the second byte on, so a rule whose left
    /// side is a lone space still parses.
    pub fn merge_lines<'a, I>(mut self, lines: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for line in lines {
            let sep = line
                .bytes()
                .skip(1)
                .position(|b| b == b' ')
                .map(|p| p + 1)
                .ok_or_else(|| VocabError::InvalidMerge(line.to_string()))?;
            self = self.merge(&line[..sep], &line[sep + 1..]);
        }
        Ok(self)
    }

    /// Select a pre-tokenizer and apply the flag overrides it implies.
    pub fn pre_tokenizer(mut self, kind: PreTokenizerKind) -> Self {
        self.pre_tokenizer = kind;
        kind.apply_overrides(&mut self.flags, &mut self.special);
        self
    }

    /// Select a pre-tokenizer by the name stored in model metadata.
    ///
    /// Only meaningful for [`Scheme::RegexBpe`]; other schemes ignore it.
    pub fn pre_tokenizer_name(mut self, name: &str) -> Result<Self, VocabError> {
        if self.scheme != Scheme::RegexBpe {
            return Ok(self);
        }
        self.pre_tokenizer_name = Some(name.to_ascii_lowercase());
        if name.is_empty() {
            warn!("missing pre-tokenizer type, using 'default'; generation quality will be degraded");
            return Ok(self.pre_tokenizer(PreTokenizerKind::Default));
        }
        let kind = PreTokenizerKind::from_name(name)?;
        Ok(self.pre_tokenizer(kind))
    }

    pub fn special_tokens(mut self, special: SpecialTokens) -> Self {
        self.special = special;
        self
    }

    pub fn update_special_tokens(mut self, f: impl FnOnce(&mut SpecialTokens)) -> Self {
        f(&mut self.special);
        self
    }

    pub fn flags(mut self, flags: TokenizerFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn update_flags(mut self, f: impl FnOnce(&mut TokenizerFlags)) -> Self {
        f(&mut self.flags);
        self
    }

    pub fn charsmap(mut self, blob: impl Into<Vec<u8>>) -> Self {
        self.charsmap = Some(blob.into());
        self
    }

    /// Model name used to apply per-model token attribute quirks.
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    /// Set or clear attribute bits on the token with the given text at build
    /// time. Fails the build if the text is not in the vocabulary.
    pub fn token_attr(mut self, text: impl AsRef<[u8]>, attr: TokenAttr, value: bool) -> Self {
        self.attr_overrides
            .push((text.as_ref().to_vec(), attr, value));
        self
    }

    pub fn build(self) -> Result<Vocabulary, VocabError> {
        let Self {
            scheme,
            pre_tokenizer,
            mut entries,
            merges,
            mut special,
            flags,
            charsmap,
            model_name,
            pre_tokenizer_name,
            attr_overrides,
        } = self;

        let mut token_to_id =
            FxHashMap::with_capacity_and_hasher(entries.len(), Default::default());
        for (id, entry) in entries.iter().enumerate() {
            let id = id as TokenId;
            if let Some(first) = token_to_id.insert(entry.text.clone(), id) {
                return Err(VocabError::DuplicateToken {
                    text: String::from_utf8_lossy(&entry.text).into_owned(),
                    first,
                    second: id,
                });
            }
        }

        let mut merge_ranks: FxHashMap<Vec<u8>, FxHashMap<Vec<u8>, u32>> = FxHashMap::default();
        for (rank, (left, right)) in merges.into_iter().enumerate() {
            merge_ranks
                .entry(left)
                .or_default()
                .entry(right)
                .or_insert(rank as u32);
        }
        if scheme == Scheme::RegexBpe && merge_ranks.is_empty() {
            return Err(VocabError::MissingMerges);
        }

        let n_vocab = entries.len();
        for (name, slot) in special.slots_mut() {
            if let Some(id) = *slot {
                if id as usize >= n_vocab {
                    warn!(token = name, id, n_vocab, "special token id out of range, ignoring");
                    *slot = None;
                }
            }
        }

        if scheme != Scheme::None {
            detect_end_tokens(&mut entries, &token_to_id, &mut special);
        }

        let emits_bos_eos = matches!(
            scheme,
            Scheme::ByteBpeMerge | Scheme::RegexBpe | Scheme::Unigram
        );
        if emits_bos_eos && flags.add_bos && special.bos.is_none() {
            return Err(VocabError::MissingSpecialToken("bos"));
        }
        if emits_bos_eos && flags.add_eos && special.eos.is_none() {
            return Err(VocabError::MissingSpecialToken("eos"));
        }

        let mut special_cache: Vec<TokenId> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.attr.intersects(
                    TokenAttr::CONTROL | TokenAttr::USER_DEFINED | TokenAttr::UNKNOWN,
                )
            })
            .map(|(id, _)| id as TokenId)
            .collect();
        special_cache.sort_by(|&a, &b| {
            entries[b as usize]
                .text
                .len()
                .cmp(&entries[a as usize].text.len())
        });

        let is_jina = pre_tokenizer_name.as_deref().is_some_and(|name| {
            ["jina-v2-de", "jina-v2-es", "jina-v2-code"]
                .iter()
                .any(|variant| name.contains(variant))
        });
        let is_phi3 = model_name
            .as_deref()
            .map(str::to_ascii_lowercase)
            .is_some_and(|name| name.contains("phi-3") || name.contains("phi3"));
        if is_jina && token_to_id.contains_key(&b"<mask>"[..]) {
            set_token_attr(&mut entries, &token_to_id, b"<mask>", TokenAttr::LSTRIP, true)?;
        } else if is_phi3 {
            for &id in &special_cache {
                entries[id as usize].attr.set(TokenAttr::RSTRIP, true);
            }
            for (text, value) in [
                (&b"</s>"[..], true),
                (b"<unk>", false),
                (b"<s>", false),
                (b"<|endoftext|>", false),
            ] {
                if token_to_id.contains_key(text) {
                    set_token_attr(&mut entries, &token_to_id, text, TokenAttr::RSTRIP, value)?;
                }
            }
        }
        for (text, attr, value) in &attr_overrides {
            set_token_attr(&mut entries, &token_to_id, text, *attr, *value)?;
        }

        let max_token_len = entries.iter().map(|e| e.text.len()).max().unwrap_or(0);

        debug!(
            scheme = scheme.name(),
            n_vocab,
            n_merges = merge_ranks.values().map(|m| m.len()).sum::<usize>(),
            n_special = special_cache.len(),
            max_token_len,
            "vocabulary built"
        );

        Ok(Vocabulary {
            scheme,
            pre_tokenizer,
            entries,
            token_to_id,
            merge_ranks,
            special,
            flags,
            charsmap,
            special_cache,
            max_token_len,
        })
    }
}

fn set_token_attr(
    entries: &mut [VocabEntry],
    token_to_id: &FxHashMap<Vec<u8>, TokenId>,
    text: &[u8],
    attr: TokenAttr,
    value: bool,
) -> Result<(), VocabError> {
    let id = token_to_id
        .get(text)
        .copied()
        .ok_or_else(|| VocabError::UnknownToken(String::from_utf8_lossy(text).into_owned()))?;
    entries[id as usize].attr.set(attr, value);
    Ok(())
}

/// Fill in end-of-turn and end-of-message ids from well-known token texts,
/// forcing those tokens to CONTROL.
fn detect_end_tokens(
    entries: &mut [VocabEntry],
    token_to_id: &FxHashMap<Vec<u8>, TokenId>,
    special: &mut SpecialTokens,
) {
    let mut force_control = |id: TokenId, text: &str| {
        let entry = &mut entries[id as usize];
        if !entry.attr.contains(TokenAttr::CONTROL) {
            warn!(token = text, "control-looking token was not control-type, overriding its attributes");
            entry.attr = TokenAttr::CONTROL;
        }
    };

    if special.eot.is_none() {
        let found = EOT_CANDIDATES
            .iter()
            .find_map(|text| token_to_id.get(text.as_bytes()).map(|&id| (id, *text)));
        if let Some((id, text)) = found {
            special.eot = Some(id);
            force_control(id, text);
        }
    }

    if special.eom.is_none() {
        if let Some(&id) = token_to_id.get(EOM_CANDIDATE.as_bytes()) {
            special.eom = Some(id);
            force_control(id, EOM_CANDIDATE);
        }
    }
}
