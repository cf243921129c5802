//! Regex pre-tokenization for regex-BPE vocabularies.
//!
//! Each pre-tokenizer is a list of patterns applied in sequence: the first
//! pattern splits the input, every following pattern splits each piece the
//! previous one produced. Text a pattern does not match stays in place as its
//! own piece, so the pieces always concatenate back to the input.

use fancy_regex::Regex;
use tracing::debug;

use super::vocab::{SpecialTokens, TokenizerFlags, VocabError};

const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)";

const LLAMA3_PATTERN: &str = r"(?:'[sS]|'[tT]|'[rR][eE]|'[vV][eE]|'[mM]|'[lL][lL]|'[dD])|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

const QWEN2_PATTERN: &str = r"(?:'[sS]|'[tT]|'[rR][eE]|'[vV][eE]|'[mM]|'[lL][lL]|'[dD])|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

const TEKKEN_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*|\p{N}| ?[^\s\p{L}\p{N}]+[\r\n/]*|\s*[\r\n]+|\s+(?!\S)|\s+";

const PORO_PATTERN: &str = r" ?[^(\s|.,!?…。，、।۔،)]+";

const CJK_RUN_PATTERN: &str = r"[一-龥ࠀ-一가-퟿]+";

const DEEPSEEK_LLM_PATTERNS: &[&str] = &[
    r"[\r\n]",
    r"\s?[A-Za-zµÀ-ÖØ-öø-ƺƼ-ƿǄ-ʓʕ-ʯͰ-ͳͶͷͻ-ͽͿΆΈ-ΊΌΎ-ΡΣ-ϵϷ-ҁҊ-ԯԱ-ՖႠ-ჅᎠ-Ᏽᏸ-ᏽᲐ-ᲺᲽ-Ჿᴀ-ᴫᵫ-ᵷᵹ-ᶚḀ-ἕἘ-Ἕἠ-ὅὈ-Ὅὐ-ὗὙὛὝὟ-ώᾀ-ᾴᾶ-ᾼιῂ-ῄῆ-ῌῐ-ΐῖ-Ίῠ-Ῥῲ-ῴῶ-ῼℂℇℊ-ℓℕℙ-ℝℤΩℨK-ℭℯ-ℴℹℼ-ℿⅅ-ⅉⅎↃↄⰀ-ⱻⱾ-ⳤⳫ-ⳮⳲⳳꙀ-ꙭꚀ-ꚛꜢ-ꝯꝱ-ꞇꞋ-ꞎꭰ-ꮿﬀ-ﬆﬓ-ﬗＡ-Ｚａ-ｚ𐐀-𐑏𐒰-𐓓𐓘-𐓻𐲀-𐲲𐳀-𐳲𑢠-𑣟𞤀-𞥃]+",
    r"\s?[!-/:-~！-／：-～‘-‟　-。]+",
    r"\s+$",
    CJK_RUN_PATTERN,
    r"\p{N}+",
];

const DEEPSEEK_CODER_PATTERNS: &[&str] = &[
    r"[\r\n]",
    r"\s?\p{L}+",
    r"\s?\p{P}+",
    CJK_RUN_PATTERN,
    r"\p{N}",
];

const FALCON_PATTERNS: &[&str] = &[
    r"[\p{P}\$\+<=>\^~\|`]+",
    GPT2_PATTERN,
    r"[0-9][0-9][0-9]",
];

const DEFAULT_PATTERNS: &[&str] = &[
    r"[\p{P}\$\+<=>\^~\|]+",
    GPT2_PATTERN,
    r"\p{N}+",
    r"[0-9][0-9][0-9]",
];

/// Pre-tokenizer family of a regex-BPE vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PreTokenizerKind {
    #[default]
    Default,
    Llama3,
    DeepseekLlm,
    DeepseekCoder,
    Falcon,
    Mpt,
    Starcoder,
    Gpt2,
    Refact,
    CommandR,
    Stablelm2,
    Qwen2,
    Olmo,
    Dbrx,
    Smaug,
    Poro,
    Chatglm4,
    Viking,
    Jais,
    Tekken,
    Smollm,
    Codeshell,
    Bloom,
    Gpt3Finnish,
    Exaone,
}

impl PreTokenizerKind {
    /// Resolve the pre-tokenizer name stored in model metadata.
    pub fn from_name(name: &str) -> Result<Self, VocabError> {
        let kind = match name {
            "default" => Self::Default,
            "llama3" | "llama-v3" | "llama-bpe" => Self::Llama3,
            "deepseek-llm" => Self::DeepseekLlm,
            "deepseek-coder" => Self::DeepseekCoder,
            "falcon" => Self::Falcon,
            "mpt" => Self::Mpt,
            "starcoder" => Self::Starcoder,
            "gpt-2" | "phi-2" | "jina-es" | "jina-de" | "jina-v2-es" | "jina-v2-de"
            | "jina-v2-code" => Self::Gpt2,
            "refact" => Self::Refact,
            "command-r" => Self::CommandR,
            "qwen2" => Self::Qwen2,
            "stablelm2" => Self::Stablelm2,
            "olmo" => Self::Olmo,
            "dbrx" => Self::Dbrx,
            "smaug-bpe" => Self::Smaug,
            "poro-chat" => Self::Poro,
            "chatglm-bpe" => Self::Chatglm4,
            "viking" => Self::Viking,
            "jais" => Self::Jais,
            "tekken" => Self::Tekken,
            "smollm" => Self::Smollm,
            "codeshell" => Self::Codeshell,
            "bloom" => Self::Bloom,
            "gpt3-finnish" => Self::Gpt3Finnish,
            "exaone" => Self::Exaone,
            other => return Err(VocabError::UnknownPreTokenizer(other.to_string())),
        };
        Ok(kind)
    }

    /// Patterns applied in order when splitting.
    pub fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Llama3 | Self::Dbrx | Self::Smaug | Self::Chatglm4 => &[LLAMA3_PATTERN],
            Self::DeepseekLlm => DEEPSEEK_LLM_PATTERNS,
            Self::DeepseekCoder => DEEPSEEK_CODER_PATTERNS,
            Self::Falcon => FALCON_PATTERNS,
            Self::Starcoder
            | Self::Refact
            | Self::CommandR
            | Self::Smollm
            | Self::Codeshell
            | Self::Exaone => &[r"\p{N}", GPT2_PATTERN],
            Self::Gpt2 | Self::Mpt | Self::Olmo | Self::Jais => &[GPT2_PATTERN],
            Self::Stablelm2 | Self::Qwen2 => &[QWEN2_PATTERN],
            Self::Poro | Self::Bloom | Self::Gpt3Finnish => &[PORO_PATTERN],
            Self::Viking => &[PORO_PATTERN, r"\p{N}"],
            Self::Tekken => &[TEKKEN_PATTERN],
            Self::Default => DEFAULT_PATTERNS,
        }
    }

    /// Adjust flags and special ids the way models of this family expect.
    pub fn apply_overrides(self, flags: &mut TokenizerFlags, special: &mut SpecialTokens) {
        match self {
            Self::Llama3 => {
                flags.ignore_merges = true;
                flags.add_bos = true;
            }
            Self::Tekken => {
                flags.clean_spaces = false;
                flags.ignore_merges = true;
                flags.add_bos = true;
            }
            Self::DeepseekLlm
            | Self::DeepseekCoder
            | Self::CommandR
            | Self::Qwen2
            | Self::Poro
            | Self::Viking
            | Self::Smollm => {
                flags.clean_spaces = false;
            }
            Self::Chatglm4 => {
                special.bos = None;
            }
            _ => {}
        }
    }
}

/// Compiled pattern list for one [`PreTokenizerKind`].
#[derive(Debug, Clone)]
pub struct PreTokenizer {
    kind: PreTokenizerKind,
    regexes: Vec<Regex>,
}

impl PreTokenizer {
    pub fn new(kind: PreTokenizerKind) -> Result<Self, fancy_regex::Error> {
        let regexes = kind
            .patterns()
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(kind = ?kind, n_patterns = regexes.len(), "pre-tokenizer compiled");
        Ok(Self { kind, regexes })
    }

    pub fn kind(&self) -> PreTokenizerKind {
        self.kind
    }

    /// Split `text` into words. The words concatenate back to `text`.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        if text.is_empty() {
            return pieces;
        }
        pieces.push(text);

        for regex in &self.regexes {
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                let mut last = 0;
                for m in regex.find_iter(piece).filter_map(|m| m.ok()) {
                    if m.start() > last {
                        next.push(&piece[last..m.start()]);
                    }
                    if m.end() > m.start() {
                        next.push(m.as_str());
                    }
                    last = m.end();
                }
                if last < piece.len() {
                    next.push(&piece[last..]);
                }
            }
            pieces = next;
        }
        pieces
    }
}
