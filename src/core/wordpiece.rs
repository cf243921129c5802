//! Greedy longest-match tokenization for BERT-style vocabularies.
//!
//! Input is NFD-normalized, lowercased and split into words on whitespace;
//! punctuation, ASCII symbols and CJK ideographs become one-character words.
//! Each word is prefixed with `▁` and consumed left to right by the longest
//! vocabulary token at each position. Continuation pieces may also be stored
//! with a `##` prefix. A word that cannot be fully covered becomes a single
//! unknown token.

use unicode_normalization::UnicodeNormalization;

use super::vocab::{TokenId, Vocabulary};

const WORD_PREFIX: &str = "\u{2581}";
const CONTINUATION_PREFIX: &[u8] = b"##";

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WordPieceTokenizer;

impl WordPieceTokenizer {
    pub fn tokenize(&self, vocab: &Vocabulary, text: &[u8], output: &mut Vec<TokenId>) {
        let text = String::from_utf8_lossy(text);
        let max_len = vocab.max_token_len();
        let mut candidate = Vec::with_capacity(max_len + CONTINUATION_PREFIX.len());

        for word in preprocess(&text) {
            let mut word_bytes = Vec::with_capacity(WORD_PREFIX.len() + word.len());
            word_bytes.extend_from_slice(WORD_PREFIX.as_bytes());
            word_bytes.extend_from_slice(word.as_bytes());
            let n = word_bytes.len();

            let word_start = output.len();
            let mut i = 0;
            while i < n {
                let mut matched = None;
                let mut j = n.min(i + max_len);
                while j > i {
                    let piece = &word_bytes[i..j];
                    matched = vocab.token_id(piece).or_else(|| {
                        if i == 0 {
                            return None;
                        }
                        candidate.clear();
                        candidate.extend_from_slice(CONTINUATION_PREFIX);
                        candidate.extend_from_slice(piece);
                        vocab.token_id(&candidate)
                    });
                    if matched.is_some() {
                        break;
                    }
                    j -= 1;
                }

                match matched {
                    Some(id) => {
                        output.push(id);
                        i = j;
                    }
                    None => {
                        output.truncate(word_start);
                        break;
                    }
                }
            }

            if output.len() == word_start {
                if let Some(unk) = vocab.special().unk {
                    output.push(unk);
                }
            }
        }
    }
}

/// Normalize and split text into words.
pub(crate) fn preprocess(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.nfd() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch == '\0' || ch == char::REPLACEMENT_CHARACTER || is_control(ch) {
            continue;
        }

        let lower = ch.to_lowercase();
        if is_punctuation(ch) || (ch.is_ascii() && is_ascii_symbol(ch)) || is_chinese_char(ch) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(lower.collect());
        } else {
            current.extend(lower);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Control and format characters (general categories Cc and Cf).
fn is_control(ch: char) -> bool {
    if ch.is_control() {
        return true;
    }
    matches!(
        ch as u32,
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x0890..=0x0891
            | 0x08E2
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0x110BD
            | 0x110CD
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F
    )
}

fn is_ascii_symbol(ch: char) -> bool {
    matches!(ch, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~')
}

/// Unicode punctuation (general category P).
fn is_punctuation(ch: char) -> bool {
    if ch.is_ascii() {
        return ch.is_ascii_punctuation() && !is_ascii_symbol(ch);
    }
    matches!(
        ch as u32,
        0x00A1
            | 0x00A7
            | 0x00AB
            | 0x00B6..=0x00B7
            | 0x00BB
            | 0x00BF
            | 0x037E
            | 0x0387
            | 0x055A..=0x055F
            | 0x0589..=0x058A
            | 0x05BE
            | 0x05C0
            | 0x05C3
            | 0x05C6
            | 0x05F3..=0x05F4
            | 0x0609..=0x060A
            | 0x060C..=0x060D
            | 0x061B
            | 0x061D..=0x061F
            | 0x066A..=0x066D
            | 0x06D4
            | 0x0700..=0x070D
            | 0x0964..=0x0965
            | 0x0970
            | 0x0E4F
            | 0x0E5A..=0x0E5B
            | 0x0F04..=0x0F12
            | 0x0F14
            | 0x0F3A..=0x0F3D
            | 0x104A..=0x104F
            | 0x10FB
            | 0x1360..=0x1368
            | 0x166E
            | 0x169B..=0x169C
            | 0x16EB..=0x16ED
            | 0x17D4..=0x17D6
            | 0x17D8..=0x17DA
            | 0x1800..=0x180A
            | 0x2010..=0x2027
            | 0x2030..=0x2043
            | 0x2045..=0x2051
            | 0x2053..=0x205E
            | 0x207D..=0x207E
            | 0x208D..=0x208E
            | 0x2308..=0x230B
            | 0x2329..=0x232A
            | 0x2768..=0x2775
            | 0x27C5..=0x27C6
            | 0x27E6..=0x27EF
            | 0x2983..=0x2998
            | 0x29D8..=0x29DB
            | 0x29FC..=0x29FD
            | 0x2CF9..=0x2CFC
            | 0x2CFE..=0x2CFF
            | 0x2E00..=0x2E2E
            | 0x2E30..=0x2E4F
            | 0x3001..=0x3003
            | 0x3008..=0x3011
            | 0x3014..=0x301F
            | 0x3030
            | 0x303D
            | 0x30A0
            | 0x30FB
            | 0xFD3E..=0xFD3F
            | 0xFE10..=0xFE19
            | 0xFE30..=0xFE52
            | 0xFE54..=0xFE61
            | 0xFE63
            | 0xFE68
            | 0xFE6A..=0xFE6B
            | 0xFF01..=0xFF03
            | 0xFF05..=0xFF0A
            | 0xFF0C..=0xFF0F
            | 0xFF1A..=0xFF1B
            | 0xFF1F..=0xFF20
            | 0xFF3B..=0xFF3D
            | 0xFF3F
            | 0xFF5B
            | 0xFF5D
            | 0xFF5F..=0xFF65
    )
}

/// CJK unified ideographs and compatibility ideographs.
fn is_chinese_char(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2B73F
            | 0x2B740..=0x2B81F
            | 0x2B920..=0x2CEAF
            | 0xF900..=0xFAFF
            | 0x2F800..=0x2FA1F
    )
}
