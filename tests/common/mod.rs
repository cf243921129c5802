//! Small fixture vocabularies shared by the integration tests.

#![allow(dead_code)]

use vocabkit::{
    byte_level, Scheme, TokenAttr, TokenId, Tokenizer, Vocabulary, VocabularyBuilder,
};

/// Scored SentencePiece pieces; `▁` marks a word start.
const SPM_PIECES: &[(&str, f32)] = &[
    ("\u{2581}", -1.0),
    ("\u{2581}t", -2.0),
    ("he", -2.5),
    ("\u{2581}the", -1.5),
    ("in", -3.0),
    ("\u{2581}in", -2.2),
    ("\u{2581}a", -2.0),
    ("\u{2581}an", -2.4),
    ("ll", -3.2),
];

const BPE_PIECES: &[&str] = &["\u{0120}t", "he", "\u{0120}the", "in", "\u{0120}in"];

const BPE_MERGES: &[&str] = &[
    "\u{0120} t",
    "h e",
    "\u{0120}t he",
    "i n",
    "\u{0120} in",
];

/// Id of the `<|endoftext|>` token in [`bpe_vocab`].
pub const BPE_EOT: TokenId = 261;

pub fn id(vocab: &Vocabulary, text: &str) -> TokenId {
    vocab
        .token_id(text.as_bytes())
        .unwrap_or_else(|| panic!("{text:?} is not in the fixture vocabulary"))
}

/// SentencePiece BPE vocabulary: `<unk>`, `<s>`, `</s>`, the 256 `<0xHH>`
/// byte tokens, a handful of scored pieces and every lowercase letter.
pub fn spm_vocab() -> Vocabulary {
    let mut builder = VocabularyBuilder::new(Scheme::ByteBpeMerge)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("<s>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL);
    for byte in 0..=255u8 {
        builder = builder.token(format!("<0x{byte:02X}>"), 0.0, TokenAttr::BYTE);
    }
    builder = builder.tokens(
        SPM_PIECES
            .iter()
            .map(|&(text, score)| (text, score, TokenAttr::NORMAL)),
    );
    for ch in 'a'..='z' {
        builder = builder.token(ch.to_string(), -10.0, TokenAttr::NORMAL);
    }
    builder.build().unwrap()
}

/// Byte-level BPE vocabulary: the 256 byte-level symbols at ids 0..=255, five
/// merged pieces and `<|endoftext|>` as BOS/EOS.
pub fn bpe_vocab(clean_spaces: bool) -> Vocabulary {
    let mut builder = VocabularyBuilder::new(Scheme::RegexBpe);
    for byte in 0..=255u8 {
        builder = builder.token(byte_level::encode(&[byte]), 0.0, TokenAttr::NORMAL);
    }
    builder
        .tokens(BPE_PIECES.iter().map(|&text| (text, 0.0, TokenAttr::NORMAL)))
        .token("<|endoftext|>", 0.0, TokenAttr::CONTROL)
        .merge_lines(BPE_MERGES.iter().copied())
        .unwrap()
        .update_special_tokens(|s| {
            s.bos = Some(BPE_EOT);
            s.eos = Some(BPE_EOT);
        })
        .update_flags(|f| f.clean_spaces = clean_spaces)
        .build()
        .unwrap()
}

/// BERT-style vocabulary with `##` continuation pieces.
pub fn wordpiece_vocab() -> Vocabulary {
    VocabularyBuilder::new(Scheme::WordPiece)
        .token("[PAD]", 0.0, TokenAttr::CONTROL)
        .token("[UNK]", 0.0, TokenAttr::UNKNOWN)
        .token("[CLS]", 0.0, TokenAttr::CONTROL)
        .token("[SEP]", 0.0, TokenAttr::CONTROL)
        .token("[MASK]", 0.0, TokenAttr::CONTROL)
        .token("\u{2581}un", 0.0, TokenAttr::NORMAL)
        .token("##break", 0.0, TokenAttr::NORMAL)
        .token("##able", 0.0, TokenAttr::NORMAL)
        .token("\u{2581}the", 0.0, TokenAttr::NORMAL)
        .token("\u{2581}.", 0.0, TokenAttr::NORMAL)
        .update_special_tokens(|s| {
            s.pad = Some(0);
            s.unk = Some(1);
            s.cls = Some(2);
            s.sep = Some(3);
            s.mask = Some(4);
        })
        .build()
        .unwrap()
}

/// T5-style unigram builder with `<pad>`, `</s>` and `<unk>` at ids 0..=2.
pub fn unigram_builder() -> VocabularyBuilder {
    VocabularyBuilder::new(Scheme::Unigram)
        .token("<pad>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("\u{2581}", -2.0, TokenAttr::NORMAL)
        .token("\u{2581}hello", -3.0, TokenAttr::NORMAL)
        .token("\u{2581}world", -3.5, TokenAttr::NORMAL)
        .token("hel", -4.0, TokenAttr::NORMAL)
        .token("lo", -4.0, TokenAttr::NORMAL)
        .token("a", -5.0, TokenAttr::NORMAL)
        .update_flags(|f| {
            f.add_space_prefix = true;
            f.remove_extra_whitespace = true;
        })
}

/// Normalization blob with the single rule `"A" -> "a"`.
pub fn upper_a_charsmap() -> Vec<u8> {
    let mut xcda = vec![0u32; 66];
    xcda[0] = 1 << 10;
    xcda[64] = (1 << 10) | (1 << 8) | 0x41;
    xcda[65] = 0x8000_0000;
    let mut blob = Vec::new();
    blob.extend_from_slice(&((xcda.len() * 4) as u32).to_le_bytes());
    for entry in xcda {
        blob.extend_from_slice(&entry.to_le_bytes());
    }
    blob.extend_from_slice(b"a\0");
    blob
}

/// RWKV vocabulary: every printable ASCII byte, escaped control characters
/// and a few whole words.
pub fn rwkv_vocab() -> Vocabulary {
    let mut builder = VocabularyBuilder::new(Scheme::GreedyTrie);
    for byte in 0x20..=0x7eu8 {
        let text = if byte == b'\\' {
            "\\\\".to_string()
        } else {
            char::from(byte).to_string()
        };
        builder = builder.token(text, 0.0, TokenAttr::NORMAL);
    }
    builder
        .token("\\n", 0.0, TokenAttr::NORMAL)
        .token("\\t", 0.0, TokenAttr::NORMAL)
        .token("\\x00", 0.0, TokenAttr::NORMAL)
        .token("hell", 0.0, TokenAttr::NORMAL)
        .token("hello", 0.0, TokenAttr::NORMAL)
        .token(" world", 0.0, TokenAttr::NORMAL)
        .build()
        .unwrap()
}

pub fn tokenizer(vocab: Vocabulary) -> Tokenizer {
    Tokenizer::new(vocab).unwrap()
}
