//! Integration tests for score-driven (SentencePiece) BPE vocabularies.

mod common;

use common::{id, spm_vocab, tokenizer};
use vocabkit::{Scheme, TokenAttr, Tokenizer, VocabularyBuilder};

/// A word that is already a whole entry needs no merging.
#[test]
fn test_spm_whole_entry() {
    let vocab = VocabularyBuilder::new(Scheme::ByteBpeMerge)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("<s>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL)
        .token("\u{2581}a", 0.0, TokenAttr::NORMAL)
        .token("\u{2581}", -1.0, TokenAttr::NORMAL)
        .token("a", -2.0, TokenAttr::NORMAL)
        .build()
        .unwrap();
    let tokenizer = Tokenizer::new(vocab).unwrap();
    assert_eq!(tokenizer.tokenize("a", false, false), vec![3]);
}

/// Merges follow score order and chain through intermediate pieces.
#[test]
fn test_spm_merge_chain() {
    let tokenizer = tokenizer(spm_vocab());
    let vocab = tokenizer.vocab();
    assert_eq!(
        tokenizer.tokenize("the in", false, false),
        vec![id(vocab, "\u{2581}the"), id(vocab, "\u{2581}in")]
    );
    assert_eq!(
        tokenizer.tokenize("an", false, false),
        vec![id(vocab, "\u{2581}an")]
    );
}

/// Characters with no piece fall back to one token per UTF-8 byte.
#[test]
fn test_spm_byte_fallback() {
    let tokenizer = tokenizer(spm_vocab());
    let vocab = tokenizer.vocab();
    let ids = tokenizer.tokenize("\u{00e9}", false, false);
    assert_eq!(
        ids,
        vec![id(vocab, "\u{2581}"), id(vocab, "<0xC3>"), id(vocab, "<0xA9>")]
    );
    assert_eq!(tokenizer.decode(&ids).unwrap(), "\u{00e9}");
}

/// BOS is added on request, and EOS only when the vocabulary asks for it.
#[test]
fn test_spm_special_framing() {
    let tokenizer = tokenizer(spm_vocab());
    let the = id(tokenizer.vocab(), "\u{2581}the");
    assert_eq!(tokenizer.tokenize("the", true, false), vec![1, the]);

    let vocab = VocabularyBuilder::new(Scheme::ByteBpeMerge)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("<s>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL)
        .token("\u{2581}a", 0.0, TokenAttr::NORMAL)
        .update_flags(|f| f.add_eos = true)
        .build()
        .unwrap();
    let tokenizer = Tokenizer::new(vocab).unwrap();
    assert_eq!(tokenizer.tokenize("a", true, false), vec![1, 3, 2]);
    assert_eq!(tokenizer.decode(&[1, 3, 2]).unwrap(), " a");
}

/// Text after a literal special token gets its own space prefix.
#[test]
fn test_spm_parse_special() {
    let tokenizer = tokenizer(spm_vocab());
    let vocab = tokenizer.vocab();
    let the = id(vocab, "\u{2581}the");
    assert_eq!(tokenizer.tokenize("<s>the", false, true), vec![1, the]);
    // Without parse_special the markup is plain text.
    assert!(!tokenizer.tokenize("<s>the", false, false).contains(&1));
}

#[test]
fn test_spm_roundtrip() {
    let tokenizer = tokenizer(spm_vocab());
    for text in ["the in", "hello world", "an apple, in the tree!", "MiXeD 123"] {
        let ids = tokenizer.tokenize(text, false, false);
        assert_eq!(tokenizer.decode(&ids).unwrap(), text, "roundtrip failed for {text:?}");
    }
}

#[test]
fn test_spm_newline_token() {
    let tokenizer = tokenizer(spm_vocab());
    assert_eq!(tokenizer.newline_token(), Some(id(tokenizer.vocab(), "<0x0A>")));
}

#[test]
fn test_spm_without_byte_tokens_uses_pad_for_newline() {
    let vocab = VocabularyBuilder::new(Scheme::ByteBpeMerge)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("<s>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL)
        .token("<pad>", 0.0, TokenAttr::CONTROL)
        .update_special_tokens(|s| s.pad = Some(3))
        .build()
        .unwrap();
    let tokenizer = Tokenizer::new(vocab).unwrap();
    assert_eq!(tokenizer.newline_token(), Some(3));
}
