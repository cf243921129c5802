//! Integration tests for BERT-style WordPiece vocabularies.

mod common;

use common::{id, tokenizer, wordpiece_vocab};

#[test]
fn test_wordpiece_continuation_pieces() {
    let tokenizer = tokenizer(wordpiece_vocab());
    let vocab = tokenizer.vocab();
    assert_eq!(
        tokenizer.tokenize("unbreakable", false, false),
        vec![id(vocab, "\u{2581}un"), id(vocab, "##break"), id(vocab, "##able")]
    );
}

#[test]
fn test_wordpiece_unknown_word() {
    let tokenizer = tokenizer(wordpiece_vocab());
    let unk = id(tokenizer.vocab(), "[UNK]");
    assert_eq!(tokenizer.tokenize("xyz", false, false), vec![unk]);
    assert_eq!(
        tokenizer.tokenize("the xyz.", false, false),
        vec![id(tokenizer.vocab(), "\u{2581}the"), unk, id(tokenizer.vocab(), "\u{2581}.")]
    );
}

#[test]
fn test_wordpiece_cls_sep_framing() {
    let tokenizer = tokenizer(wordpiece_vocab());
    let the = id(tokenizer.vocab(), "\u{2581}the");
    assert_eq!(tokenizer.tokenize("The", true, false), vec![2, the, 3]);
    // A literal [MASK] is matched only with parse_special.
    assert_eq!(tokenizer.tokenize("the [MASK]", false, true), vec![the, 4]);
}

#[test]
fn test_wordpiece_detokenize() {
    let tokenizer = tokenizer(wordpiece_vocab());
    let ids = tokenizer.tokenize("unbreakable the", true, false);
    // CLS/SEP render as nothing; the space placeholder becomes a space.
    assert_eq!(tokenizer.decode(&ids).unwrap(), " unbreakable the");
    assert_eq!(
        tokenizer.detokenize(&ids, false, true),
        b"[CLS] unbreakable the[SEP]".to_vec()
    );
}

#[test]
fn test_wordpiece_newline_is_pad() {
    let tokenizer = tokenizer(wordpiece_vocab());
    assert_eq!(tokenizer.newline_token(), Some(0));
}
