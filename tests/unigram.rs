//! Integration tests for unigram language-model vocabularies.

mod common;

use common::{id, tokenizer, unigram_builder, upper_a_charsmap};
use vocabkit::{CharsMapError, Tokenizer, TokenizerError};

#[test]
fn test_unigram_best_segmentation() {
    let tokenizer = tokenizer(unigram_builder().build().unwrap());
    let vocab = tokenizer.vocab();
    let hello = id(vocab, "\u{2581}hello");
    let world = id(vocab, "\u{2581}world");
    assert_eq!(tokenizer.tokenize("hello world", false, false), vec![hello, world]);
    // Extra whitespace collapses before segmentation.
    assert_eq!(tokenizer.tokenize("  hello   world ", false, false), vec![hello, world]);
    // EOS is appended by default for this scheme.
    assert_eq!(tokenizer.tokenize("hello world", true, false), vec![hello, world, 1]);
}

#[test]
fn test_unigram_unknown_run_is_one_token() {
    let tokenizer = tokenizer(unigram_builder().build().unwrap());
    let vocab = tokenizer.vocab();
    assert_eq!(
        tokenizer.tokenize("hello zz", false, false),
        vec![id(vocab, "\u{2581}hello"), id(vocab, "\u{2581}"), 2]
    );
}

#[test]
fn test_unigram_charsmap_normalization() {
    let vocab = unigram_builder().charsmap(upper_a_charsmap()).build().unwrap();
    let tokenizer = tokenizer(vocab);
    let vocab = tokenizer.vocab();
    assert_eq!(
        tokenizer.tokenize("A", false, false),
        vec![id(vocab, "\u{2581}"), id(vocab, "a")]
    );
}

#[test]
fn test_unigram_malformed_charsmap() {
    let vocab = unigram_builder().charsmap(vec![1, 0]).build().unwrap();
    assert!(matches!(
        Tokenizer::new(vocab),
        Err(TokenizerError::CharsMapError(CharsMapError::TooShort(2)))
    ));
}

#[test]
fn test_unigram_detokenize_drops_framing() {
    let tokenizer = tokenizer(unigram_builder().build().unwrap());
    let ids = tokenizer.tokenize("hello world", true, false);
    assert_eq!(tokenizer.decode(&ids).unwrap(), "hello world");
    assert_eq!(tokenizer.detokenize(&ids, false, true), b"hello world</s>".to_vec());
    assert!(tokenizer.is_end_of_generation(1));
}
