//! Benchmarks for tokenize and detokenize throughput across schemes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vocabkit::{byte_level, Scheme, TokenAttr, Tokenizer, VocabularyBuilder};

const SAMPLE: &str = "The quick brown fox jumps over the lazy dog. \
    Rust is a systems programming language; it's fast, and it's safe! ";

fn spm_tokenizer() -> Tokenizer {
    let mut builder = VocabularyBuilder::new(Scheme::ByteBpeMerge)
        .token("<unk>", 0.0, TokenAttr::UNKNOWN)
        .token("<s>", 0.0, TokenAttr::CONTROL)
        .token("</s>", 0.0, TokenAttr::CONTROL);
    for byte in 0..=255u8 {
        builder = builder.token(format!("<0x{byte:02X}>"), 0.0, TokenAttr::BYTE);
    }
    let mut seen = Vec::new();
    for word in SAMPLE.split_whitespace().map(str::to_lowercase) {
        if !seen.contains(&word) {
            let score = -(seen.len() as f32);
            builder = builder.token(format!("\u{2581}{word}"), score, TokenAttr::NORMAL);
            seen.push(word);
        }
    }
    for ch in 'a'..='z' {
        builder = builder.token(ch.to_string(), -50.0, TokenAttr::NORMAL);
    }
    builder = builder.token("\u{2581}", -1.0, TokenAttr::NORMAL);
    Tokenizer::new(builder.build().unwrap()).unwrap()
}

fn bpe_tokenizer() -> Tokenizer {
    let mut builder = VocabularyBuilder::new(Scheme::RegexBpe);
    for byte in 0..=255u8 {
        builder = builder.token(byte_level::encode(&[byte]), 0.0, TokenAttr::NORMAL);
    }
    let vocab = builder
        .token("\u{0120}t", 0.0, TokenAttr::NORMAL)
        .token("he", 0.0, TokenAttr::NORMAL)
        .token("\u{0120}the", 0.0, TokenAttr::NORMAL)
        .merge_lines(["\u{0120} t", "h e", "\u{0120}t he"])
        .unwrap()
        .update_special_tokens(|s| {
            s.bos = None;
            s.eos = None;
        })
        .build()
        .unwrap();
    Tokenizer::new(vocab).unwrap()
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");
    let tokenizers = [("spm", spm_tokenizer()), ("bpe", bpe_tokenizer())];

    for repeat in [1, 16, 256] {
        let text = SAMPLE.repeat(repeat);
        group.throughput(Throughput::Bytes(text.len() as u64));
        for (name, tokenizer) in &tokenizers {
            group.bench_with_input(BenchmarkId::new(*name, repeat), &text, |b, text| {
                b.iter(|| tokenizer.tokenize(black_box(text), false, false));
            });
        }
    }

    group.finish();
}

fn bench_detokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("detokenize");
    let tokenizers = [("spm", spm_tokenizer()), ("bpe", bpe_tokenizer())];

    for repeat in [1, 16, 256] {
        let text = SAMPLE.repeat(repeat);
        for (name, tokenizer) in &tokenizers {
            let ids = tokenizer.tokenize(&text, false, false);
            group.bench_with_input(BenchmarkId::new(*name, repeat), &ids, |b, ids| {
                b.iter(|| tokenizer.detokenize(black_box(ids), false, false));
            });
        }
    }

    group.finish();
}

fn bench_tokenize_batch(c: &mut Criterion) {
    let tokenizer = bpe_tokenizer();
    let texts: Vec<String> = (0..64).map(|i| SAMPLE.repeat(1 + i % 8)).collect();

    c.bench_function("tokenize_batch_bpe_64", |b| {
        b.iter(|| tokenizer.tokenize_batch(black_box(&texts), false, false));
    });
}

criterion_group!(benches, bench_tokenize, bench_detokenize, bench_tokenize_batch);
criterion_main!(benches);
