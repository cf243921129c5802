//! Shared bigram merge engine.
//!
//! Both merge-based schemes start from one symbol per UTF-8 code point and
//! repeatedly join the best adjacent pair. Symbols form a doubly-linked list
//! over a single buffer so a merge is O(1); candidate pairs sit in a binary
//! heap and are validated lazily when popped, since a pair goes stale once
//! either side has been merged elsewhere.
//!
//! The schemes differ only in how a pair is scored, so the engine takes a
//! priority callback: the highest priority merges first, ties go to the
//! leftmost pair.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::ops::Range;

/// A run of bytes in the linked symbol list. `len == 0` marks a symbol that
/// was merged into its left neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Symbol {
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub start: usize,
    pub len: usize,
}

impl Symbol {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Byte length of the UTF-8 sequence introduced by `lead`. Continuation and
/// invalid lead bytes count as one byte.
#[inline]
pub(crate) fn utf8_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// Iterate over the code-point-sized chunks of `bytes`. A truncated trailing
/// sequence is returned as a shorter chunk.
pub(crate) fn utf8_chunks(bytes: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let &lead = bytes.get(pos)?;
        let len = utf8_len(lead).min(bytes.len() - pos);
        let chunk = &bytes[pos..pos + len];
        pos += len;
        Some(chunk)
    })
}

/// Build the initial linked list of one symbol per code point.
pub(crate) fn split_symbols(text: &[u8]) -> Vec<Symbol> {
    let mut symbols = Vec::with_capacity(text.len());
    let mut start = 0;
    for chunk in utf8_chunks(text) {
        let index = symbols.len();
        symbols.push(Symbol {
            prev: index.checked_sub(1),
            next: None,
            start,
            len: chunk.len(),
        });
        if index > 0 {
            symbols[index - 1].next = Some(index);
        }
        start += chunk.len();
    }
    symbols
}

/// Live symbols in order. The first symbol is never merged away, so the walk
/// starts at index 0.
pub(crate) fn live_symbols(symbols: &[Symbol]) -> impl Iterator<Item = &Symbol> + '_ {
    let mut cursor = if symbols.is_empty() { None } else { Some(0) };
    std::iter::from_fn(move || {
        let symbol = &symbols[cursor?];
        cursor = symbol.next;
        Some(symbol)
    })
}

struct Bigram<P> {
    priority: P,
    left: usize,
    right: usize,
    size: usize,
}

impl<P: Ord> Ord for Bigram<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl<P: Ord> PartialOrd for Bigram<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P: Ord> PartialEq for Bigram<P> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<P: Ord> Eq for Bigram<P> {}

fn push_bigram<P, F>(
    queue: &mut BinaryHeap<Bigram<P>>,
    symbols: &[Symbol],
    left: Option<usize>,
    right: Option<usize>,
    priority: &mut F,
) where
    P: Ord,
    F: FnMut(Range<usize>, Range<usize>) -> Option<P>,
{
    let (Some(left), Some(right)) = (left, right) else {
        return;
    };
    let (l, r) = (symbols[left], symbols[right]);
    if let Some(priority) = priority(l.range(), r.range()) {
        queue.push(Bigram {
            priority,
            left,
            right,
            size: l.len + r.len,
        });
    }
}

/// Merge adjacent symbols until no candidate pair remains.
///
/// `priority` receives the byte ranges of the left and right symbol and
/// returns `None` when the pair cannot merge.
pub(crate) fn merge_symbols<P, F>(symbols: &mut [Symbol], mut priority: F)
where
    P: Ord,
    F: FnMut(Range<usize>, Range<usize>) -> Option<P>,
{
    let mut queue = BinaryHeap::new();
    for i in 1..symbols.len() {
        push_bigram(&mut queue, symbols, Some(i - 1), Some(i), &mut priority);
    }

    while let Some(bigram) = queue.pop() {
        let left = symbols[bigram.left];
        let right = symbols[bigram.right];
        if left.len == 0 || right.len == 0 || left.len + right.len != bigram.size {
            continue;
        }

        symbols[bigram.left].len += right.len;
        symbols[bigram.right].len = 0;
        symbols[bigram.left].next = right.next;
        if let Some(next) = right.next {
            symbols[next].prev = Some(bigram.left);
        }

        push_bigram(&mut queue, symbols, left.prev, Some(bigram.left), &mut priority);
        push_bigram(&mut queue, symbols, Some(bigram.left), right.next, &mut priority);
    }
}
