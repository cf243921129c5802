//! Byte-level alphabet used by regex-BPE and WordPiece vocabularies.
//!
//! Those vocabularies store token text in a reversible mapping from raw bytes
//! to printable characters: printable ASCII and most of Latin-1 map to
//! themselves, every other byte maps to a code point from U+0100 upward. A
//! space therefore appears as `Ġ` (U+0120) and a newline as `Ċ` (U+010A).
//!
//! Pre-tokenized words are encoded into this alphabet before merging, and
//! token pieces are decoded back to raw bytes when rendering.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut mapping = ['\0'; 256];
    let is_direct = |b: u8| matches!(b, 33..=126 | 161..=172 | 174..=255);

    let mut next = 0x100u32;
    for b in 0u8..=255 {
        mapping[b as usize] = if is_direct(b) {
            b as char
        } else {
            let ch = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            ch
        };
    }
    mapping
});

static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Printable stand-in for a raw byte.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// Raw byte behind a byte-level character, if it belongs to the alphabet.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Encode raw bytes into the byte-level alphabet.
///
/// ```
/// use vocabkit::byte_level::encode;
/// assert_eq!(encode(b" hi\n"), "\u{0120}hi\u{010A}");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| byte_to_char(b)).collect()
}

/// Decode a byte-level string. Fails on the first character outside the
/// alphabet.
pub fn decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(char_to_byte).collect()
}

/// Decode a token piece for rendering.
///
/// Characters outside the alphabet cannot be mapped back to one byte; each
/// is rendered as `[UNK_BYTE_0x..]` with the code point's UTF-8 bytes in hex.
/// Bytes that are not valid UTF-8 are treated the same way per byte.
pub fn decode_piece(piece: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(piece.len());
    for chunk in piece.utf8_chunks() {
        for ch in chunk.valid().chars() {
            match char_to_byte(ch) {
                Some(b) => out.push(b),
                None => {
                    let mut buf = [0u8; 4];
                    push_unknown(&mut out, ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        if !chunk.invalid().is_empty() {
            push_unknown(&mut out, chunk.invalid());
        }
    }
    out
}

fn push_unknown(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(b"[UNK_BYTE_0x");
    for b in bytes {
        out.extend_from_slice(format!("{b:02x}").as_bytes());
    }
    out.push(b']');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_bijective() {
        let mut seen = std::collections::HashSet::new();
        for b in 0u8..=255 {
            assert!(seen.insert(byte_to_char(b)), "Duplicate mapping for byte {}", b);
            assert_eq!(char_to_byte(byte_to_char(b)), Some(b));
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn test_printable_ascii_preserved() {
        for b in 33u8..=126 {
            assert_eq!(byte_to_char(b), b as char, "ASCII {} should map to itself", b);
        }
    }

    #[test]
    fn test_whitespace_mapping() {
        assert_eq!(byte_to_char(b' '), '\u{0120}');
        assert_eq!(byte_to_char(b'\n'), '\u{010A}');
        assert_eq!(byte_to_char(b'\t'), '\u{0109}');
    }

    #[test]
    fn test_encode_multibyte() {
        // U+4F60 is E4 BD A0 in UTF-8
        let encoded = encode("\u{4F60}".as_bytes());
        assert_eq!(encoded, "\u{00E4}\u{00BD}\u{0142}");
        assert_eq!(decode(&encoded).unwrap(), "\u{4F60}".as_bytes());
    }

    #[test]
    fn test_decode_rejects_foreign_chars() {
        assert_eq!(decode("ab\u{4F60}"), None);
    }

    #[test]
    fn test_decode_piece_marks_unknown() {
        assert_eq!(decode_piece("\u{0120}ok".as_bytes()), b" ok");
        assert_eq!(decode_piece("x\u{4F60}".as_bytes()), b"x[UNK_BYTE_0xe4bda0]");
        assert_eq!(decode_piece(&[b'a', 0xff]), b"a[UNK_BYTE_0xff]");
    }

    #[test]
    fn test_full_roundtrip_string() {
        let original = "Hello, \u{4E16}\u{754C}! \u{1F30D}";
        let decoded = decode(&encode(original.as_bytes())).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), original);
    }
}
