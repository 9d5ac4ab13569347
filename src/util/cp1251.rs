//! Windows-1251 (cp1251) string conversion.
//!
//! Archive entry names are stored in this single-byte code page. Decoding
//! is total (every byte maps to a char); encoding fails on characters the
//! code page cannot represent.

use super::{Error, Result};

/// Mapping for the 0x80..=0xBF range. 0xC0..=0xFF is the contiguous
/// Cyrillic block U+0410..=U+044F and is handled arithmetically.
const HIGH_TABLE: [char; 64] = [
    '\u{0402}', '\u{0403}', '\u{201A}', '\u{0453}', '\u{201E}', '\u{2026}',
    '\u{2020}', '\u{2021}', '\u{20AC}', '\u{2030}', '\u{0409}', '\u{2039}',
    '\u{040A}', '\u{040C}', '\u{040B}', '\u{040F}', '\u{0452}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{0098}', '\u{2122}', '\u{0459}', '\u{203A}', '\u{045A}', '\u{045C}',
    '\u{045B}', '\u{045F}', '\u{00A0}', '\u{040E}', '\u{045E}', '\u{0408}',
    '\u{00A4}', '\u{0490}', '\u{00A6}', '\u{00A7}', '\u{0401}', '\u{00A9}',
    '\u{0404}', '\u{00AB}', '\u{00AC}', '\u{00AD}', '\u{00AE}', '\u{0407}',
    '\u{00B0}', '\u{00B1}', '\u{0406}', '\u{0456}', '\u{0491}', '\u{00B5}',
    '\u{00B6}', '\u{00B7}', '\u{0451}', '\u{2116}', '\u{0454}', '\u{00BB}',
    '\u{0458}', '\u{0405}', '\u{0455}', '\u{0457}',
];

/// Decode cp1251 bytes into a `String`.
pub fn decode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x7F => b as char,
            0x80..=0xBF => HIGH_TABLE[(b - 0x80) as usize],
            0xC0..=0xFF => char::from_u32(0x0410 + (b - 0xC0) as u32)
                .unwrap_or('\u{FFFD}'),
        })
        .collect()
}

/// Encode a string as cp1251 bytes.
///
/// Returns [`Error::FormatMismatch`] for characters outside the code page.
pub fn encode(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        out.push(encode_char(c).ok_or_else(|| {
            Error::mismatch(format!("character {c:?} not representable in cp1251"))
        })?);
    }
    Ok(out)
}

fn encode_char(c: char) -> Option<u8> {
    if c.is_ascii() {
        return Some(c as u8);
    }
    let code = c as u32;
    if (0x0410..=0x044F).contains(&code) {
        return Some((code - 0x0410) as u8 + 0xC0);
    }
    HIGH_TABLE
        .iter()
        .position(|&t| t == c)
        .map(|i| i as u8 + 0x80)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode(b"unmods.fig"), "unmods.fig");
        assert_eq!(encode("unmods.fig").unwrap(), b"unmods.fig");
    }

    #[test]
    fn test_cyrillic() {
        let s = "меч";
        let bytes = encode(s).unwrap();
        assert_eq!(bytes, [0xEC, 0xE5, 0xF7]);
        assert_eq!(decode(&bytes), s);
    }

    #[test]
    fn test_all_bytes_roundtrip() {
        let bytes: Vec<u8> = (0u8..=255).collect();
        let text = decode(&bytes);
        assert_eq!(encode(&text).unwrap(), bytes);
    }

    #[test]
    fn test_unmappable() {
        assert!(encode("漢").is_err());
    }
}
