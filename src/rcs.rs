//! Restricted Character Sets (EXI 7.1.10.1).
//!
//! Typen mit Pattern-Facet oder eingebautem Zeichenvorrat codieren jedes
//! Zeichen als n-bit Index statt als Code Point:
//! - n = ⌈log₂(N+1)⌉, N = Anzahl Zeichen im Set
//! - Escape: Index N gefolgt vom Code Point als Unsigned Integer
//!
//! Ein Set hat höchstens 255 Zeichen und enthält nur BMP-Zeichen.

use std::sync::LazyLock;

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, bit_width, unsigned_integer};

/// Sorted code-point table with an escape slot for out-of-set characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedCharSet {
    /// Sortiert nach Code Point
    chars: Vec<char>,
    /// ⌈log₂(N+1)⌉
    width: u8,
}

impl RestrictedCharSet {
    /// Baut ein Set aus beliebig sortierten Zeichen (Duplikate werden entfernt).
    ///
    /// `None` wenn das Set leer ist, mehr als 255 Zeichen hat oder Zeichen
    /// außerhalb der BMP enthält. Der Aufrufer fällt dann auf die normale
    /// String-Codierung zurück.
    pub fn new(mut chars: Vec<char>) -> Option<Self> {
        chars.sort_unstable();
        chars.dedup();
        if chars.is_empty() || chars.len() > 255 || chars.iter().any(|&c| c as u32 > 0xFFFF) {
            return None;
        }
        let width = bit_width::for_count(chars.len() + 1);
        Some(Self { chars, width })
    }

    /// Anzahl der Zeichen im Set (1..=255).
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Always false: empty sets are rejected by [`RestrictedCharSet::new`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    #[inline]
    pub fn width(&self) -> u8 {
        self.width
    }

    #[inline]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    #[inline]
    pub fn contains(&self, ch: char) -> bool {
        self.chars.binary_search(&ch).is_ok()
    }

    /// Writes one character: its index, or the escape index followed by the code point.
    pub fn encode_char(&self, writer: &mut BitWriter<'_>, ch: char) -> Result<()> {
        match self.chars.binary_search(&ch) {
            Ok(index) => writer.write_nbit(index as u64, self.width),
            Err(_) => {
                writer.write_nbit(self.chars.len() as u64, self.width)?;
                unsigned_integer::encode(writer, u64::from(ch))
            }
        }
    }

    /// Reads one character.
    pub fn decode_char(&self, reader: &mut BitReader<'_>) -> Result<char> {
        let index = reader.read_nbit(self.width)? as usize;
        match index.cmp(&self.chars.len()) {
            std::cmp::Ordering::Less => Ok(self.chars[index]),
            std::cmp::Ordering::Equal => {
                let cp = unsigned_integer::decode(reader)?;
                u32::try_from(cp)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(Error::InvalidCodePoint(cp))
            }
            // Nur möglich wenn N+1 keine Zweierpotenz ist
            std::cmp::Ordering::Greater => Err(Error::InvalidEnumerationIndex {
                index,
                enum_count: self.chars.len() + 1,
            }),
        }
    }

    /// Schreibt die Zeichen ohne Längenpräfix.
    pub fn encode_chars(&self, writer: &mut BitWriter<'_>, value: &str) -> Result<()> {
        for ch in value.chars() {
            self.encode_char(writer, ch)?;
        }
        Ok(())
    }

    /// Liest `len` Zeichen und hängt sie an `out` an.
    pub fn decode_chars_into(&self, reader: &mut BitReader<'_>, len: u64, out: &mut String) -> Result<()> {
        for _ in 0..len {
            out.push(self.decode_char(reader)?);
        }
        Ok(())
    }
}

// =============================================================================
// Eingebaute Sets (EXI Table 7-2)
// =============================================================================

/// Whitespace plus zusätzliche Zeichen und Bereiche.
fn builtin(extra: &[char], ranges: &[std::ops::RangeInclusive<char>]) -> RestrictedCharSet {
    let mut chars = vec!['\t', '\n', '\r', ' '];
    chars.extend_from_slice(extra);
    for range in ranges {
        chars.extend(range.clone());
    }
    chars.sort_unstable();
    chars.dedup();
    let width = bit_width::for_count(chars.len() + 1);
    RestrictedCharSet { chars, width }
}

/// base64Binary: { \t, \n, \r, ' ', +, /, 0-9, =, A-Z, a-z }
pub static BASE64_BINARY: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['+', '/', '='], &['0'..='9', 'A'..='Z', 'a'..='z']));

/// hexBinary: { \t, \n, \r, ' ', 0-9, A-F, a-f }
pub static HEX_BINARY: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&[], &['0'..='9', 'A'..='F', 'a'..='f']));

/// boolean: { \t, \n, \r, ' ', 0, 1, a, e, f, l, r, s, t, u }
pub static BOOLEAN: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['0', '1', 'a', 'e', 'f', 'l', 'r', 's', 't', 'u'], &[]));

/// dateTime family: { \t, \n, \r, ' ', +, -, ., 0-9, :, T, Z }
pub static DATE_TIME: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['+', '-', '.', ':', 'T', 'Z'], &['0'..='9']));

/// decimal: { \t, \n, \r, ' ', +, -, ., 0-9 }
pub static DECIMAL: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['+', '-', '.'], &['0'..='9']));

/// float/double: { \t, \n, \r, ' ', +, -, ., 0-9, E, F, I, N, a, e }
pub static DOUBLE: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['+', '-', '.', 'E', 'F', 'I', 'N', 'a', 'e'], &['0'..='9']));

/// integer: { \t, \n, \r, ' ', +, -, 0-9 }
pub static INTEGER: LazyLock<RestrictedCharSet> =
    LazyLock::new(|| builtin(&['+', '-'], &['0'..='9']));

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut BitWriter<'_>) -> Result<()>) -> (Vec<u8>, u64) {
        let mut out = Vec::new();
        let bits;
        {
            let mut w = BitWriter::new(&mut out);
            f(&mut w).unwrap();
            bits = w.bit_position();
            w.finish().unwrap();
        }
        (out, bits)
    }

    fn round_trip(rcs: &RestrictedCharSet, s: &str) -> String {
        let (data, _) = written(|w| rcs.encode_chars(w, s));
        let mut out = String::new();
        rcs.decode_chars_into(&mut BitReader::new(&data[..]), s.chars().count() as u64, &mut out)
            .unwrap();
        out
    }

    #[test]
    fn eingebaute_sets_groesse_und_breite() {
        let cases: [(&RestrictedCharSet, usize, u8); 7] = [
            (&BASE64_BINARY, 69, 7),
            (&HEX_BINARY, 26, 5),
            (&BOOLEAN, 14, 4),
            (&DATE_TIME, 20, 5),
            (&DECIMAL, 17, 5),
            (&DOUBLE, 23, 5),
            (&INTEGER, 16, 5),
        ];
        for (rcs, len, width) in cases {
            assert_eq!(rcs.len(), len);
            assert_eq!(rcs.width(), width);
            assert!(rcs.chars().windows(2).all(|w| w[0] < w[1]), "sortiert");
        }
    }

    #[test]
    fn new_rejects_invalid_sets() {
        assert!(RestrictedCharSet::new(vec![]).is_none());
        let too_many: Vec<char> = (0u32..256).filter_map(char::from_u32).collect();
        assert!(RestrictedCharSet::new(too_many).is_none());
        assert!(RestrictedCharSet::new(vec!['a', '😀']).is_none());
    }

    #[test]
    fn new_sortiert_und_dedupliziert() {
        let rcs = RestrictedCharSet::new(vec!['z', 'a', 'm', 'a']).unwrap();
        assert_eq!(rcs.chars(), &['a', 'm', 'z']);
        assert_eq!(rcs.width(), 2);
        let exactly_255: Vec<char> = (0u32..255).filter_map(char::from_u32).collect();
        assert_eq!(RestrictedCharSet::new(exactly_255).unwrap().width(), 8);
    }

    #[test]
    fn escape_fuer_fremde_zeichen() {
        let rcs = RestrictedCharSet::new(vec!['a', 'b', 'c']).unwrap();
        // Index 0 in 2 Bits
        assert_eq!(written(|w| rcs.encode_char(w, 'a')).1, 2);
        // Escape (3) in 2 Bits + 'x' als ein Octet
        assert_eq!(written(|w| rcs.encode_char(w, 'x')).1, 10);
        assert_eq!(round_trip(&rcs, "axbycz"), "axbycz");
    }

    #[test]
    fn lexikalische_formen_der_eingebauten_sets() {
        let cases: [(&RestrictedCharSet, &str); 6] = [
            (&BASE64_BINARY, "SGVsbG8gV29ybGQh"),
            (&HEX_BINARY, "DEADBEEF"),
            (&BOOLEAN, "false"),
            (&DATE_TIME, "2024-01-15T10:30:00Z"),
            (&DOUBLE, "-INF"),
            (&INTEGER, "-42"),
        ];
        for (rcs, value) in cases {
            assert_eq!(round_trip(rcs, value), value);
        }
    }

    #[test]
    fn index_ueber_escape_ist_fehler() {
        // N=4 → 3 Bits, Indizes 5..7 sind ungültig
        let rcs = RestrictedCharSet::new(vec!['a', 'b', 'c', 'd']).unwrap();
        let data = [0b1110_0000u8];
        assert!(matches!(
            rcs.decode_char(&mut BitReader::new(&data[..])),
            Err(Error::InvalidEnumerationIndex { index: 7, enum_count: 5 })
        ));
    }
}
