//! String literals (EXI 7.1.10).
//!
//! Ohne Restricted Character Set: Länge (Anzahl Zeichen) als Unsigned
//! Integer, danach jeder Code Point als Unsigned Integer. Mit RCS wird jedes
//! Zeichen über [`RestrictedCharSet`] geschrieben.
//!
//! Die String-Table Partitionen verschieben die Länge um einen Offset
//! (Local-Name Miss: +1, Value Miss: +2); Länge und Zeichen werden deshalb
//! auch getrennt angeboten.

use crate::bitstream::{BitReader, BitWriter};
use crate::rcs::RestrictedCharSet;
use crate::{Error, Result, unsigned_integer};

/// Obergrenze für die Vorab-Reservierung beim Decodieren (manipulierte Längen).
const MAX_PREALLOC_CHARS: usize = 64 * 1024;

/// Encodes a length-prefixed string without a restricted character set.
pub fn encode(writer: &mut BitWriter<'_>, value: &str) -> Result<()> {
    encode_with_offset(writer, value, 0, None)
}

/// Encodes `value` with its character count shifted by `offset`.
pub fn encode_with_offset(
    writer: &mut BitWriter<'_>,
    value: &str,
    offset: u64,
    rcs: Option<&RestrictedCharSet>,
) -> Result<()> {
    if value.is_ascii() {
        // ASCII: Bytelänge == Zeichenzahl
        unsigned_integer::encode(writer, value.len() as u64 + offset)?;
    } else {
        unsigned_integer::encode(writer, value.chars().count() as u64 + offset)?;
    }
    encode_chars(writer, value, rcs)
}

/// Writes the characters of `value` without a length prefix.
pub fn encode_chars(writer: &mut BitWriter<'_>, value: &str, rcs: Option<&RestrictedCharSet>) -> Result<()> {
    match rcs {
        Some(rcs) => rcs.encode_chars(writer, value),
        None if value.is_ascii() => {
            // Jeder ASCII Code Point ist genau ein Octet ohne Fortsetzungsbit
            writer.write_bytes(value.as_bytes())
        }
        None => {
            for ch in value.chars() {
                unsigned_integer::encode(writer, u64::from(ch))?;
            }
            Ok(())
        }
    }
}

/// Decodes a length-prefixed string without a restricted character set.
pub fn decode(reader: &mut BitReader<'_>) -> Result<String> {
    let len = unsigned_integer::decode(reader)?;
    let mut out = String::new();
    decode_chars_into(reader, len, None, &mut out)?;
    Ok(out)
}

/// Reads `len` characters and appends them to `out`.
///
/// Surrogates and code points above U+10FFFF yield [`Error::InvalidCodePoint`].
pub fn decode_chars_into(
    reader: &mut BitReader<'_>,
    len: u64,
    rcs: Option<&RestrictedCharSet>,
    out: &mut String,
) -> Result<()> {
    out.reserve(usize::try_from(len).unwrap_or(0).min(MAX_PREALLOC_CHARS));
    if let Some(rcs) = rcs {
        return rcs.decode_chars_into(reader, len, out);
    }
    for _ in 0..len {
        let cp = unsigned_integer::decode(reader)?;
        let ch = u32::try_from(cp)
            .ok()
            .and_then(char::from_u32)
            .ok_or(Error::InvalidCodePoint(cp))?;
        out.push(ch);
    }
    Ok(())
}
