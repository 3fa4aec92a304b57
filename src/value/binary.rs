//! Binary (EXI 7.1.1).
//!
//! Länge als Unsigned Integer, danach die Octets. base64Binary und hexBinary
//! unterscheiden sich nur in der lexikalischen Form.

use std::ops::Range;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::bitstream::{BitReader, BitWriter};
use crate::characters::TextRef;
use crate::grammar::BinaryFormat;
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{Scribble, StagedValue};
use crate::{Error, Result, unsigned_integer};

/// Obergrenze für die Länge eines Binärwerts beim Decodieren.
pub(crate) const MAX_BINARY_LENGTH: u64 = 1 << 30;

pub(super) struct BinaryCodec;

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    text.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let digit = |b: u8| (b as char).to_digit(16);
            Some((digit(pair[0])? * 16 + digit(pair[1])?) as u8)
        })
        .collect()
}

/// Parses the lexical form of `format` into `out`.
pub(crate) fn parse_binary(text: &str, format: BinaryFormat, out: &mut Vec<u8>) -> bool {
    match format {
        BinaryFormat::Base64 => {
            let compact: String = text.chars().filter(|&c| !super::is_xml_space(c)).collect();
            STANDARD.decode_vec(compact.as_bytes(), out).is_ok()
        }
        BinaryFormat::Hex => match decode_hex(text) {
            Some(bytes) => {
                out.extend_from_slice(&bytes);
                true
            }
            None => false,
        },
    }
}

/// Writes a length-prefixed octet sequence.
pub(crate) fn write_octets(writer: &mut BitWriter<'_>, octets: &[u8]) -> Result<()> {
    unsigned_integer::encode(writer, octets.len() as u64)?;
    writer.write_bytes(octets)
}

/// Reads the length prefix of a binary value.
pub(crate) fn read_length(reader: &mut BitReader<'_>) -> Result<u64> {
    let length = unsigned_integer::decode(reader)?;
    if length > MAX_BINARY_LENGTH {
        return Err(Error::StringLengthExceeded { length, max: MAX_BINARY_LENGTH });
    }
    Ok(length)
}

/// Reads a length-prefixed octet sequence and appends it to `octets`.
pub(crate) fn read_octets(reader: &mut BitReader<'_>, octets: &mut Vec<u8>) -> Result<Range<usize>> {
    let length = read_length(reader)? as usize;
    let start = octets.len();
    octets.resize(start + length, 0);
    reader.read_bytes(&mut octets[start..])?;
    Ok(start..octets.len())
}

impl ValueCodec for BinaryCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Binary
    }

    fn builtin_rcs(&self, ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        match super::binary_format(ty.info) {
            BinaryFormat::Base64 => Some(&rcs::BASE64_BINARY),
            BinaryFormat::Hex => Some(&rcs::HEX_BINARY),
        }
    }

    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        if !parse_binary(lexical, super::binary_format(ty.info), &mut scribble.octets) {
            scribble.octets.clear();
            return false;
        }
        scribble.value = StagedValue::Binary;
        true
    }

    fn write(&self, scribble: &Scribble, _ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        if scribble.value != StagedValue::Binary {
            return Err(super::not_staged(self.codec_id()));
        }
        write_octets(out.writer, &scribble.octets)
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let range = read_octets(input.reader, input.octets)?;
        Ok(TextRef::Octets(range, super::binary_format(ty.info)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CompiledGrammar, GrammarTable};
    use crate::string_table::{StringTable, URI_XSD};

    fn round_trip(kind: &str, lexical: &str) -> Option<(String, Vec<u8>)> {
        let grammar = GrammarTable::builder().build();
        let ty = TypeRef::typed(&grammar, grammar.named_type(URI_XSD, kind).unwrap());
        let mut scribble = Scribble::new();
        if !super::super::stage(&BinaryCodec, lexical, ty, &mut scribble) {
            return None;
        }
        let mut data = Vec::new();
        let mut table = StringTable::default();
        {
            let mut writer = BitWriter::new(&mut data);
            BinaryCodec
                .write(&scribble, ty, &mut EncodeContext { writer: &mut writer, table: &mut table, key: (0, 0) })
                .unwrap();
            writer.finish().unwrap();
        }
        let mut reader = BitReader::new(&data[..]);
        let (mut arena, mut octets) = (String::new(), Vec::new());
        let mut input =
            DecodeContext { reader: &mut reader, table: &mut table, key: (0, 0), arena: &mut arena, octets: &mut octets };
        let text = BinaryCodec.read(ty, &mut input).unwrap();
        let text = text.view(&arena, &octets).text().into_owned();
        drop(reader);
        Some((text, data))
    }

    #[test]
    fn hex_grossbuchstaben() {
        let (text, data) = round_trip("hexBinary", "deadBEEF").unwrap();
        assert_eq!(text, "DEADBEEF");
        assert_eq!(data, [0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(round_trip("hexBinary", "ABC").is_none());
        assert!(round_trip("hexBinary", "GG").is_none());
    }

    #[test]
    fn base64_mit_zeilenumbruch() {
        let (text, data) = round_trip("base64Binary", "SGVs\nbG8=").unwrap();
        assert_eq!(text, "SGVsbG8=");
        assert_eq!(&data[1..], b"Hello");
        assert!(round_trip("base64Binary", "S=GV").is_none());
    }

    #[test]
    fn leer() {
        let (text, data) = round_trip("base64Binary", "").unwrap();
        assert_eq!((text.as_str(), data.as_slice()), ("", &[0x00][..]));
    }

    #[test]
    fn laenge_ueber_grenze() {
        let mut data = Vec::new();
        {
            let mut w = BitWriter::new(&mut data);
            unsigned_integer::encode(&mut w, MAX_BINARY_LENGTH + 1).unwrap();
            w.finish().unwrap();
        }
        let mut octets = Vec::new();
        let err = read_octets(&mut BitReader::new(&data[..]), &mut octets).unwrap_err();
        assert!(matches!(err, Error::StringLengthExceeded { .. }));
    }

    #[test]
    fn abgeschnittene_octets() {
        let mut octets = Vec::new();
        let err = read_octets(&mut BitReader::new(&[0x05, 0xAA][..]), &mut octets).unwrap_err();
        assert_eq!(err, Error::PrematureEndOfStream);
    }
}
