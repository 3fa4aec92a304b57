//! Boolean (EXI 7.1.2).
//!
//! Ohne Pattern-Facet ein Bit. Mit Pattern zwei Bits, damit die
//! lexikalische Form erhalten bleibt: 0 "false", 1 "0", 2 "true", 3 "1".

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{Scribble, StagedValue};
use crate::Result;

const PATTERN_FORMS: [&str; 4] = ["false", "0", "true", "1"];

pub(super) struct BooleanCodec;

fn has_pattern(ty: TypeRef<'_>) -> bool {
    ty.info.is_some_and(|t| t.has_pattern)
}

impl ValueCodec for BooleanCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Boolean
    }

    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        Some(&rcs::BOOLEAN)
    }

    fn stage(&self, lexical: &str, _ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        let Some(index) = PATTERN_FORMS.iter().position(|&f| f == lexical) else {
            return false;
        };
        scribble.value = StagedValue::Boolean { value: index >= 2, pattern_index: index as u8 };
        true
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::Boolean { value, pattern_index } = scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        if has_pattern(ty) {
            out.writer.write_nbit(u64::from(pattern_index), 2)
        } else {
            out.writer.write_boolean(value)
        }
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let text = if has_pattern(ty) {
            let index = input.reader.read_nbit(2)? as usize;
            PATTERN_FORMS[index & 3]
        } else if input.reader.read_boolean()? {
            "true"
        } else {
            "false"
        };
        let start = input.arena.len();
        input.arena.push_str(text);
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BitReader, BitWriter};
    use crate::grammar::{CompiledGrammar, GrammarTable, SimpleTypeDef};
    use crate::string_table::StringTable;

    fn round_trip(ty: TypeRef<'_>, lexical: &str) -> (String, u64) {
        let mut scribble = Scribble::new();
        assert!(super::super::stage(&BooleanCodec, lexical, ty, &mut scribble));
        let mut data = Vec::new();
        let mut table = StringTable::default();
        let bits;
        {
            let mut writer = BitWriter::new(&mut data);
            BooleanCodec
                .write(&scribble, ty, &mut EncodeContext { writer: &mut writer, table: &mut table, key: (0, 0) })
                .unwrap();
            bits = writer.bit_position();
            writer.finish().unwrap();
        }
        let mut reader = BitReader::new(&data[..]);
        let (mut arena, mut octets) = (String::new(), Vec::new());
        let mut input =
            DecodeContext { reader: &mut reader, table: &mut table, key: (0, 0), arena: &mut arena, octets: &mut octets };
        let text = BooleanCodec.read(ty, &mut input).unwrap();
        (text.view(&arena, &octets).text().into_owned(), bits)
    }

    #[test]
    fn ein_bit_ohne_pattern() {
        let table = GrammarTable::builder().build();
        let ty = TypeRef::typed(&table, table.named_type(crate::string_table::URI_XSD, "boolean").unwrap());
        assert_eq!(round_trip(ty, "1"), ("true".to_owned(), 1));
        assert_eq!(round_trip(ty, " false "), ("false".to_owned(), 1));
    }

    #[test]
    fn zwei_bits_mit_pattern() {
        let mut b = GrammarTable::builder();
        let boolean = b.builtin("boolean").unwrap();
        let id = b.simple_type(SimpleTypeDef::restriction(boolean).pattern(Some(vec!['0', '1'])));
        let table = b.build();
        let ty = TypeRef::typed(&table, id);
        assert_eq!(round_trip(ty, "0"), ("0".to_owned(), 2));
        assert_eq!(round_trip(ty, "true"), ("true".to_owned(), 2));
    }

    #[test]
    fn ungueltig() {
        let table = GrammarTable::schemaless();
        let mut scribble = Scribble::new();
        assert!(!BooleanCodec.stage("yes", TypeRef::untyped(&table), &mut scribble));
    }
}
