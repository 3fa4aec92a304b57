//! Preserve.lexicalValues (EXI 7.1.10, Table 7-2).
//!
//! Jeder Wert wird als String über die Wert-Partitionen geschrieben, mit dem
//! Restricted Character Set der Familie des Typs.

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::grammar::{Family, Variety};
use crate::rcs::RestrictedCharSet;
use crate::scribble::{Scribble, StagedValue};
use crate::Result;

pub(super) struct LexicalCodec;

/// RCS a preserved value of `ty` is written with.
fn rcs<'g>(ty: TypeRef<'g>) -> Option<&'g RestrictedCharSet> {
    let info = ty.info?;
    match (info.variety, info.family) {
        (Variety::List(_), _) => None,
        (_, Family::String) => info.rcs.as_ref(),
        (_, family) => super::family_codec(family).builtin_rcs(ty),
    }
}

impl ValueCodec for LexicalCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Lexical
    }

    fn builtin_rcs(&self, ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        let family = ty.info?.family;
        super::family_codec(family).builtin_rcs(ty)
    }

    fn stage(&self, lexical: &str, _ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        scribble.text.push_str(lexical);
        scribble.value = StagedValue::Text;
        true
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        super::write_value_string(out, &scribble.text, rcs(ty))
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        super::read_value_string(input, rcs(ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BitReader, BitWriter};
    use crate::grammar::{CompiledGrammar, GrammarTable};
    use crate::rcs;
    use crate::string_table::{StringTable, URI_XSD};

    fn round_trip(kind: &str, lexical: &str) -> (String, u64) {
        let g = GrammarTable::builder().build();
        let ty = TypeRef::typed(&g, g.named_type(URI_XSD, kind).unwrap());
        let mut scribble = Scribble::new();
        assert!(super::super::stage(&LexicalCodec, lexical, ty, &mut scribble));
        let mut data = Vec::new();
        let mut table = StringTable::default();
        let bits;
        {
            let mut writer = BitWriter::new(&mut data);
            LexicalCodec
                .write(&scribble, ty, &mut EncodeContext { writer: &mut writer, table: &mut table, key: (0, 0) })
                .unwrap();
            bits = writer.bit_position();
            writer.finish().unwrap();
        }
        let mut table = StringTable::default();
        let mut reader = BitReader::new(&data[..]);
        let (mut arena, mut octets) = (String::new(), Vec::new());
        let mut input =
            DecodeContext { reader: &mut reader, table: &mut table, key: (0, 0), arena: &mut arena, octets: &mut octets };
        let text = LexicalCodec.read(ty, &mut input).unwrap();
        (text.view(&arena, &octets).text().into_owned(), bits)
    }

    /// Die Originalform bleibt erhalten, jedes Zeichen kostet die RCS-Breite.
    #[test]
    fn form_bleibt_erhalten() {
        let (text, bits) = round_trip("int", " +007 ");
        assert_eq!(text, " +007 ");
        let width = u64::from(rcs::INTEGER.width());
        assert_eq!(bits, 8 + 6 * width);
    }

    #[test]
    fn zeichen_ausserhalb_des_rcs() {
        let (text, _) = round_trip("boolean", "yes");
        assert_eq!(text, "yes");
    }

    #[test]
    fn listen_ohne_rcs() {
        let g = GrammarTable::builder().build();
        let ty = TypeRef::typed(&g, g.named_type(URI_XSD, "NMTOKENS").unwrap());
        assert!(rcs(ty).is_none());
    }
}
