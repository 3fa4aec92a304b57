//! Enumeration (EXI 7.2).
//!
//! Index des Werts in der Enumeration des Typs, `ceil(log2(n))` Bits. Der
//! Vergleich läuft über die gestagten Werte der Familie, nicht über den Text:
//! bei `xs:float` mit {"1.0", "2"} trifft "1" den Index 0.

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::grammar::Variety;
use crate::scribble::{Scribble, StagedValue};
use crate::{Error, Result, bit_width};

pub(super) struct EnumerationCodec;

fn base_codec(ty: TypeRef<'_>) -> &'static dyn ValueCodec {
    match ty.info {
        Some(info) if matches!(info.variety, Variety::List(_)) => &super::LIST,
        Some(info) => super::family_codec(info.family),
        None => &super::STRING,
    }
}

/// Typed equality of two staged values.
fn same_value(a: &Scribble, b: &Scribble) -> bool {
    match (&a.value, &b.value) {
        (StagedValue::Text, StagedValue::Text) => a.text == b.text,
        (StagedValue::Binary, StagedValue::Binary) => a.octets == b.octets,
        (StagedValue::List, StagedValue::List) => {
            a.items.len() == b.items.len() && a.items.iter().zip(&b.items).all(|(x, y)| same_value(x, y))
        }
        (StagedValue::Boolean { value: x, .. }, StagedValue::Boolean { value: y, .. }) => x == y,
        (x, y) => x == y,
    }
}

impl ValueCodec for EnumerationCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Enumeration
    }

    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        let Some(info) = ty.info else {
            return false;
        };
        let codec = base_codec(ty);
        let mut value = Scribble::new();
        if !super::stage(codec, lexical, ty, &mut value) {
            return false;
        }
        let mut candidate = Scribble::new();
        let index = info.enumeration.iter().position(|entry| {
            super::stage(codec, entry, ty, &mut candidate) && same_value(&value, &candidate)
        });
        match index {
            Some(index) => {
                scribble.value = StagedValue::Enumeration(index);
                true
            }
            None => false,
        }
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::Enumeration(index) = scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        let count = ty.info.map_or(0, |t| t.enumeration.len());
        out.writer.write_nbit(index as u64, bit_width::for_count(count))
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let values = ty.info.map_or(&[][..], |t| &t.enumeration[..]);
        let index = input.reader.read_nbit(bit_width::for_count(values.len()))? as usize;
        let value = values
            .get(index)
            .ok_or(Error::InvalidEnumerationIndex { index, enum_count: values.len() })?;
        let start = input.arena.len();
        input.arena.push_str(value);
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
