//! String values through the value partitions (EXI 7.1.10, 7.3.3).
//!
//! Kopf als Unsigned Integer: `0` = lokaler Treffer, `1` = globaler Treffer,
//! sonst Länge + 2 und die Zeichen. Ein Literal wird danach in beide
//! Partitionen übernommen.

use std::rc::Rc;

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::rcs::RestrictedCharSet;
use crate::scribble::{Scribble, StagedValue};
use crate::string_table::ValueHit;
use crate::{Error, Result, bit_width, string, unsigned_integer};

/// Obergrenze für Wert-Literale beim Decodieren.
const MAX_LITERAL_LENGTH: u64 = 1 << 28;

pub(super) struct StringCodec;

impl ValueCodec for StringCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::String
    }

    fn stage(&self, lexical: &str, _ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        scribble.text.push_str(lexical);
        scribble.value = StagedValue::Text;
        true
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        write_value_string(out, &scribble.text, ty.rcs())
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        read_value_string(input, ty.rcs())
    }
}

/// Writes `value` as a value-partition hit or as a literal.
pub(crate) fn write_value_string(
    out: &mut EncodeContext<'_, '_>,
    value: &str,
    rcs: Option<&RestrictedCharSet>,
) -> Result<()> {
    match out.table.lookup_value(out.key, value) {
        ValueHit::Local(id) => {
            unsigned_integer::encode(out.writer, 0)?;
            let width = bit_width::for_count(out.table.local_value_size(out.key));
            out.writer.write_nbit(id as u64, width)
        }
        ValueHit::Global(id) => {
            unsigned_integer::encode(out.writer, 1)?;
            let width = bit_width::for_count(out.table.global_value_size());
            out.writer.write_nbit(id as u64, width)
        }
        ValueHit::Miss => {
            string::encode_with_offset(out.writer, value, 2, rcs)?;
            out.table.intern_value(out.key, value);
            Ok(())
        }
    }
}

/// Reads a value string. Interned literals come back as
/// [`TextRef::Shared`], all others in the arena.
pub(crate) fn read_value_string(
    input: &mut DecodeContext<'_, '_>,
    rcs: Option<&RestrictedCharSet>,
) -> Result<TextRef> {
    let head = unsigned_integer::decode(input.reader)?;
    match head {
        0 => {
            let width = bit_width::for_count(input.table.local_value_size(input.key));
            let id = input.reader.read_nbit(width)? as usize;
            let rc = input.table.local_value(input.key, id).ok_or(Error::InvalidCompactId(id))?;
            Ok(TextRef::Shared(Rc::clone(rc)))
        }
        1 => {
            let width = bit_width::for_count(input.table.global_value_size());
            let id = input.reader.read_nbit(width)? as usize;
            let rc = input.table.global_value(id).ok_or(Error::InvalidCompactId(id))?;
            Ok(TextRef::Shared(Rc::clone(rc)))
        }
        n => {
            let length = n - 2;
            if length > MAX_LITERAL_LENGTH {
                return Err(Error::StringLengthExceeded { length, max: MAX_LITERAL_LENGTH });
            }
            let start = input.arena.len();
            string::decode_chars_into(input.reader, length, rcs, input.arena)?;
            input.table.intern_value(input.key, &input.arena[start..]);
            match input.table.lookup_value(input.key, &input.arena[start..]) {
                ValueHit::Local(id) => {
                    if let Some(rc) = input.table.local_value(input.key, id) {
                        let rc = Rc::clone(rc);
                        input.arena.truncate(start);
                        return Ok(TextRef::Shared(rc));
                    }
                    Ok(TextRef::Arena(start..input.arena.len()))
                }
                _ => Ok(TextRef::Arena(start..input.arena.len())),
            }
        }
    }
}
