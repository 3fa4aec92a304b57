//! Integer family (EXI 7.1.5).
//!
//! Darstellung aus [`IntegerRepr`]: n-bit Offset zum Minimum, Unsigned
//! Integer für nicht-negative Typen, sonst Vorzeichen und Betrag. Beliebige
//! Genauigkeit über `BigInt`.

use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::grammar::IntegerRepr;
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{Scribble, StagedValue};
use crate::{Error, Result, integer, unsigned_integer};

pub(super) struct IntegerCodec;

fn repr(ty: TypeRef<'_>) -> IntegerRepr {
    ty.info.and_then(|t| t.integer).unwrap_or(IntegerRepr::Signed)
}

/// Parses `[+-]?[0-9]+`.
pub(super) fn parse_integer(lexical: &str) -> Option<BigInt> {
    let (negative, digits) = match lexical.as_bytes().first()? {
        b'-' => (true, &lexical[1..]),
        b'+' => (false, &lexical[1..]),
        _ => (false, lexical),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10)?;
    Some(if negative { -magnitude } else { magnitude })
}

impl ValueCodec for IntegerCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Integer
    }

    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        Some(&rcs::INTEGER)
    }

    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        let Some(value) = parse_integer(lexical) else {
            return false;
        };
        let fits = match repr(ty) {
            IntegerRepr::NBit { min, max } => value >= BigInt::from(min) && value <= BigInt::from(max),
            IntegerRepr::Unsigned => value.sign() != Sign::Minus,
            IntegerRepr::Signed => true,
        };
        if fits {
            scribble.value = StagedValue::Integer(value);
        }
        fits
    }

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::Integer(value) = &scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        let repr = repr(ty);
        match repr {
            IntegerRepr::NBit { min, .. } => {
                let offset = (value - BigInt::from(min)).to_u64().ok_or(Error::IntegerOverflow)?;
                integer::encode_bounded(out.writer, offset, repr.bits())
            }
            IntegerRepr::Unsigned => {
                let magnitude = value.to_biguint().ok_or(Error::IntegerOverflow)?;
                match magnitude.to_u64() {
                    Some(small) => unsigned_integer::encode(out.writer, small),
                    None => unsigned_integer::encode_big(out.writer, &magnitude),
                }
            }
            IntegerRepr::Signed => match value.to_i64() {
                Some(small) => integer::encode(out.writer, small),
                None => integer::encode_big(out.writer, value),
            },
        }
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let repr = repr(ty);
        let value = match repr {
            IntegerRepr::NBit { min, max } => {
                let range = max.abs_diff(min) + 1;
                let offset = integer::decode_bounded(input.reader, repr.bits(), range)?;
                BigInt::from(min) + BigInt::from(offset)
            }
            IntegerRepr::Unsigned => BigInt::from(unsigned_integer::decode_big(input.reader)?),
            IntegerRepr::Signed => integer::decode_big(input.reader)?,
        };
        let start = input.arena.len();
        input.arena.push_str(&value.to_string());
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
