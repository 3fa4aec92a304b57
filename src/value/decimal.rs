//! Decimal (EXI 7.1.3).
//!
//! Vorzeichen als Boolean, ganzzahliger Teil als Unsigned Integer, danach
//! die Nachkommastellen in umgekehrter Reihenfolge als Unsigned Integer.
//! Führende Nullen vorne und Nullen am Ende der Nachkommastellen fallen weg;
//! "-0" wird als positive Null geschrieben.

use num_bigint::BigUint;
use num_traits::Zero;

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{Scribble, StagedValue};
use crate::{Result, unsigned_integer};

pub(super) struct DecimalCodec;

/// Splits `[+-]?d*(.d*)?` into sign, integral digits and fraction digits.
pub(super) fn split_decimal(lexical: &str) -> Option<(bool, &str, &str)> {
    let (negative, rest) = match lexical.as_bytes().first()? {
        b'-' => (true, &lexical[1..]),
        b'+' => (false, &lexical[1..]),
        _ => (false, lexical),
    };
    let (integral, fraction) = rest.split_once('.').unwrap_or((rest, ""));
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (integral.is_empty() && fraction.is_empty()) || !digits(integral) || !digits(fraction) {
        return None;
    }
    Some((negative, integral, fraction))
}

fn parse_digits(digits: &str) -> BigUint {
    if digits.is_empty() {
        return BigUint::zero();
    }
    BigUint::parse_bytes(digits.as_bytes(), 10).unwrap_or_default()
}

impl ValueCodec for DecimalCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Decimal
    }

    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        Some(&rcs::DECIMAL)
    }

    fn stage(&self, lexical: &str, _ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        let Some((negative, integral, fraction)) = split_decimal(lexical) else {
            return false;
        };
        let reversed: String = fraction.trim_end_matches('0').chars().rev().collect();
        let integral = parse_digits(integral);
        let fraction = parse_digits(&reversed);
        let negative = negative && !(integral.is_zero() && fraction.is_zero());
        scribble.value = StagedValue::Decimal { negative, integral, fraction };
        true
    }

    fn write(&self, scribble: &Scribble, _ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::Decimal { negative, integral, fraction } = &scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        out.writer.write_boolean(*negative)?;
        unsigned_integer::encode_big(out.writer, integral)?;
        unsigned_integer::encode_big(out.writer, fraction)
    }

    fn read(&self, _ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let negative = input.reader.read_boolean()?;
        let integral = unsigned_integer::decode_big(input.reader)?;
        let fraction = unsigned_integer::decode_big(input.reader)?;

        let start = input.arena.len();
        if negative {
            input.arena.push('-');
        }
        input.arena.push_str(&integral.to_string());
        if !fraction.is_zero() {
            input.arena.push('.');
            input.arena.extend(fraction.to_string().chars().rev());
        }
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
