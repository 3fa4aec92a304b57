//! Float and double (EXI 7.1.4).
//!
//! Zwei Integer: Mantisse (i64) und Exponent zur Basis 10 im Bereich
//! -(2^14-1)..=2^14-1. Der Exponent -(2^14) markiert Sonderwerte:
//! Mantisse 1 = INF, -1 = -INF, sonst NaN.
//!
//! Die lexikalische Form wird direkt als Dezimalzahl zerlegt, ohne Umweg
//! über `f64`; zu lange Mantissen werden auf 18 Stellen gekürzt.

use super::decimal::split_decimal;
use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::characters::TextRef;
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{Scribble, StagedValue};
use crate::{Error, Result, integer};

const EXPONENT_MAX: i64 = (1 << 14) - 1;
/// INF, -INF, NaN
const SPECIAL_EXPONENT: i64 = -(1 << 14);
/// Stellen, die sicher in ein i64 passen.
const MAX_MANTISSA_DIGITS: usize = 18;

pub(super) struct FloatCodec;

/// `(mantissa, exponent)` of a float lexical form.
fn parse_float(lexical: &str) -> Option<(i64, i64)> {
    match lexical {
        "INF" | "+INF" => return Some((1, SPECIAL_EXPONENT)),
        "-INF" => return Some((-1, SPECIAL_EXPONENT)),
        "NaN" => return Some((0, SPECIAL_EXPONENT)),
        _ => {}
    }
    let (number, exponent) = match lexical.find(['e', 'E']) {
        Some(pos) => {
            let exp = &lexical[pos + 1..];
            let exp = exp.strip_prefix('+').unwrap_or(exp);
            if exp.is_empty() || exp.starts_with('+') {
                return None;
            }
            (&lexical[..pos], exp.parse::<i64>().ok()?)
        }
        None => (lexical, 0),
    };
    let (negative, integral, fraction) = split_decimal(number)?;

    let mut digits: String = integral.chars().chain(fraction.chars()).collect();
    let mut exponent = exponent.checked_sub(i64::try_from(fraction.len()).ok()?)?;
    let significant = digits.trim_start_matches('0').len();
    digits.drain(..digits.len() - significant);
    if digits.is_empty() {
        return Some((0, 0));
    }
    while digits.ends_with('0') {
        digits.pop();
        exponent = exponent.checked_add(1)?;
    }
    if digits.len() > MAX_MANTISSA_DIGITS {
        let dropped = digits.len() - MAX_MANTISSA_DIGITS;
        digits.truncate(MAX_MANTISSA_DIGITS);
        exponent = exponent.checked_add(i64::try_from(dropped).ok()?)?;
    }
    if !(-EXPONENT_MAX..=EXPONENT_MAX).contains(&exponent) {
        return None;
    }
    let mantissa: i64 = digits.parse().ok()?;
    Some((if negative { -mantissa } else { mantissa }, exponent))
}

impl ValueCodec for FloatCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::Float
    }

    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        Some(&rcs::DOUBLE)
    }

    fn stage(&self, lexical: &str, _ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        match parse_float(lexical) {
            Some((mantissa, exponent)) => {
                scribble.value = StagedValue::Float { mantissa, exponent };
                true
            }
            None => false,
        }
    }

    fn write(&self, scribble: &Scribble, _ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::Float { mantissa, exponent } = scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        integer::encode(out.writer, mantissa)?;
        integer::encode(out.writer, exponent)
    }

    fn read(&self, _ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let mantissa = integer::decode(input.reader)?;
        let exponent = integer::decode(input.reader)?;
        let start = input.arena.len();
        if exponent == SPECIAL_EXPONENT {
            input.arena.push_str(match mantissa {
                1 => "INF",
                -1 => "-INF",
                _ => "NaN",
            });
        } else if !(-EXPONENT_MAX..=EXPONENT_MAX).contains(&exponent) {
            return Err(Error::IntegerOverflow);
        } else if exponent == 0 {
            input.arena.push_str(&mantissa.to_string());
        } else {
            input.arena.push_str(&format!("{mantissa}E{exponent}"));
        }
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
