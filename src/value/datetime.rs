//! Date-time family (EXI 7.1.8).
//!
//! Jeder der acht Typen schreibt eine Teilmenge der Komponenten in fester
//! Reihenfolge (EXI Table 7-3, 7-4):
//!
//! | Komponente     | Darstellung                                   |
//! |----------------|-----------------------------------------------|
//! | Year           | Integer, Offset zu 2000                       |
//! | MonthDay       | `month * 32 + day`, 9 Bits                    |
//! | Time           | `(hour * 64 + minute) * 64 + second`, 17 Bits |
//! | FractionalSecs | Boolean + Unsigned Integer, Ziffern umgekehrt |
//! | TimeZone       | Boolean + `hours * 64 + minutes + 896`, 11 Bits |

use std::fmt::Write as _;

use num_bigint::BigUint;
use num_traits::Zero;

use super::{CodecId, DecodeContext, EncodeContext, TypeRef, ValueCodec};
use crate::bitstream::{BitReader, BitWriter};
use crate::characters::TextRef;
use crate::grammar::{DateTimeKind, Family};
use crate::rcs::{self, RestrictedCharSet};
use crate::scribble::{DateTimeValue, Scribble, StagedValue};
use crate::{Error, Result, integer, unsigned_integer};

const YEAR_OFFSET: i64 = 2000;
const MONTH_DAY_BITS: u8 = 9;
const TIME_BITS: u8 = 17;
const TIMEZONE_BITS: u8 = 11;
/// 14 * 64
const TIMEZONE_BIAS: i32 = 896;

pub(super) struct DateTimeCodec;

fn kind(ty: TypeRef<'_>) -> DateTimeKind {
    match ty.info.map(|t| t.family) {
        Some(Family::DateTime(kind)) => kind,
        _ => DateTimeKind::DateTime,
    }
}

fn has_year(kind: DateTimeKind) -> bool {
    use DateTimeKind::*;
    matches!(kind, GYear | GYearMonth | Date | DateTime)
}

fn has_month_day(kind: DateTimeKind) -> bool {
    use DateTimeKind::*;
    matches!(kind, GYearMonth | Date | DateTime | GMonth | GMonthDay | GDay)
}

fn has_time(kind: DateTimeKind) -> bool {
    matches!(kind, DateTimeKind::DateTime | DateTimeKind::Time)
}

// ============================================================================
// Parsen
// ============================================================================

fn two_digits(s: &str) -> Option<u8> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) { s.parse().ok() } else { None }
}

/// `-?YYYY+`, returned as offset from 2000.
fn parse_year(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // mehr als vier Stellen nur ohne führende Null (XSD Part 2, 3.2.7)
    if digits.len() > 4 && digits.starts_with('0') {
        return None;
    }
    let year: i64 = digits.parse().ok()?;
    let year = if s.starts_with('-') { -year } else { year };
    year.checked_sub(YEAR_OFFSET)
}

/// Trennt `Z` oder `±hh:mm` vom Ende ab.
fn split_timezone(s: &str) -> Option<(&str, Option<i16>)> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Some((rest, Some(0)));
    }
    let bytes = s.as_bytes();
    if bytes.len() >= 6 && matches!(bytes[bytes.len() - 6], b'+' | b'-') && bytes[bytes.len() - 3] == b':' {
        let (rest, tz) = s.split_at(s.len() - 6);
        let hours = i16::from(two_digits(&tz[1..3])?);
        let minutes = i16::from(two_digits(&tz[4..6])?);
        if minutes > 59 || hours > 14 || (hours == 14 && minutes != 0) {
            return None;
        }
        let offset = hours * 60 + minutes;
        return Some((rest, Some(if tz.starts_with('-') { -offset } else { offset })));
    }
    Some((s, None))
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: Option<i64>, month: u8) -> u8 {
    match month {
        2 if year.is_none_or(is_leap) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// `YYYY-MM-DD` into (year offset, month, day).
fn parse_date(s: &str) -> Option<(i64, u8, u8)> {
    let mut parts = s.rsplitn(3, '-');
    let day = two_digits(parts.next()?)?;
    let month = two_digits(parts.next()?)?;
    let year = parse_year(parts.next()?)?;
    Some((year, month, day))
}

/// `hh:mm:ss(.s+)?`
fn parse_time(s: &str, value: &mut DateTimeValue) -> Option<()> {
    let mut parts = s.splitn(3, ':');
    value.hour = two_digits(parts.next()?)?;
    value.minute = two_digits(parts.next()?)?;
    let seconds = parts.next()?;
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };
    value.second = two_digits(whole)?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let reversed: String = fraction.trim_end_matches('0').chars().rev().collect();
        if !reversed.is_empty() {
            value.fraction = Some(BigUint::parse_bytes(reversed.as_bytes(), 10)?);
        }
    }
    let valid = value.minute <= 59
        && value.second <= 60
        && (value.hour < 24 || (value.hour == 24 && value.minute == 0 && value.second == 0 && value.fraction.is_none()));
    valid.then_some(())
}

/// Parses the lexical form of a date-time type.
pub(crate) fn parse(kind: DateTimeKind, lexical: &str) -> Option<DateTimeValue> {
    let (body, timezone) = split_timezone(lexical)?;
    let mut value = DateTimeValue {
        kind,
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
        fraction: None,
        timezone,
    };
    match kind {
        DateTimeKind::DateTime => {
            let (date, time) = body.split_once('T')?;
            (value.year, value.month, value.day) = parse_date(date)?;
            parse_time(time, &mut value)?;
        }
        DateTimeKind::Date => (value.year, value.month, value.day) = parse_date(body)?,
        DateTimeKind::Time => parse_time(body, &mut value)?,
        DateTimeKind::GYear => value.year = parse_year(body)?,
        DateTimeKind::GYearMonth => {
            let (year, month) = body.rsplit_once('-')?;
            value.year = parse_year(year)?;
            value.month = two_digits(month)?;
        }
        DateTimeKind::GMonth => value.month = two_digits(body.strip_prefix("--")?)?,
        DateTimeKind::GMonthDay => {
            let (month, day) = body.strip_prefix("--")?.split_once('-')?;
            value.month = two_digits(month)?;
            value.day = two_digits(day)?;
        }
        DateTimeKind::GDay => value.day = two_digits(body.strip_prefix("---")?)?,
    }

    let uses_month = !matches!(kind, DateTimeKind::GYear | DateTimeKind::Time | DateTimeKind::GDay);
    let uses_day = matches!(kind, DateTimeKind::Date | DateTimeKind::DateTime | DateTimeKind::GMonthDay | DateTimeKind::GDay);
    if uses_month && !(1..=12).contains(&value.month) {
        return None;
    }
    if uses_day {
        let year = has_year(kind).then_some(value.year + YEAR_OFFSET);
        let max = if uses_month { days_in_month(year, value.month) } else { 31 };
        if !(1..=max).contains(&value.day) {
            return None;
        }
    }
    Some(value)
}

// ============================================================================
// Formatieren
// ============================================================================

fn push_year(out: &mut String, offset: i64) {
    let year = i128::from(offset) + i128::from(YEAR_OFFSET);
    if year < 0 {
        let _ = write!(out, "-{:04}", -year);
    } else {
        let _ = write!(out, "{year:04}");
    }
}

fn push_time(out: &mut String, value: &DateTimeValue) {
    let _ = write!(out, "{:02}:{:02}:{:02}", value.hour, value.minute, value.second);
    if let Some(fraction) = &value.fraction {
        out.push('.');
        out.extend(fraction.to_string().chars().rev());
    }
}

/// Canonical lexical form of `value`; a zero offset is written as `Z`.
pub(crate) fn format(value: &DateTimeValue, out: &mut String) {
    match value.kind {
        DateTimeKind::DateTime => {
            push_year(out, value.year);
            let _ = write!(out, "-{:02}-{:02}T", value.month, value.day);
            push_time(out, value);
        }
        DateTimeKind::Date => {
            push_year(out, value.year);
            let _ = write!(out, "-{:02}-{:02}", value.month, value.day);
        }
        DateTimeKind::Time => push_time(out, value),
        DateTimeKind::GYear => push_year(out, value.year),
        DateTimeKind::GYearMonth => {
            push_year(out, value.year);
            let _ = write!(out, "-{:02}", value.month);
        }
        DateTimeKind::GMonth => {
            let _ = write!(out, "--{:02}", value.month);
        }
        DateTimeKind::GMonthDay => {
            let _ = write!(out, "--{:02}-{:02}", value.month, value.day);
        }
        DateTimeKind::GDay => {
            let _ = write!(out, "---{:02}", value.day);
        }
    }
    match value.timezone {
        Some(0) => out.push('Z'),
        Some(offset) => {
            let sign = if offset < 0 { '-' } else { '+' };
            let _ = write!(out, "{sign}{:02}:{:02}", offset.abs() / 60, offset.abs() % 60);
        }
        None => {}
    }
}

// ============================================================================
// Wire-Format
// ============================================================================

pub(crate) fn write_month_day(writer: &mut BitWriter<'_>, month: u8, day: u8) -> Result<()> {
    writer.write_nbit(u64::from(month) * 32 + u64::from(day), MONTH_DAY_BITS)
}

pub(crate) fn read_month_day(reader: &mut BitReader<'_>) -> Result<(u8, u8)> {
    let raw = reader.read_nbit(MONTH_DAY_BITS)?;
    let (month, day) = ((raw / 32) as u8, (raw % 32) as u8);
    if month > 12 {
        return Err(Error::IntegerOverflow);
    }
    Ok((month, day))
}

pub(crate) fn write_time(writer: &mut BitWriter<'_>, hour: u8, minute: u8, second: u8) -> Result<()> {
    let raw = (u64::from(hour) * 64 + u64::from(minute)) * 64 + u64::from(second);
    writer.write_nbit(raw, TIME_BITS)
}

pub(crate) fn read_time(reader: &mut BitReader<'_>) -> Result<(u8, u8, u8)> {
    let raw = reader.read_nbit(TIME_BITS)?;
    let (hour, minute, second) = ((raw / 4096) as u8, ((raw / 64) % 64) as u8, (raw % 64) as u8);
    if hour > 24 || minute > 59 || second > 60 {
        return Err(Error::IntegerOverflow);
    }
    Ok((hour, minute, second))
}

pub(crate) fn write_timezone(writer: &mut BitWriter<'_>, offset_minutes: i16) -> Result<()> {
    let (hours, minutes) = (i32::from(offset_minutes / 60), i32::from(offset_minutes % 60));
    writer.write_nbit((hours * 64 + minutes + TIMEZONE_BIAS) as u64, TIMEZONE_BITS)
}

pub(crate) fn read_timezone(reader: &mut BitReader<'_>) -> Result<i16> {
    let adjusted = reader.read_nbit(TIMEZONE_BITS)? as i32 - TIMEZONE_BIAS;
    // Stunden und Minuten haben dasselbe Vorzeichen: -05:30 = -5 * 64 - 30
    let (hours, minutes) = (adjusted / 64, adjusted % 64);
    if !(-14..=14).contains(&hours) || !(-59..=59).contains(&minutes) {
        return Err(Error::IntegerOverflow);
    }
    Ok((hours * 60 + minutes) as i16)
}

impl ValueCodec for DateTimeCodec {
    fn codec_id(&self) -> CodecId {
        CodecId::DateTime
    }

    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        Some(&rcs::DATE_TIME)
    }

    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
        match parse(kind(ty), lexical) {
            Some(value) => {
                scribble.value = StagedValue::DateTime(value);
                true
            }
            None => false,
        }
    }

    fn write(&self, scribble: &Scribble, _ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()> {
        let StagedValue::DateTime(value) = &scribble.value else {
            return Err(super::not_staged(self.codec_id()));
        };
        let writer = &mut *out.writer;
        if has_year(value.kind) {
            integer::encode(writer, value.year)?;
        }
        if has_month_day(value.kind) {
            write_month_day(writer, value.month, value.day)?;
        }
        if has_time(value.kind) {
            write_time(writer, value.hour, value.minute, value.second)?;
            writer.write_boolean(value.fraction.is_some())?;
            if let Some(fraction) = &value.fraction {
                unsigned_integer::encode_big(writer, fraction)?;
            }
        }
        writer.write_boolean(value.timezone.is_some())?;
        if let Some(offset) = value.timezone {
            write_timezone(writer, offset)?;
        }
        Ok(())
    }

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef> {
        let kind = kind(ty);
        let reader = &mut *input.reader;
        let mut value = DateTimeValue {
            kind,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            fraction: None,
            timezone: None,
        };
        if has_year(kind) {
            value.year = integer::decode(reader)?;
        }
        if has_month_day(kind) {
            (value.month, value.day) = read_month_day(reader)?;
        }
        if has_time(kind) {
            (value.hour, value.minute, value.second) = read_time(reader)?;
            if reader.read_boolean()? {
                value.fraction = Some(unsigned_integer::decode_big(reader)?).filter(|f| !f.is_zero());
            }
        }
        if reader.read_boolean()? {
            value.timezone = Some(read_timezone(reader)?);
        }
        let start = input.arena.len();
        format(&value, input.arena);
        Ok(TextRef::Arena(start..input.arena.len()))
    }
}
