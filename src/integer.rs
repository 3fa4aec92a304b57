//! Signed integer encoding (EXI 7.1.5).
//!
//! Three wire forms, chosen by the value codec from the type's facets:
//! 1. Bounded (range ≤ 4096): n-bit unsigned offset from the minimum
//! 2. Non-negative: plain `unsigned_integer`
//! 3. Unbounded signed: sign boolean + unsigned magnitude, negative values
//!    storing `-value - 1`

use num_bigint::{BigInt, BigUint, Sign};

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result, unsigned_integer};

/// Groesster Wertebereich fuer die n-bit Darstellung.
pub const MAX_BOUNDED_RANGE: u64 = 4096;

/// Encodes a signed `i64` (unbounded signed form).
pub fn encode(writer: &mut BitWriter<'_>, value: i64) -> Result<()> {
    if value >= 0 {
        writer.write_boolean(false)?;
        unsigned_integer::encode(writer, value as u64)
    } else {
        writer.write_boolean(true)?;
        // -value - 1 ohne Overflow bei i64::MIN
        unsigned_integer::encode(writer, !(value as u64))
    }
}

/// Decodes a signed integer into an `i64`.
pub fn decode(reader: &mut BitReader<'_>) -> Result<i64> {
    let negative = reader.read_boolean()?;
    let magnitude = unsigned_integer::decode(reader)?;
    if magnitude > i64::MAX as u64 {
        return Err(Error::IntegerOverflow);
    }
    if negative {
        Ok(!(magnitude as i64))
    } else {
        Ok(magnitude as i64)
    }
}

/// Encodes an arbitrary-precision signed integer.
pub fn encode_big(writer: &mut BitWriter<'_>, value: &BigInt) -> Result<()> {
    match value.sign() {
        Sign::Minus => {
            writer.write_boolean(true)?;
            let magnitude: BigUint = value.magnitude() - 1u32;
            unsigned_integer::encode_big(writer, &magnitude)
        }
        _ => {
            writer.write_boolean(false)?;
            unsigned_integer::encode_big(writer, value.magnitude())
        }
    }
}

/// Decodes an arbitrary-precision signed integer.
pub fn decode_big(reader: &mut BitReader<'_>) -> Result<BigInt> {
    let negative = reader.read_boolean()?;
    let magnitude = unsigned_integer::decode_big(reader)?;
    if negative {
        Ok(-BigInt::from(magnitude + 1u32))
    } else {
        Ok(BigInt::from(magnitude))
    }
}

/// Encodes `offset = value - min` in `bits` bits (bounded form).
pub fn encode_bounded(writer: &mut BitWriter<'_>, offset: u64, bits: u8) -> Result<()> {
    debug_assert!(bits <= 12, "bounded integers use at most 12 bits");
    writer.write_nbit(offset, bits)
}

/// Decodes a bounded offset and checks it against the range size.
pub fn decode_bounded(reader: &mut BitReader<'_>, bits: u8, range: u64) -> Result<u64> {
    let offset = reader.read_nbit(bits)?;
    if offset >= range {
        return Err(Error::IntegerOverflow);
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut BitWriter<'_>) -> Result<()>) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            f(&mut w).unwrap();
            w.finish().unwrap();
        }
        out
    }

    fn signed_round_trip(value: i64) -> i64 {
        let data = written(|w| encode(w, value));
        decode(&mut BitReader::new(&data[..])).unwrap()
    }

    #[test]
    fn minus_one_hat_betrag_null() {
        // Sign 1, dann Octet 0x00 (7 Bits verschoben)
        assert_eq!(written(|w| encode(w, -1)), vec![0x80, 0x00]);
    }

    #[test]
    fn plus_one() {
        assert_eq!(written(|w| encode(w, 1)), vec![0x00, 0x80]);
    }

    #[test]
    fn grenzwerte() {
        for v in [0, 1, -1, 63, -64, 1000, -1000, i64::MAX, i64::MIN] {
            assert_eq!(signed_round_trip(v), v);
        }
    }

    #[test]
    fn big_matches_small_form() {
        for v in [0i64, 5, -5, i64::MIN] {
            let small = written(|w| encode(w, v));
            let big = written(|w| encode_big(w, &BigInt::from(v)));
            assert_eq!(small, big, "value {v}");
        }
    }

    #[test]
    fn big_beyond_i64() {
        let v: BigInt = "-98765432109876543210987654321".parse().unwrap();
        let data = written(|w| encode_big(w, &v));
        assert_eq!(decode_big(&mut BitReader::new(&data[..])).unwrap(), v);
        assert_eq!(decode(&mut BitReader::new(&data[..])), Err(Error::IntegerOverflow));
    }

    #[test]
    fn bounded_offset() {
        let data = written(|w| encode_bounded(w, 200, 8));
        assert_eq!(data, vec![200]);
        let mut r = BitReader::new(&data[..]);
        assert_eq!(decode_bounded(&mut r, 8, 256).unwrap(), 200);
        let mut r = BitReader::new(&data[..]);
        assert_eq!(decode_bounded(&mut r, 8, 100), Err(Error::IntegerOverflow));
    }
}
