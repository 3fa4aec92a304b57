//! Variable-length unsigned integer encoding (EXI 7.1.6).
//!
//! Each octet has a continuation bit (MSB) and 7 data bits. The least
//! significant group is written first. The 32-bit, 64-bit and
//! arbitrary-precision forms share the same octet sequence; only the
//! accumulator differs.

use num_bigint::BigUint;

use crate::bitstream::{BitReader, BitWriter};
use crate::{Error, Result};

/// Obergrenze fuer Octets einer beliebig grossen Zahl (DoS-Schutz).
const MAX_BIG_OCTETS: usize = 4096;

/// Encodes a `u64` as a variable-length unsigned integer.
#[inline]
pub fn encode(writer: &mut BitWriter<'_>, value: u64) -> Result<()> {
    if value < 128 {
        // Fast-Path: ein Octet (Laengen, ASCII Codepoints)
        return writer.write_byte(value as u8);
    }
    let mut v = value;
    loop {
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            return writer.write_byte(low7);
        }
        writer.write_byte(0x80 | low7)?;
    }
}

/// Decodes a variable-length unsigned integer into a `u64`.
#[inline]
pub fn decode(reader: &mut BitReader<'_>) -> Result<u64> {
    let byte = reader.read_byte()?;
    if byte & 0x80 == 0 {
        return Ok(u64::from(byte));
    }
    let mut result = u64::from(byte & 0x7F);
    let mut shift: u32 = 7;
    loop {
        let byte = reader.read_byte()?;
        let data = u64::from(byte & 0x7F);
        // 10. Octet: nur Daten-Bit 0 passt noch, keine weitere Fortsetzung
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(Error::IntegerOverflow);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Decodes a variable-length unsigned integer that must fit in 32 bits.
pub fn decode_u32(reader: &mut BitReader<'_>) -> Result<u32> {
    let mut result = 0u32;
    let mut shift = 0u32;
    loop {
        let byte = reader.read_byte()?;
        let data = u32::from(byte & 0x7F);
        if shift == 28 && (data > 0x0F || byte & 0x80 != 0) {
            return Err(Error::IntegerOverflow);
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Encodes an arbitrary-precision unsigned integer.
pub fn encode_big(writer: &mut BitWriter<'_>, value: &BigUint) -> Result<()> {
    // to_radix_le(128) liefert genau die 7-Bit-Gruppen, LSB zuerst
    let groups = value.to_radix_le(128);
    let last = groups.len() - 1;
    for (i, group) in groups.iter().enumerate() {
        let cont = if i < last { 0x80 } else { 0 };
        writer.write_byte(cont | group)?;
    }
    Ok(())
}

/// Decodes an arbitrary-precision unsigned integer.
pub fn decode_big(reader: &mut BitReader<'_>) -> Result<BigUint> {
    let mut groups = Vec::new();
    loop {
        let byte = reader.read_byte()?;
        groups.push(byte & 0x7F);
        if byte & 0x80 == 0 {
            break;
        }
        if groups.len() >= MAX_BIG_OCTETS {
            return Err(Error::MalformedVarint);
        }
    }
    BigUint::from_radix_le(&groups, 128).ok_or(Error::MalformedVarint)
}

/// Anzahl Octets fuer `value`: `max(1, ceil(bitlength/7))`.
pub fn encoded_len(value: u64) -> usize {
    let bits = (u64::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(7).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            encode(&mut w, value).unwrap();
            w.finish().unwrap();
        }
        out
    }

    fn round_trip(value: u64) -> u64 {
        let data = encoded(value);
        decode(&mut BitReader::new(&data[..])).unwrap()
    }

    #[test]
    fn beispiele_aus_exi_7_1_6() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(10), vec![0x0A]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x80, 0x01]);
        assert_eq!(encoded(201), vec![0xC9, 0x01]);
        assert_eq!(encoded(16383), vec![0xFF, 0x7F]);
    }

    #[test]
    fn grenzwerte() {
        for v in [0, 1, 127, 128, 16384, u64::from(u32::MAX), u64::MAX - 1, u64::MAX] {
            assert_eq!(round_trip(v), v);
        }
    }

    #[test]
    fn u64_overflow_rejected() {
        // 10 Octets, letztes mit Datenwert 2 → > u64::MAX
        let mut data = vec![0xFF; 9];
        data.push(0x02);
        assert_eq!(decode(&mut BitReader::new(&data[..])), Err(Error::IntegerOverflow));
    }

    #[test]
    fn zu_lange_fortsetzung() {
        let data = vec![0x80u8; 16];
        assert_eq!(decode(&mut BitReader::new(&data[..])), Err(Error::IntegerOverflow));
        let data = vec![0x80u8; MAX_BIG_OCTETS + 8];
        assert_eq!(decode_big(&mut BitReader::new(&data[..])), Err(Error::MalformedVarint));
    }

    #[test]
    fn truncated_varint_is_premature_end() {
        let data = [0x80u8];
        assert_eq!(decode(&mut BitReader::new(&data[..])), Err(Error::PrematureEndOfStream));
    }

    #[test]
    fn u32_variant_shares_octets() {
        let data = encoded(u64::from(u32::MAX));
        assert_eq!(decode_u32(&mut BitReader::new(&data[..])).unwrap(), u32::MAX);
        let data = encoded(u64::from(u32::MAX) + 1);
        assert_eq!(decode_u32(&mut BitReader::new(&data[..])), Err(Error::IntegerOverflow));
    }

    #[test]
    fn big_variant_shares_octets() {
        let big = BigUint::from(201u32);
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            encode_big(&mut w, &big).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(out, encoded(201));

        let huge: BigUint = "123456789012345678901234567890123456789".parse().unwrap();
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            encode_big(&mut w, &huge).unwrap();
            w.finish().unwrap();
        }
        assert_eq!(decode_big(&mut BitReader::new(&out[..])).unwrap(), huge);
    }

    #[test]
    fn unaligned_varint() {
        let mut out = Vec::new();
        {
            let mut w = BitWriter::new(&mut out);
            w.write_bits(0b101, 3).unwrap();
            encode(&mut w, 300).unwrap();
            w.finish().unwrap();
        }
        let mut r = BitReader::new(&out[..]);
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(decode(&mut r).unwrap(), 300);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_inverts_encode(n in any::<u64>()) {
                prop_assert_eq!(round_trip(n), n);
            }

            #[test]
            fn laenge_folgt_bitlaenge(n in any::<u64>()) {
                prop_assert_eq!(encoded(n).len(), encoded_len(n));
                let bits = 64 - n.leading_zeros() as usize;
                prop_assert_eq!(encoded_len(n), std::cmp::max(1, bits.div_ceil(7)));
            }
        }
    }
}
