//! Bit-level stream reader and writer.
//!
//! EXI uses MSB-first bit packing (EXI 7.1). Bits within each byte are
//! numbered 7 (most significant, written/read first) down to 0.
//!
//! Both sides sit on top of `std::io` and keep an 8 KiB buffer between the
//! accumulator and the byte source/sink. In byte-aligned mode every n-bit
//! field is rounded up to whole bytes (least significant byte first) and
//! booleans occupy a full byte (EXI 7.1.2, 7.1.9).
//!
//! The header sub-document is read through an unbuffered reader
//! ([`BitReader::unbuffered`]) that never pulls more bytes from the source
//! than it has decoded. Once the header is parsed, [`BitReader::into_residue`]
//! hands the partially consumed byte to the body reader
//! ([`BitReader::inherit_residue`]), which resumes at the exact bit.

use std::io::{ErrorKind, Read, Write};

use crate::{Error, Result};

/// Groesse des Refill-/Flush-Puffers.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Writes bits MSB first into a buffered byte sink.
///
/// Intern sammelt ein u64-Akkumulator die Bits; volle Bytes wandern in
/// `buf` und werden bei [`BUFFER_SIZE`] an den Sink geflusht.
pub struct BitWriter<'a> {
    sink: Box<dyn Write + 'a>,
    buf: Vec<u8>,
    /// Akkumulator: enthält die nächsten `accum_bits` Bits (MSB = ältestes Bit).
    accum: u64,
    /// Anzahl gültiger Bits im Akkumulator (0..7 nach Flush).
    accum_bits: u8,
    byte_aligned: bool,
    /// Bereits an den Sink übergebene Bytes.
    flushed: u64,
}

impl<'a> BitWriter<'a> {
    /// Creates a bit-packed writer over `sink`.
    pub fn new(sink: impl Write + 'a) -> Self {
        Self {
            sink: Box::new(sink),
            buf: Vec::with_capacity(BUFFER_SIZE),
            accum: 0,
            accum_bits: 0,
            byte_aligned: false,
            flushed: 0,
        }
    }

    /// Switches between bit-packed and byte-aligned representation of
    /// n-bit fields and booleans.
    pub fn set_byte_aligned(&mut self, byte_aligned: bool) {
        self.byte_aligned = byte_aligned;
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.byte_aligned
    }

    /// Flusht volle Bytes aus dem Akkumulator in den Buffer.
    #[inline(always)]
    fn drain_accum(&mut self) -> Result<()> {
        while self.accum_bits >= 8 {
            self.accum_bits -= 8;
            self.buf.push((self.accum >> self.accum_bits) as u8);
        }
        if self.accum_bits > 0 {
            self.accum &= (1u64 << self.accum_bits) - 1;
        } else {
            self.accum = 0;
        }
        if self.buf.len() >= BUFFER_SIZE {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_all(&self.buf)?;
            self.flushed += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Writes a single raw bit. `true` = 1, `false` = 0.
    #[inline(always)]
    pub fn write_bit(&mut self, val: bool) -> Result<()> {
        self.accum = (self.accum << 1) | u64::from(val);
        self.accum_bits += 1;
        if self.accum_bits >= 8 {
            self.drain_accum()?;
        }
        Ok(())
    }

    /// Schreibt die unteren 2 Bits von `val`. Optimiert für Event-Code-Teile.
    #[inline(always)]
    pub fn write_bits_2(&mut self, val: u8) -> Result<()> {
        debug_assert!(val < 4, "write_bits_2: val={val} >= 4");
        self.accum = (self.accum << 2) | u64::from(val & 0b11);
        self.accum_bits += 2;
        if self.accum_bits >= 8 {
            self.drain_accum()?;
        }
        Ok(())
    }

    /// Schreibt die unteren 3 Bits von `val`. Optimiert für Event-Code-Teile.
    #[inline(always)]
    pub fn write_bits_3(&mut self, val: u8) -> Result<()> {
        debug_assert!(val < 8, "write_bits_3: val={val} >= 8");
        self.accum = (self.accum << 3) | u64::from(val & 0b111);
        self.accum_bits += 3;
        if self.accum_bits >= 8 {
            self.drain_accum()?;
        }
        Ok(())
    }

    /// Writes the lower `n` raw bits of `val`, MSB first. `n == 0` is a no-op.
    #[inline]
    pub fn write_bits(&mut self, val: u64, n: u8) -> Result<()> {
        debug_assert!(n <= 64, "bit count must be 0..=64, got {n}");
        match n {
            0 => Ok(()),
            2 => self.write_bits_2(val as u8 & 0b11),
            3 => self.write_bits_3(val as u8 & 0b111),
            n if n <= 56 => {
                // accum_bits < 8 nach jedem Drain, also passen bis zu 56 Bits
                self.accum = (self.accum << n) | (val & ((1u64 << n) - 1));
                self.accum_bits += n;
                self.drain_accum()
            }
            n => {
                self.write_bits(val >> 32, n - 32)?;
                self.write_bits(val & 0xFFFF_FFFF, 32)
            }
        }
    }

    /// Writes an n-bit unsigned integer honoring the alignment mode (EXI 7.1.9).
    ///
    /// Byte-aligned: `ceil(n/8)` bytes, least significant byte first.
    #[inline]
    pub fn write_nbit(&mut self, val: u64, n: u8) -> Result<()> {
        if !self.byte_aligned {
            return self.write_bits(val, n);
        }
        let bytes = n.div_ceil(8);
        for i in 0..bytes {
            self.write_byte((val >> (8 * u32::from(i))) as u8)?;
        }
        Ok(())
    }

    /// Writes a boolean: one bit, or one byte when byte-aligned (EXI 7.1.2).
    #[inline]
    pub fn write_boolean(&mut self, val: bool) -> Result<()> {
        if self.byte_aligned {
            self.write_byte(u8::from(val))
        } else {
            self.write_bit(val)
        }
    }

    /// Writes one full byte (8 raw bits). Fast path when already aligned.
    #[inline(always)]
    pub fn write_byte(&mut self, val: u8) -> Result<()> {
        if self.accum_bits == 0 {
            self.buf.push(val);
            if self.buf.len() >= BUFFER_SIZE {
                self.flush_buffer()?;
            }
            Ok(())
        } else {
            self.write_bits(u64::from(val), 8)
        }
    }

    /// Schreibt ein Byte-Slice. Bei byte-aligned direkt `extend_from_slice`.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.accum_bits == 0 {
            self.buf.extend_from_slice(bytes);
            if self.buf.len() >= BUFFER_SIZE {
                self.flush_buffer()?;
            }
            Ok(())
        } else {
            bytes.iter().try_for_each(|&b| self.write_bits(u64::from(b), 8))
        }
    }

    /// Pads with zero bits up to the next byte boundary. No-op if aligned.
    pub fn align_to_byte(&mut self) -> Result<()> {
        if self.accum_bits > 0 {
            let pad = 8 - self.accum_bits;
            self.accum <<= pad;
            self.accum_bits = 8;
            self.drain_accum()?;
        }
        Ok(())
    }

    /// Number of bits written so far.
    pub fn bit_position(&self) -> u64 {
        (self.flushed + self.buf.len() as u64) * 8 + u64::from(self.accum_bits)
    }

    /// Pads to a byte boundary, flushes everything and returns the sink.
    pub fn finish(mut self) -> Result<Box<dyn Write + 'a>> {
        self.align_to_byte()?;
        self.flush_buffer()?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

/// Partially consumed byte left behind by the header reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Residue {
    /// Unread bits, right-aligned.
    bits: u8,
    /// Number of unread bits (0..=7).
    count: u8,
}

impl Residue {
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Reads bits MSB first from a buffered byte source.
///
/// Der Akkumulator wird nur so weit nachgeladen, wie ein Lesezugriff Bits
/// braucht. Im ungepufferten Modus (Puffergroesse 1) liest der Reader daher
/// nie ein Byte mehr aus der Quelle, als er decodiert hat.
pub struct BitReader<'a> {
    source: Box<dyn Read + 'a>,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    /// Akkumulator, linksbündig (Bit 63 = ältestes Bit).
    accum: u64,
    accum_bits: u8,
    byte_aligned: bool,
    /// Verbrauchte Bits seit Beginn dieses Readers.
    consumed: u64,
}

impl<'a> BitReader<'a> {
    /// Creates a buffered, bit-packed reader over `source`.
    pub fn new(source: impl Read + 'a) -> Self {
        Self::with_capacity(Box::new(source), BUFFER_SIZE)
    }

    /// Creates a reader that pulls one byte at a time from `source`.
    ///
    /// Used for the EXI header and options document, so the body reader can
    /// take over the remaining bytes of the source.
    pub fn unbuffered(source: impl Read + 'a) -> Self {
        Self::with_capacity(Box::new(source), 1)
    }

    fn with_capacity(source: Box<dyn Read + 'a>, capacity: usize) -> Self {
        Self {
            source,
            buf: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
            len: 0,
            accum: 0,
            accum_bits: 0,
            byte_aligned: false,
            consumed: 0,
        }
    }

    /// Creates a buffered body reader that starts with the unread bits of
    /// the header reader's last byte.
    pub fn inherit_residue(source: Box<dyn Read + 'a>, residue: Residue) -> Self {
        let mut reader = Self::with_capacity(source, BUFFER_SIZE);
        if residue.count > 0 {
            reader.accum = u64::from(residue.bits) << (64 - u32::from(residue.count));
            reader.accum_bits = residue.count;
        }
        reader
    }

    /// Ends this reader, returning the source and the unread bits of the
    /// current byte.
    ///
    /// Only meaningful for readers created with [`BitReader::unbuffered`]:
    /// a buffered reader may hold read-ahead bytes that would be lost.
    pub fn into_residue(self) -> (Box<dyn Read + 'a>, Residue) {
        debug_assert!(self.accum_bits < 8 && self.pos == self.len, "read-ahead would be lost");
        let residue = if self.accum_bits == 0 {
            Residue::default()
        } else {
            Residue {
                bits: (self.accum >> (64 - u32::from(self.accum_bits))) as u8,
                count: self.accum_bits,
            }
        };
        (self.source, residue)
    }

    pub fn set_byte_aligned(&mut self, byte_aligned: bool) {
        self.byte_aligned = byte_aligned;
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.byte_aligned
    }

    /// Lädt das nächste Byte aus dem Puffer (und den Puffer aus der Quelle).
    fn load_byte(&mut self) -> Result<()> {
        if self.pos == self.len {
            self.pos = 0;
            self.len = loop {
                match self.source.read(&mut self.buf) {
                    Ok(0) => return Err(Error::PrematureEndOfStream),
                    Ok(n) => break n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        self.accum |= u64::from(byte) << (56 - self.accum_bits);
        self.accum_bits += 8;
        Ok(())
    }

    #[inline(always)]
    fn ensure(&mut self, n: u8) -> Result<()> {
        while self.accum_bits < n {
            self.load_byte()?;
        }
        Ok(())
    }

    #[inline(always)]
    fn take(&mut self, n: u8) -> u64 {
        let val = self.accum >> (64 - u32::from(n));
        self.accum = if n < 64 { self.accum << n } else { 0 };
        self.accum_bits -= n;
        self.consumed += u64::from(n);
        val
    }

    /// Reads a single raw bit.
    #[inline(always)]
    pub fn read_bit(&mut self) -> Result<bool> {
        self.ensure(1)?;
        Ok(self.take(1) != 0)
    }

    /// Liest 2 Bits. Optimiert für Event-Code-Teile.
    #[inline(always)]
    pub fn read_bits_2(&mut self) -> Result<u8> {
        self.ensure(2)?;
        Ok(self.take(2) as u8)
    }

    /// Liest 3 Bits. Optimiert für Event-Code-Teile.
    #[inline(always)]
    pub fn read_bits_3(&mut self) -> Result<u8> {
        self.ensure(3)?;
        Ok(self.take(3) as u8)
    }

    /// Reads `n` raw bits (0..=64), MSB first. `n == 0` returns 0.
    #[inline]
    pub fn read_bits(&mut self, n: u8) -> Result<u64> {
        debug_assert!(n <= 64, "bit count must be 0..=64, got {n}");
        match n {
            0 => Ok(0),
            n if n <= 56 => {
                self.ensure(n)?;
                Ok(self.take(n))
            }
            n => {
                let high = self.read_bits(n - 32)?;
                let low = self.read_bits(32)?;
                Ok((high << 32) | low)
            }
        }
    }

    /// Reads an n-bit unsigned integer honoring the alignment mode (EXI 7.1.9).
    #[inline]
    pub fn read_nbit(&mut self, n: u8) -> Result<u64> {
        if !self.byte_aligned {
            return self.read_bits(n);
        }
        let mut val = 0u64;
        for i in 0..n.div_ceil(8) {
            val |= u64::from(self.read_byte()?) << (8 * u32::from(i));
        }
        Ok(val)
    }

    /// Reads a boolean: one bit, or one byte when byte-aligned (EXI 7.1.2).
    #[inline]
    pub fn read_boolean(&mut self) -> Result<bool> {
        if self.byte_aligned {
            Ok(self.read_byte()? != 0)
        } else {
            self.read_bit()
        }
    }

    /// Reads one full byte (8 raw bits).
    #[inline(always)]
    pub fn read_byte(&mut self) -> Result<u8> {
        self.ensure(8)?;
        Ok(self.take(8) as u8)
    }

    /// Füllt `out` mit den nächsten Bytes.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        for slot in out.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Discards unread bits up to the next byte boundary. No-op if aligned.
    pub fn align_to_byte(&mut self) {
        let discard = self.accum_bits % 8;
        if discard > 0 {
            self.take(discard);
        }
    }

    /// Number of bits consumed by this reader.
    pub fn bit_position(&self) -> u64 {
        self.consumed
    }
}
