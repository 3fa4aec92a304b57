//! EXI Header (EXI 5).
//!
//! Struktur:
//! - `$EXI` Cookie (optional, EXI 5.1)
//! - Distinguishing Bits `10` (EXI 5.2)
//! - Presence Bit für das Options-Dokument
//! - Format Version: Preview-Bit + 4-Bit-Chunks, 15 = Fortsetzung (EXI 5.3)
//! - Options-Dokument (optional, EXI 5.4)
//! - Padding bis zur Byte-Grenze bei byte-alignment (EXI 5)
//!
//! Der Header wird mit einem ungepufferten Reader gelesen; der Body-Reader
//! übernimmt danach den Rest des Bytes (siehe [`crate::bitstream`]).

use crate::bitstream::{BitReader, BitWriter};
use crate::options::ExiOptions;
use crate::{Error, Result, options_codec};

/// `$EXI`
pub const COOKIE: [u8; 4] = *b"$EXI";

/// Distinguishing Bits `10` (EXI 5.2).
const DISTINGUISHING_BITS: u8 = 0b10;

/// Einzige unterstützte Version: Final 1.
const FORMAT_VERSION: u16 = 1;

/// Parsed EXI header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExiHeader {
    cookie: bool,
    options_present: bool,
    /// Aus dem Header oder out-of-band.
    options: ExiOptions,
}

impl ExiHeader {
    /// Stream started with `$EXI`.
    pub fn cookie(&self) -> bool {
        self.cookie
    }

    /// The header carried an options document.
    pub fn options_present(&self) -> bool {
        self.options_present
    }

    /// Effective options of the stream.
    pub fn options(&self) -> &ExiOptions {
        &self.options
    }

    pub fn into_options(self) -> ExiOptions {
        self.options
    }
}

/// Writes the header. With `options == None` the presence bit is 0 and the
/// decoder must know the options out-of-band.
///
/// `byte_aligned` adds the padding required before a byte-aligned body.
pub fn encode(
    writer: &mut BitWriter<'_>,
    cookie: bool,
    options: Option<&ExiOptions>,
    byte_aligned: bool,
) -> Result<()> {
    if cookie {
        writer.write_bytes(&COOKIE)?;
    }
    writer.write_bits(u64::from(DISTINGUISHING_BITS), 2)?;
    writer.write_bit(options.is_some())?;
    encode_version(writer, false, FORMAT_VERSION)?;
    if let Some(options) = options {
        options_codec::encode(writer, options)?;
    }
    if byte_aligned {
        writer.align_to_byte()?;
    }
    Ok(())
}

/// Preview-Bit, dann (version - 1) als Folge von 4-Bit-Chunks.
fn encode_version(writer: &mut BitWriter<'_>, preview: bool, version: u16) -> Result<()> {
    writer.write_bit(preview)?;
    let mut remaining = version.saturating_sub(1);
    while remaining >= 15 {
        writer.write_bits(15, 4)?;
        remaining -= 15;
    }
    writer.write_bits(u64::from(remaining), 4)
}

/// Reads the header from an unbuffered reader.
///
/// `out_of_band` are the options used when the presence bit is 0. The
/// padding before a byte-aligned body is consumed.
///
/// # Errors
///
/// - `MalformedHeader` for a truncated cookie (`$` not followed by `EXI`)
/// - `InvalidDistinguishingBits` when the first bits are not `10`
/// - `UnsupportedVersion` for preview or any version other than 1
/// - errors of [`options_codec::decode`]
pub fn decode(reader: &mut BitReader<'_>, out_of_band: &ExiOptions) -> Result<ExiHeader> {
    // Das erste Byte ist entweder '$' oder enthält Distinguishing Bits,
    // Presence, Preview und den ersten Versions-Chunk.
    let mut first = reader.read_byte()?;
    let cookie = first == COOKIE[0];
    if cookie {
        let mut rest = [0u8; 3];
        reader.read_bytes(&mut rest)?;
        if rest != COOKIE[1..] {
            return Err(Error::MalformedHeader);
        }
        first = reader.read_byte()?;
    }

    let distinguishing = first >> 6;
    if distinguishing != DISTINGUISHING_BITS {
        return Err(Error::InvalidDistinguishingBits(distinguishing));
    }
    let options_present = (first >> 5) & 1 == 1;
    let preview = (first >> 4) & 1 == 1;
    let mut chunk = first & 0x0F;
    let mut version: u32 = 1;
    while chunk == 15 {
        version += 15;
        if version > u32::from(u16::MAX) {
            return Err(Error::UnsupportedVersion);
        }
        chunk = reader.read_bits(4)? as u8;
    }
    version += u32::from(chunk);
    if preview || version != u32::from(FORMAT_VERSION) {
        log::debug!("rejecting EXI version {version} (preview={preview})");
        return Err(Error::UnsupportedVersion);
    }

    let options = if options_present {
        options_codec::decode(reader)?
    } else {
        out_of_band.clone()
    };
    if options.is_byte_aligned() {
        reader.align_to_byte();
    }
    log::debug!(
        "EXI header: cookie={cookie}, options_present={options_present}, alignment={:?}",
        options.alignment()
    );
    Ok(ExiHeader { cookie, options_present, options })
}
