//! EXI options document (EXI 5.4, Appendix C).
//!
//! Das Options-Dokument ist ein EXI Body ohne Header, codiert mit dem
//! Options-Schema aus Appendix C und `strict=true`. SD, ED und alle EE
//! nach einfachem Inhalt sind damit implizit (0 Bits).
//!
//! Jedes Container-Element (`header`, `lesscommon`, `uncommon`, `preserve`,
//! `common`) ist eine Sequenz optionaler Kinder gefolgt von EE. In einer
//! strikten Schema-Grammatik ergibt das immer dasselbe Muster: nach Kind
//! `i` stehen nur noch die Kinder `i+1..` und EE zur Wahl, der Event Code
//! ist `ordinal - offset` in `⌈log₂(verbleibend)⌉` Bits.

use crate::bitstream::{BitReader, BitWriter};
use crate::options::{Alignment, ExiOptions, SchemaId};
use crate::{Error, Result, bit_width, string, unsigned_integer};

/// Obergrenze für schemaId-Strings (DoS-Schutz).
const MAX_SCHEMA_ID_LENGTH: u64 = 65_536;

const DEFAULT_BLOCK_SIZE: u32 = 1_000_000;

/// Optional children of one options element, in schema order.
struct Section {
    name: &'static str,
    children: &'static [&'static str],
    /// Kind mit maxOccurs="unbounded" (bleibt nach Auftreten wählbar).
    repeatable: Option<usize>,
}

const HEADER: Section = Section {
    name: "header",
    children: &["lesscommon", "common", "strict"],
    repeatable: None,
};
const LESSCOMMON: Section = Section {
    name: "lesscommon",
    children: &["uncommon", "preserve", "blockSize"],
    repeatable: None,
};
const UNCOMMON: Section = Section {
    name: "uncommon",
    children: &[
        "alignment",
        "selfContained",
        "valueMaxLength",
        "valuePartitionCapacity",
        "datatypeRepresentationMap",
    ],
    repeatable: Some(4),
};
const PRESERVE: Section = Section {
    name: "preserve",
    children: &["dtd", "prefixes", "lexicalValues", "comments", "pis"],
    repeatable: None,
};
const COMMON: Section = Section {
    name: "common",
    children: &["compression", "fragment", "schemaId"],
    repeatable: None,
};

/// Position innerhalb einer Section.
struct Cursor {
    section: &'static Section,
    offset: usize,
}

impl Cursor {
    fn new(section: &'static Section) -> Self {
        Self { section, offset: 0 }
    }

    /// Ordinal von EE.
    fn end_ordinal(&self) -> usize {
        self.section.children.len()
    }

    fn width(&self) -> u8 {
        bit_width::for_count(self.end_ordinal() + 1 - self.offset)
    }

    fn advance(&mut self, ordinal: usize) {
        self.offset = if self.section.repeatable == Some(ordinal) { ordinal } else { ordinal + 1 };
    }

    fn write(&mut self, writer: &mut BitWriter<'_>, ordinal: usize) -> Result<()> {
        debug_assert!(ordinal >= self.offset, "{}: children out of order", self.section.name);
        writer.write_nbit((ordinal - self.offset) as u64, self.width())?;
        self.advance(ordinal);
        Ok(())
    }

    fn end(mut self, writer: &mut BitWriter<'_>) -> Result<()> {
        let end = self.end_ordinal();
        self.write(writer, end)
    }

    /// Liest den nächsten Event Code; `None` bei EE.
    fn read(&mut self, reader: &mut BitReader<'_>) -> Result<Option<usize>> {
        let code = reader.read_nbit(self.width())? as usize;
        let ordinal = code + self.offset;
        match ordinal.cmp(&self.end_ordinal()) {
            std::cmp::Ordering::Less => {
                log::trace!("options: SE({})", self.section.children[ordinal]);
                self.advance(ordinal);
                Ok(Some(ordinal))
            }
            std::cmp::Ordering::Equal => Ok(None),
            std::cmp::Ordering::Greater => {
                Err(Error::invalid_event_code(code.to_string(), self.section.name))
            }
        }
    }
}

fn needs_uncommon(opts: &ExiOptions) -> bool {
    opts.alignment != Alignment::BitPacked
        || opts.self_contained
        || opts.value_max_length.is_some()
        || opts.value_partition_capacity.is_some()
}

fn needs_lesscommon(opts: &ExiOptions) -> bool {
    needs_uncommon(opts) || opts.preserve.any() || opts.block_size != DEFAULT_BLOCK_SIZE
}

fn needs_common(opts: &ExiOptions) -> bool {
    opts.compression || opts.fragment || opts.schema_id.is_some()
}

// ============================================================================
// Encoding
// ============================================================================

/// Writes `options` as an options document. Default values are omitted.
///
/// # Errors
///
/// `InvalidOptionCombination` / `InvalidBlockSize` from [`ExiOptions::validate`].
pub fn encode(writer: &mut BitWriter<'_>, options: &ExiOptions) -> Result<()> {
    options.validate()?;
    // DocContent: SE(header)=0, SE(*)=1
    writer.write_bits(0, 1)?;

    let mut header = Cursor::new(&HEADER);
    if needs_lesscommon(options) {
        header.write(writer, 0)?;
        encode_lesscommon(writer, options)?;
    }
    if needs_common(options) {
        header.write(writer, 1)?;
        encode_common(writer, options)?;
    }
    if options.strict {
        header.write(writer, 2)?;
    }
    header.end(writer)
}

fn encode_lesscommon(writer: &mut BitWriter<'_>, opts: &ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&LESSCOMMON);
    if needs_uncommon(opts) {
        section.write(writer, 0)?;
        encode_uncommon(writer, opts)?;
    }
    if opts.preserve.any() {
        section.write(writer, 1)?;
        encode_preserve(writer, opts)?;
    }
    if opts.block_size != DEFAULT_BLOCK_SIZE {
        section.write(writer, 2)?;
        unsigned_integer::encode(writer, u64::from(opts.block_size))?;
    }
    section.end(writer)
}

fn encode_uncommon(writer: &mut BitWriter<'_>, opts: &ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&UNCOMMON);
    if opts.alignment != Alignment::BitPacked {
        section.write(writer, 0)?;
        // alignment: SE(byte)=0 | SE(pre-compress)=1
        let choice = u64::from(opts.alignment == Alignment::PreCompression);
        writer.write_nbit(choice, 1)?;
    }
    if opts.self_contained {
        section.write(writer, 1)?;
    }
    if let Some(len) = opts.value_max_length {
        section.write(writer, 2)?;
        unsigned_integer::encode(writer, u64::from(len))?;
    }
    if let Some(cap) = opts.value_partition_capacity {
        section.write(writer, 3)?;
        unsigned_integer::encode(writer, u64::from(cap))?;
    }
    section.end(writer)
}

fn encode_preserve(writer: &mut BitWriter<'_>, opts: &ExiOptions) -> Result<()> {
    let p = &opts.preserve;
    let mut section = Cursor::new(&PRESERVE);
    for (ordinal, set) in [p.dtd, p.prefixes, p.lexical_values, p.comments, p.pis]
        .into_iter()
        .enumerate()
    {
        if set {
            section.write(writer, ordinal)?;
        }
    }
    section.end(writer)
}

fn encode_common(writer: &mut BitWriter<'_>, opts: &ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&COMMON);
    if opts.compression {
        section.write(writer, 0)?;
    }
    if opts.fragment {
        section.write(writer, 1)?;
    }
    if let Some(id) = &opts.schema_id {
        section.write(writer, 2)?;
        encode_schema_id(writer, id)?;
    }
    section.end(writer)
}

/// schemaId ist ein nillable xsd:string:
/// - CH = `0`, danach der Wert als Value-Literal (Länge + 2)
/// - AT(xsi:nil) = `10`, Boolean, danach EE = `1`
/// - EE = `11` (leerer Inhalt)
fn encode_schema_id(writer: &mut BitWriter<'_>, schema_id: &SchemaId) -> Result<()> {
    match schema_id {
        SchemaId::None => {
            writer.write_bits(0b10, 2)?;
            writer.write_boolean(true)?;
            writer.write_bits(1, 1)
        }
        SchemaId::BuiltinOnly => writer.write_bits(0b11, 2),
        SchemaId::Id(id) => {
            writer.write_bits(0, 1)?;
            string::encode_with_offset(writer, id, 2, None)
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads an options document.
///
/// # Errors
///
/// - `InvalidEventCode` for codes outside the Appendix C grammar
/// - `IntegerOverflow` for unsignedInt values above `u32::MAX`
/// - `UnsupportedFeature` for a datatype representation map
/// - `InvalidOptionCombination` when the decoded options conflict
pub fn decode(reader: &mut BitReader<'_>) -> Result<ExiOptions> {
    let mut opts = ExiOptions::default();
    if reader.read_bits(1)? != 0 {
        return Err(Error::invalid_event_code("1", "options document (SE(*))"));
    }
    let mut header = Cursor::new(&HEADER);
    while let Some(child) = header.read(reader)? {
        match child {
            0 => decode_lesscommon(reader, &mut opts)?,
            1 => decode_common(reader, &mut opts)?,
            _ => opts.strict = true,
        }
    }
    opts.validate()?;
    log::debug!("decoded EXI options: {opts:?}");
    Ok(opts)
}

fn decode_lesscommon(reader: &mut BitReader<'_>, opts: &mut ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&LESSCOMMON);
    while let Some(child) = section.read(reader)? {
        match child {
            0 => decode_uncommon(reader, opts)?,
            1 => decode_preserve(reader, opts)?,
            _ => opts.block_size = decode_unsigned_int(reader)?,
        }
    }
    Ok(())
}

fn decode_uncommon(reader: &mut BitReader<'_>, opts: &mut ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&UNCOMMON);
    while let Some(child) = section.read(reader)? {
        match child {
            0 => {
                opts.alignment = if reader.read_nbit(1)? == 0 {
                    Alignment::ByteAlignment
                } else {
                    Alignment::PreCompression
                };
            }
            1 => opts.self_contained = true,
            2 => opts.value_max_length = Some(decode_unsigned_int(reader)?),
            3 => opts.value_partition_capacity = Some(decode_unsigned_int(reader)?),
            _ => return Err(Error::UnsupportedFeature("datatype representation map")),
        }
    }
    Ok(())
}

fn decode_preserve(reader: &mut BitReader<'_>, opts: &mut ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&PRESERVE);
    while let Some(child) = section.read(reader)? {
        let p = &mut opts.preserve;
        match child {
            0 => p.dtd = true,
            1 => p.prefixes = true,
            2 => p.lexical_values = true,
            3 => p.comments = true,
            _ => p.pis = true,
        }
    }
    Ok(())
}

fn decode_common(reader: &mut BitReader<'_>, opts: &mut ExiOptions) -> Result<()> {
    let mut section = Cursor::new(&COMMON);
    while let Some(child) = section.read(reader)? {
        match child {
            0 => opts.compression = true,
            1 => opts.fragment = true,
            _ => opts.schema_id = Some(decode_schema_id(reader)?),
        }
    }
    Ok(())
}

fn decode_schema_id(reader: &mut BitReader<'_>) -> Result<SchemaId> {
    if reader.read_bits(1)? == 0 {
        return decode_schema_id_value(reader);
    }
    if reader.read_bits(1)? == 1 {
        return Ok(SchemaId::BuiltinOnly);
    }
    // AT(xsi:nil), danach CH=0 | EE=1
    let nil = reader.read_boolean()?;
    let after_nil = reader.read_bits(1)?;
    match (nil, after_nil) {
        (true, 1) => Ok(SchemaId::None),
        (false, 0) => decode_schema_id_value(reader),
        _ => Err(Error::invalid_event_code(after_nil.to_string(), "schemaId after xsi:nil")),
    }
}

fn decode_schema_id_value(reader: &mut BitReader<'_>) -> Result<SchemaId> {
    let indicator = unsigned_integer::decode(reader)?;
    // Die Value-Partition des Options-Dokuments ist leer
    if indicator < 2 {
        return Err(Error::InvalidCompactId(indicator as usize));
    }
    let len = indicator - 2;
    if len > MAX_SCHEMA_ID_LENGTH {
        return Err(Error::StringLengthExceeded { length: len, max: MAX_SCHEMA_ID_LENGTH });
    }
    let mut id = String::new();
    string::decode_chars_into(reader, len, None, &mut id)?;
    Ok(if id.is_empty() { SchemaId::BuiltinOnly } else { SchemaId::Id(id) })
}

fn decode_unsigned_int(reader: &mut BitReader<'_>) -> Result<u32> {
    unsigned_integer::decode_u32(reader)
}

// ============================================================================
// Convenience
// ============================================================================

/// Encodes an options document into a padded byte vector.
pub fn encode_to_vec(options: &ExiOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut writer = BitWriter::new(&mut out);
        encode(&mut writer, options)?;
        writer.finish()?;
    }
    Ok(out)
}

/// Decodes a padded options document and rejects trailing bytes.
pub fn decode_from_slice(data: &[u8]) -> Result<ExiOptions> {
    let mut reader = BitReader::new(data);
    let options = decode(&mut reader)?;
    let rest = (8 - reader.bit_position() % 8) % 8;
    if reader.read_bits(rest as u8)? != 0 {
        return Err(Error::MalformedHeader);
    }
    if reader.bit_position() / 8 < data.len() as u64 {
        return Err(Error::MalformedHeader);
    }
    Ok(options)
}
