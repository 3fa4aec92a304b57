//! EXI options (EXI 5.4, Table 5-1) and codec configuration.
//!
//! [`ExiOptions`] are the options that travel in (or alongside) the EXI
//! header and shape the body. [`CodecConfig`] holds the local settings of a
//! Scanner or Scriber that never appear on the wire.
//!
//! # Beispiel
//!
//! ```
//! use erxi_stream::options::{Alignment, ExiOptions, Preserve};
//!
//! let opts = ExiOptions::default()
//!     .with_alignment(Alignment::ByteAlignment)
//!     .with_preserve(Preserve { comments: true, ..Preserve::default() })
//!     .with_value_max_length(1024);
//!
//! assert_eq!(opts.alignment(), Alignment::ByteAlignment);
//! assert!(opts.preserve().comments);
//! assert_eq!(opts.value_max_length(), Some(1024));
//! assert!(opts.validate().is_ok());
//! ```

use crate::{Error, Result};

/// Alignment of event codes and content items (EXI 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Event codes and content are packed in bits without padding.
    #[default]
    BitPacked,
    /// Event codes and content are aligned on byte boundaries.
    ByteAlignment,
    /// All compression steps except DEFLATE. Not implemented by this codec.
    PreCompression,
}

/// Schema identification for the EXI body (EXI 5.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaId {
    /// No schema information is used (`xsi:nil="true"` in the header).
    None,
    /// Only the built-in XML Schema types (empty string in the header).
    BuiltinOnly,
    /// A user-defined schema identifier.
    Id(String),
}

/// Fidelity options (EXI 5.4, 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preserve {
    /// CM events can be preserved.
    pub comments: bool,
    /// PI events can be preserved.
    pub pis: bool,
    /// DT and ER events can be preserved.
    pub dtd: bool,
    /// NS events and namespace prefixes can be preserved.
    pub prefixes: bool,
    /// Lexical form of element and attribute values can be preserved.
    pub lexical_values: bool,
}

impl Preserve {
    /// True wenn mindestens ein Flag gesetzt ist (Header-Abschnitt "preserve").
    pub fn any(&self) -> bool {
        self.comments || self.pis || self.dtd || self.prefixes || self.lexical_values
    }
}

/// EXI options (EXI 5.4, Table 5-1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExiOptions {
    pub(crate) alignment: Alignment,
    pub(crate) compression: bool,
    pub(crate) strict: bool,
    pub(crate) fragment: bool,
    pub(crate) preserve: Preserve,
    pub(crate) self_contained: bool,
    pub(crate) schema_id: Option<SchemaId>,
    pub(crate) block_size: u32,
    pub(crate) value_max_length: Option<u32>,
    pub(crate) value_partition_capacity: Option<u32>,
}

impl Default for ExiOptions {
    /// Default values of Table 5-1.
    fn default() -> Self {
        Self {
            alignment: Alignment::BitPacked,
            compression: false,
            strict: false,
            fragment: false,
            preserve: Preserve::default(),
            self_contained: false,
            schema_id: None,
            block_size: 1_000_000,
            value_max_length: None,
            value_partition_capacity: None,
        }
    }
}

impl ExiOptions {
    // --- Getter ---

    pub fn alignment(&self) -> Alignment { self.alignment }
    pub fn compression(&self) -> bool { self.compression }
    pub fn strict(&self) -> bool { self.strict }
    pub fn fragment(&self) -> bool { self.fragment }
    pub fn preserve(&self) -> &Preserve { &self.preserve }
    pub fn self_contained(&self) -> bool { self.self_contained }
    pub fn schema_id(&self) -> Option<&SchemaId> { self.schema_id.as_ref() }
    /// Block size for EXI compression (EXI 9.1).
    pub fn block_size(&self) -> u32 { self.block_size }
    /// Maximum length of a value added to the string table.
    pub fn value_max_length(&self) -> Option<u32> { self.value_max_length }
    /// Total capacity of the value partitions.
    pub fn value_partition_capacity(&self) -> Option<u32> { self.value_partition_capacity }

    // --- Builder ---

    pub fn with_alignment(mut self, alignment: Alignment) -> Self { self.alignment = alignment; self }
    pub fn with_compression(mut self) -> Self { self.compression = true; self }
    pub fn with_strict(mut self) -> Self { self.strict = true; self }
    pub fn with_fragment(mut self) -> Self { self.fragment = true; self }
    pub fn with_preserve(mut self, preserve: Preserve) -> Self { self.preserve = preserve; self }
    pub fn with_self_contained(mut self) -> Self { self.self_contained = true; self }
    pub fn with_schema_id(mut self, schema_id: SchemaId) -> Self { self.schema_id = Some(schema_id); self }
    pub fn with_block_size(mut self, size: u32) -> Self { self.block_size = size; self }
    pub fn with_value_max_length(mut self, len: u32) -> Self { self.value_max_length = Some(len); self }
    pub fn with_value_partition_capacity(mut self, cap: u32) -> Self { self.value_partition_capacity = Some(cap); self }

    // --- Setter ---

    pub fn set_alignment(&mut self, alignment: Alignment) { self.alignment = alignment; }
    pub fn set_compression(&mut self, val: bool) { self.compression = val; }
    pub fn set_strict(&mut self, val: bool) { self.strict = val; }
    pub fn set_fragment(&mut self, val: bool) { self.fragment = val; }
    pub fn set_preserve(&mut self, preserve: Preserve) { self.preserve = preserve; }
    pub fn set_self_contained(&mut self, val: bool) { self.self_contained = val; }
    pub fn set_schema_id(&mut self, schema_id: Option<SchemaId>) { self.schema_id = schema_id; }
    pub fn set_block_size(&mut self, size: u32) { self.block_size = size; }
    pub fn set_value_max_length(&mut self, len: Option<u32>) { self.value_max_length = len; }
    pub fn set_value_partition_capacity(&mut self, cap: Option<u32>) { self.value_partition_capacity = cap; }

    /// Checks the combination rules of EXI 5.4.
    ///
    /// # Errors
    ///
    /// - `InvalidBlockSize` for a block size of zero
    /// - `InvalidOptionCombination` when
    ///   - `compression` is combined with a non-default alignment
    ///   - `strict` is combined with a preserve flag other than
    ///     `lexical_values`, or with `self_contained`
    ///   - `self_contained` is combined with compression or pre-compression
    ///   - the schema id is an empty user id
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        if matches!(self.schema_id, Some(SchemaId::Id(ref id)) if id.is_empty()) {
            return Err(Error::option_conflict("empty schema id, use SchemaId::BuiltinOnly"));
        }
        if self.compression && self.alignment != Alignment::BitPacked {
            return Err(Error::option_conflict("compression with explicit alignment"));
        }
        let p = &self.preserve;
        if self.strict && (p.comments || p.pis || p.dtd || p.prefixes) {
            return Err(Error::option_conflict("strict with preserve options"));
        }
        if self.strict && self.self_contained {
            return Err(Error::option_conflict("strict with selfContained"));
        }
        if self.self_contained && (self.compression || self.alignment == Alignment::PreCompression) {
            return Err(Error::option_conflict("selfContained with compression"));
        }
        Ok(())
    }

    /// Byte-aligned n-bit fields and booleans (EXI 6.2, 7.1.9).
    pub fn is_byte_aligned(&self) -> bool {
        self.compression || self.alignment != Alignment::BitPacked
    }

    /// Rejects options this codec validates but does not implement.
    pub(crate) fn check_supported(&self) -> Result<()> {
        if self.compression {
            return Err(Error::UnsupportedFeature("EXI compression"));
        }
        if self.alignment == Alignment::PreCompression {
            return Err(Error::UnsupportedFeature("pre-compression alignment"));
        }
        Ok(())
    }
}

/// Local configuration of a Scanner or Scriber.
///
/// ```
/// use erxi_stream::options::{CodecConfig, ExiOptions};
///
/// let config = CodecConfig::default()
///     .with_cookie()
///     .with_binary_chunk_size(4096);
/// assert!(config.include_cookie());
/// assert!(config.include_options());
/// assert_eq!(config.binary_chunk_size(), Some(4096));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    include_cookie: bool,
    include_options: bool,
    /// Options fuer Streams ohne Options-Header (out-of-band).
    options: ExiOptions,
    binary_chunk_size: Option<usize>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            include_cookie: false,
            include_options: true,
            options: ExiOptions::default(),
            binary_chunk_size: None,
        }
    }
}

impl CodecConfig {
    /// Scriber: writes the `$EXI` cookie.
    pub fn include_cookie(&self) -> bool { self.include_cookie }
    /// Scriber: writes the options document into the header.
    pub fn include_options(&self) -> bool { self.include_options }
    /// Options of the stream. The Scanner uses them only when the header
    /// carries no options document.
    pub fn options(&self) -> &ExiOptions { &self.options }
    /// Chunk size for streamed binary values, `None` for whole values.
    pub fn binary_chunk_size(&self) -> Option<usize> { self.binary_chunk_size }

    pub fn with_cookie(mut self) -> Self { self.include_cookie = true; self }
    pub fn without_options_header(mut self) -> Self { self.include_options = false; self }
    pub fn with_options(mut self, options: ExiOptions) -> Self { self.options = options; self }
    pub fn with_binary_chunk_size(mut self, size: usize) -> Self { self.binary_chunk_size = Some(size); self }

    pub fn set_include_cookie(&mut self, val: bool) { self.include_cookie = val; }
    pub fn set_include_options(&mut self, val: bool) { self.include_options = val; }
    pub fn set_options(&mut self, options: ExiOptions) { self.options = options; }
    pub fn set_binary_chunk_size(&mut self, size: Option<usize>) { self.binary_chunk_size = size; }

    /// Validates the options and the local settings before any I/O.
    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;
        if self.binary_chunk_size == Some(0) {
            return Err(Error::option_conflict("binary chunk size of zero"));
        }
        Ok(())
    }
}
