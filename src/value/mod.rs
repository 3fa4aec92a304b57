//! Typed value codecs (EXI 7.1, 7.3.3).
//!
//! Eine zustandslose Strategie pro Datentyp-Familie. Encoder-Seite in zwei
//! Schritten: `stage` prüft und parst die lexikalische Form (`false` =
//! lexikalisch ungültig, der Aufrufer weicht auf die untypisierte Produktion
//! aus), `write` schreibt den gestagten Wert. Decoder-Seite: `read` liefert
//! den Text als `TextRef` in die Puffer des Scanners.
//!
//! Auswahl über `codec_for`: Lexical-Preservation vor Enumeration vor
//! List vor Familie.

use std::borrow::Cow;

use crate::bitstream::{BitReader, BitWriter};
use crate::characters::TextRef;
use crate::grammar::{BinaryFormat, CompiledGrammar, Family, TypeInfo, Variety, Whitespace};
use crate::rcs::RestrictedCharSet;
use crate::scribble::Scribble;
use crate::string_table::{StringTable, ValueKey};
use crate::{Error, Result};

mod binary;
mod boolean;
mod datetime;
mod decimal;
mod enumeration;
mod float;
mod integer;
mod lexical;
mod list;
mod string;

pub(crate) use binary::read_length;
pub(crate) use string::{read_value_string, write_value_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CodecId {
    String,
    Boolean,
    Integer,
    Decimal,
    Float,
    DateTime,
    Binary,
    List,
    Enumeration,
    Lexical,
}

/// Type a value is encoded with; `info == None` means untyped (string).
#[derive(Clone, Copy)]
pub(crate) struct TypeRef<'g> {
    pub(crate) info: Option<&'g TypeInfo>,
    pub(crate) grammar: &'g dyn CompiledGrammar,
}

impl<'g> TypeRef<'g> {
    pub(crate) fn untyped(grammar: &'g dyn CompiledGrammar) -> Self {
        Self { info: None, grammar }
    }

    pub(crate) fn typed(grammar: &'g dyn CompiledGrammar, id: crate::grammar::TypeId) -> Self {
        Self { info: grammar.type_info(id), grammar }
    }

    fn rcs(&self) -> Option<&'g RestrictedCharSet> {
        self.info.and_then(|t| t.rcs.as_ref())
    }
}

/// Writer side of a value write.
pub(crate) struct EncodeContext<'w, 'a> {
    pub(crate) writer: &'w mut BitWriter<'a>,
    pub(crate) table: &'w mut StringTable,
    /// Qualified name owning the local value partition.
    pub(crate) key: ValueKey,
}

/// Reader side of a value read.
pub(crate) struct DecodeContext<'r, 'a> {
    pub(crate) reader: &'r mut BitReader<'a>,
    pub(crate) table: &'r mut StringTable,
    pub(crate) key: ValueKey,
    pub(crate) arena: &'r mut String,
    pub(crate) octets: &'r mut Vec<u8>,
}

/// Strategy for one datatype family.
pub(crate) trait ValueCodec: Send + Sync {
    fn codec_id(&self) -> CodecId;

    /// Restricted character set used for this family under lexical
    /// preservation (EXI Table 7-2).
    fn builtin_rcs(&self, _ty: TypeRef<'_>) -> Option<&'static RestrictedCharSet> {
        None
    }

    /// Parses `lexical` into `scribble`; `false` if it is not a valid
    /// lexical form of the type.
    fn stage(&self, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool;

    fn write(&self, scribble: &Scribble, ty: TypeRef<'_>, out: &mut EncodeContext<'_, '_>) -> Result<()>;

    fn read(&self, ty: TypeRef<'_>, input: &mut DecodeContext<'_, '_>) -> Result<TextRef>;
}

static STRING: string::StringCodec = string::StringCodec;
static BOOLEAN: boolean::BooleanCodec = boolean::BooleanCodec;
static INTEGER: integer::IntegerCodec = integer::IntegerCodec;
static DECIMAL: decimal::DecimalCodec = decimal::DecimalCodec;
static FLOAT: float::FloatCodec = float::FloatCodec;
static DATE_TIME: datetime::DateTimeCodec = datetime::DateTimeCodec;
static BINARY: binary::BinaryCodec = binary::BinaryCodec;
static LIST: list::ListCodec = list::ListCodec;
static ENUMERATION: enumeration::EnumerationCodec = enumeration::EnumerationCodec;
static LEXICAL: lexical::LexicalCodec = lexical::LexicalCodec;

/// Codec for values of `info` (`None`: untyped).
pub(crate) fn codec_for(info: Option<&TypeInfo>, preserve_lexical: bool) -> &'static dyn ValueCodec {
    let Some(info) = info else {
        return &STRING;
    };
    if preserve_lexical {
        return &LEXICAL;
    }
    if !info.enumeration.is_empty() && info.variety != Variety::Union {
        return &ENUMERATION;
    }
    match info.variety {
        Variety::List(_) => &LIST,
        Variety::Union => &STRING,
        Variety::Atomic => family_codec(info.family),
    }
}

/// Codec of the datatype family, ignoring enumeration and list facets.
pub(crate) fn family_codec(family: Family) -> &'static dyn ValueCodec {
    match family {
        Family::String => &STRING,
        Family::Boolean => &BOOLEAN,
        Family::Integer => &INTEGER,
        Family::Decimal => &DECIMAL,
        Family::Float => &FLOAT,
        Family::DateTime(_) => &DATE_TIME,
        Family::Binary(_) => &BINARY,
    }
}

/// Clears `scribble`, applies the whitespace facet and stages the value.
pub(crate) fn stage(codec: &dyn ValueCodec, lexical: &str, ty: TypeRef<'_>, scribble: &mut Scribble) -> bool {
    scribble.clear();
    let text = match codec.codec_id() {
        // Strings behalten ihre Form, der Wert ist der Inhalt
        CodecId::String | CodecId::Lexical => Cow::Borrowed(lexical),
        _ => normalize_whitespace(lexical, ty.info.map_or(Whitespace::Collapse, |t| t.whitespace)),
    };
    codec.stage(&text, ty, scribble)
}

/// Applies a whiteSpace facet (XSD Part 2, 4.3.6).
pub fn normalize_whitespace(value: &str, mode: Whitespace) -> Cow<'_, str> {
    match mode {
        Whitespace::Preserve => Cow::Borrowed(value),
        Whitespace::Replace => replace_whitespace(value),
        Whitespace::Collapse => collapse_whitespace(value),
    }
}

fn replace_whitespace(value: &str) -> Cow<'_, str> {
    if !value.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(value.chars().map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c }).collect())
}

fn collapse_whitespace(value: &str) -> Cow<'_, str> {
    let trimmed = value.trim_matches(is_xml_space);
    let clean = !trimmed.contains(['\t', '\n', '\r']) && !trimmed.contains("  ");
    if clean {
        return Cow::Borrowed(trimmed);
    }
    let mut out = String::with_capacity(trimmed.len());
    for (i, part) in trimmed.split(is_xml_space).filter(|s| !s.is_empty()).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(part);
    }
    Cow::Owned(out)
}

pub(crate) fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Wert eines `xsi:nil`-Attributs, Leerraum am Rand wird ignoriert.
pub(crate) fn parse_nil(value: &str) -> Option<bool> {
    match value.trim_matches(is_xml_space) {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// `write` ohne passendes `stage`.
pub(crate) fn not_staged(codec: CodecId) -> Error {
    Error::no_matching_production("value without stage()", format!("{codec:?} codec"))
}

/// Binary format of a type, base64 for anything else.
pub(crate) fn binary_format(info: Option<&TypeInfo>) -> BinaryFormat {
    match info.map(|t| t.family) {
        Some(Family::Binary(format)) => format,
        _ => BinaryFormat::Base64,
    }
}
