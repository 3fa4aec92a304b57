//! Qualified names and their string-table representation (EXI 7.1.7, 7.3.2).
//!
//! Wire-Formate pro Partition:
//! - URI: Treffer `id + 1` in `⌈log₂(m + 1)⌉` Bits, sonst `0` + Literal
//! - Local-Name: Treffer Unsigned Integer `0` + `id` in `⌈log₂(m)⌉` Bits,
//!   sonst Länge + 1 und die Zeichen
//! - Prefix (NS-Event): wie URI, in der Prefix-Partition der URI
//! - QName-Prefix (SE/AT bei `preserve.prefixes`): `id` in `⌈log₂(m)⌉` Bits
//!
//! Jeder Miss wird sofort in die Partition übernommen, sodass Scanner und
//! Scriber dieselben IDs vergeben.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::bitstream::{BitReader, BitWriter};
use crate::string_table::{StringTable, URI_XSI, ValueKey};
use crate::{Error, Result, bit_width, string, unsigned_integer};

/// Obergrenze für Namens-Literale (DoS-Schutz).
const MAX_NAME_LENGTH: u64 = 1 << 20;

/// An expanded name plus the prefix it was written with.
///
/// Two names are equal when URI and local name match, regardless of the
/// prefix (EXI 7.1.7).
#[derive(Clone)]
pub struct QName {
    /// Namespace URI, empty for no namespace.
    pub uri: Rc<str>,
    pub local_name: Rc<str>,
    /// Nur bei `preserve.prefixes` gesetzt.
    pub prefix: Option<Rc<str>>,
}

impl QName {
    pub fn new(uri: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        Self { uri: uri.into(), local_name: local_name.into(), prefix: None }
    }

    pub fn with_prefix(
        uri: impl Into<Rc<str>>,
        local_name: impl Into<Rc<str>>,
        prefix: impl Into<Rc<str>>,
    ) -> Self {
        Self { uri: uri.into(), local_name: local_name.into(), prefix: Some(prefix.into()) }
    }

    /// `xsi:type`
    pub fn xsi_type() -> Self {
        Self::with_prefix(URI_XSI, "type", "xsi")
    }

    /// `xsi:nil`
    pub fn xsi_nil() -> Self {
        Self::with_prefix(URI_XSI, "nil", "xsi")
    }

    pub fn is_xsi_type(&self) -> bool {
        &*self.uri == URI_XSI && &*self.local_name == "type"
    }

    pub fn is_xsi_nil(&self) -> bool {
        &*self.uri == URI_XSI && &*self.local_name == "nil"
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.uri, self.local_name)?;
        if let Some(prefix) = &self.prefix {
            write!(f, " ({prefix})")?;
        }
        Ok(())
    }
}

/// `prefix:local` wenn ein nicht-leerer Prefix vorhanden ist, sonst `local`.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => write!(f, "{prefix}:{}", self.local_name),
            _ => f.write_str(&self.local_name),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local_name == other.local_name && self.uri == other.uri
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.local_name.hash(state);
    }
}

/// Erst local-name, dann URI (EXI 8.5.4.1.3).
impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local_name
            .cmp(&other.local_name)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

/// A qualified name as string-table compact ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpandedNameId {
    pub uri: usize,
    pub local_name: usize,
}

impl ExpandedNameId {
    pub fn new(uri: usize, local_name: usize) -> Self {
        Self { uri, local_name }
    }

    /// Key of the local value partition of this name.
    pub fn value_key(self) -> ValueKey {
        (self.uri, self.local_name)
    }

    /// Ids of `name` if both parts are already in the table.
    pub fn lookup(table: &StringTable, uri: &str, local_name: &str) -> Option<Self> {
        let uri = table.lookup_uri(uri)?;
        let local_name = table.lookup_local_name(uri, local_name)?;
        Some(Self { uri, local_name })
    }

    /// Materialisiert den Namen aus der String Table (ohne Prefix).
    pub fn resolve(self, table: &StringTable) -> Result<QName> {
        let uri = table.uri(self.uri).ok_or(Error::InvalidCompactId(self.uri))?;
        let local_name = table
            .local_name(self.uri, self.local_name)
            .ok_or(Error::InvalidCompactId(self.local_name))?;
        Ok(QName { uri: Rc::clone(uri), local_name: Rc::clone(local_name), prefix: None })
    }
}

// ============================================================================
// URI
// ============================================================================

pub fn encode_uri(writer: &mut BitWriter<'_>, table: &mut StringTable, uri: &str) -> Result<usize> {
    let width = bit_width::for_count(table.uri_count() + 1);
    match table.lookup_uri(uri) {
        Some(id) => {
            writer.write_nbit(id as u64 + 1, width)?;
            Ok(id)
        }
        None => {
            writer.write_nbit(0, width)?;
            string::encode(writer, uri)?;
            Ok(table.intern_uri(uri))
        }
    }
}

pub fn decode_uri(reader: &mut BitReader<'_>, table: &mut StringTable) -> Result<usize> {
    let width = bit_width::for_count(table.uri_count() + 1);
    let code = reader.read_nbit(width)? as usize;
    if code == 0 {
        let uri = decode_literal(reader, 0)?;
        return Ok(table.intern_uri(&uri));
    }
    let id = code - 1;
    if id >= table.uri_count() {
        return Err(Error::InvalidCompactId(code));
    }
    Ok(id)
}

// ============================================================================
// Local name
// ============================================================================

pub fn encode_local_name(
    writer: &mut BitWriter<'_>,
    table: &mut StringTable,
    uri_id: usize,
    local_name: &str,
) -> Result<usize> {
    match table.lookup_local_name(uri_id, local_name) {
        Some(id) => {
            unsigned_integer::encode(writer, 0)?;
            let width = bit_width::for_count(table.local_name_count(uri_id));
            writer.write_nbit(id as u64, width)?;
            Ok(id)
        }
        None => {
            string::encode_with_offset(writer, local_name, 1, None)?;
            Ok(table.intern_local_name(uri_id, local_name))
        }
    }
}

pub fn decode_local_name(reader: &mut BitReader<'_>, table: &mut StringTable, uri_id: usize) -> Result<usize> {
    let indicator = unsigned_integer::decode(reader)?;
    if indicator == 0 {
        let count = table.local_name_count(uri_id);
        let id = reader.read_nbit(bit_width::for_count(count))? as usize;
        if id >= count {
            return Err(Error::InvalidCompactId(id));
        }
        return Ok(id);
    }
    let mut local_name = String::new();
    read_chars(reader, indicator - 1, &mut local_name)?;
    Ok(table.intern_local_name(uri_id, &local_name))
}

/// URI and local name of a wildcard event.
pub fn encode_qname(writer: &mut BitWriter<'_>, table: &mut StringTable, name: &QName) -> Result<ExpandedNameId> {
    let uri = encode_uri(writer, table, &name.uri)?;
    let local_name = encode_local_name(writer, table, uri, &name.local_name)?;
    Ok(ExpandedNameId { uri, local_name })
}

pub fn decode_qname(reader: &mut BitReader<'_>, table: &mut StringTable) -> Result<ExpandedNameId> {
    let uri = decode_uri(reader, table)?;
    let local_name = decode_local_name(reader, table, uri)?;
    Ok(ExpandedNameId { uri, local_name })
}

// ============================================================================
// Prefix
// ============================================================================

/// Prefix eines NS-Events (mit Miss-Literal).
pub fn encode_ns_prefix(
    writer: &mut BitWriter<'_>,
    table: &mut StringTable,
    uri_id: usize,
    prefix: &str,
) -> Result<usize> {
    let width = bit_width::for_count(table.prefix_count(uri_id) + 1);
    match table.lookup_prefix(uri_id, prefix) {
        Some(id) => {
            writer.write_nbit(id as u64 + 1, width)?;
            Ok(id)
        }
        None => {
            writer.write_nbit(0, width)?;
            string::encode(writer, prefix)?;
            Ok(table.intern_prefix(uri_id, prefix))
        }
    }
}

pub fn decode_ns_prefix(reader: &mut BitReader<'_>, table: &mut StringTable, uri_id: usize) -> Result<usize> {
    let count = table.prefix_count(uri_id);
    let code = reader.read_nbit(bit_width::for_count(count + 1))? as usize;
    if code == 0 {
        let prefix = decode_literal(reader, 0)?;
        return Ok(table.intern_prefix(uri_id, &prefix));
    }
    if code > count {
        return Err(Error::InvalidCompactId(code));
    }
    Ok(code - 1)
}

/// Prefix eines SE/AT-QNames. Ohne Einträge für die URI wird nichts
/// geschrieben; der Prefix folgt dann über ein NS-Event.
pub fn encode_qname_prefix(
    writer: &mut BitWriter<'_>,
    table: &StringTable,
    uri_id: usize,
    prefix: Option<&str>,
) -> Result<()> {
    let count = table.prefix_count(uri_id);
    if count == 0 {
        return Ok(());
    }
    let id = match prefix.and_then(|p| table.lookup_prefix(uri_id, p)) {
        Some(id) => id,
        None => {
            log::warn!("prefix {prefix:?} not declared for uri id {uri_id}, writing prefix id 0");
            0
        }
    };
    writer.write_nbit(id as u64, bit_width::for_count(count))
}

pub fn decode_qname_prefix(reader: &mut BitReader<'_>, table: &StringTable, uri_id: usize) -> Result<Option<Rc<str>>> {
    let count = table.prefix_count(uri_id);
    if count == 0 {
        return Ok(None);
    }
    let id = reader.read_nbit(bit_width::for_count(count))? as usize;
    table
        .prefix(uri_id, id)
        .cloned()
        .map(Some)
        .ok_or(Error::InvalidCompactId(id))
}

// ============================================================================
// Helpers
// ============================================================================

/// Länge (minus `offset`) + Zeichen.
fn decode_literal(reader: &mut BitReader<'_>, offset: u64) -> Result<String> {
    let len = unsigned_integer::decode(reader)?;
    let mut out = String::new();
    read_chars(reader, len.saturating_sub(offset), &mut out)?;
    Ok(out)
}

fn read_chars(reader: &mut BitReader<'_>, len: u64, out: &mut String) -> Result<()> {
    if len > MAX_NAME_LENGTH {
        return Err(Error::StringLengthExceeded { length: len, max: MAX_NAME_LENGTH });
    }
    string::decode_chars_into(reader, len, None, out)
}
