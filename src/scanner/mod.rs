//! EXI Stream Scanner (EXI 6, 5).
//!
//! Pull-Decoder: [`Scanner::next_event`] liefert ein Event nach dem anderen
//! als [`EventDescription`], deren Text in den Puffern des Scanners liegt.
//!
//! Ablauf pro Event:
//! 1. Event Code gegen das Tupel der aktuellen Grammar-Position lesen
//! 2. Inhalt lesen (QName, Prefix, Wert)
//! 3. Resolver fortschreiben (Lernen, Element-Stack)
//!
//! Bei `preserve.prefixes` kann der Prefix eines SE erst aus einem folgenden
//! NS-Event mit `local_element_ns` hervorgehen. Der Scanner liest deshalb
//! nach einem SE ohne Prefix die NS-Events voraus und puffert sie.
//!
//! # Beispiel
//!
//! ```
//! use erxi_stream::{CodecConfig, EventContent, GrammarTable, Scanner};
//!
//! // SD, SE(*) "a", EE, ED ohne Schema
//! let bytes = erxi_stream::encode(
//!     &[
//!         erxi_stream::ExiEvent::StartDocument,
//!         erxi_stream::ExiEvent::start_element("", "a"),
//!         erxi_stream::ExiEvent::EndElement,
//!         erxi_stream::ExiEvent::EndDocument,
//!     ],
//!     &CodecConfig::default(),
//!     &GrammarTable::schemaless(),
//! )
//! .unwrap();
//!
//! let grammar = GrammarTable::schemaless();
//! let mut scanner = Scanner::new(&bytes[..], &CodecConfig::default(), &grammar).unwrap();
//! let mut names = Vec::new();
//! while let Some(event) = scanner.next_event().unwrap() {
//!     if let EventContent::StartElement(qname) = event.content {
//!         names.push(qname.local_name.to_string());
//!     }
//! }
//! assert_eq!(names, ["a"]);
//! ```

use std::collections::VecDeque;
use std::io::{self, Read};
use std::rc::Rc;

use crate::bitstream::BitReader;
use crate::characters::{Characters, EventContent, EventDescription, TextRef};
use crate::event_code::EventType;
use crate::grammar::{CompiledGrammar, TypeId};
use crate::options::{CodecConfig, ExiOptions};
use crate::qname::{self, ExpandedNameId, QName};
use crate::rcs;
use crate::resolver::{Entry, Resolver};
use crate::string_table::{StringTable, URI_ID_XSI, ValueKey, XSI_NIL, XSI_TYPE};
use crate::value::{self, CodecId, DecodeContext, TypeRef};
use crate::{Error, Result, header, string};

/// Puffergröße beim Überspringen nicht abgeholter Binärdaten.
const SKIP_BUFFER: usize = 4096;

/// Decoded event whose text still points into the Scanner's buffers.
#[derive(Debug)]
enum Pending {
    None,
    StartElement(QName),
    EndElement(Vec<Rc<str>>),
    Attribute(QName, TextRef),
    XsiType(QName),
    XsiNil(bool),
    Characters(TextRef),
    BinaryData(u64),
    Namespace { uri: Rc<str>, prefix: Rc<str>, local_element_ns: bool },
    Comment(TextRef),
    ProcessingInstruction(Rc<str>, TextRef),
    DocType { name: Rc<str>, public: Rc<str>, system: Rc<str>, text: Rc<str> },
    EntityReference(Rc<str>),
}

#[derive(Debug)]
struct Decoded {
    event_type: EventType,
    content: Pending,
}

/// EXI stream decoder with a pull API.
pub struct Scanner<'a> {
    reader: BitReader<'a>,
    options: ExiOptions,
    grammar: &'a dyn CompiledGrammar,
    resolver: Resolver<'a>,
    table: StringTable,
    /// Zeichen-Arena für volatile Werte.
    arena: String,
    /// Octet-Arena für Binärwerte und Chunks.
    octets: Vec<u8>,
    /// Vorausgelesene Events.
    pending: VecDeque<Decoded>,
    /// Prefixe, die je offener Elementtiefe deklariert wurden.
    bindings: Vec<Vec<Rc<str>>>,
    binary_chunk_size: Option<usize>,
    /// Noch nicht abgeholte Octets des aktuellen Binärwerts.
    binary_remaining: u64,
    finished: bool,
}

impl<'a> Scanner<'a> {
    /// Reads the header and prepares the body reader.
    ///
    /// The header is read without buffering so the body reader continues at
    /// the exact bit after the header. `config.options()` apply when the
    /// header carries no options document.
    ///
    /// # Errors
    ///
    /// - configuration errors of [`CodecConfig::validate`]
    /// - header errors of [`header::decode`]
    /// - `UnsupportedFeature` for compression and pre-compression
    pub fn new(source: impl Read + 'a, config: &CodecConfig, grammar: &'a dyn CompiledGrammar) -> Result<Self> {
        config.validate()?;
        let mut header_reader = BitReader::unbuffered(source);
        let options = header::decode(&mut header_reader, config.options())?.into_options();
        options.validate()?;
        options.check_supported()?;

        let (source, residue) = header_reader.into_residue();
        let mut reader = BitReader::inherit_residue(source, residue);
        reader.set_byte_aligned(options.is_byte_aligned());

        Ok(Self {
            reader,
            table: StringTable::for_grammar(grammar, &options),
            resolver: Resolver::new(grammar, &options),
            options,
            grammar,
            arena: String::new(),
            octets: Vec::new(),
            pending: VecDeque::new(),
            bindings: Vec::new(),
            binary_chunk_size: config.binary_chunk_size(),
            binary_remaining: 0,
            finished: false,
        })
    }

    /// Effective options of the stream (header or out-of-band).
    pub fn options(&self) -> &ExiOptions {
        &self.options
    }

    pub fn string_table(&self) -> &StringTable {
        &self.table
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.resolver.depth()
    }

    /// Next event, `None` after ED.
    ///
    /// Volatile text of the returned event is valid until the next call.
    pub fn next_event(&mut self) -> Result<Option<EventDescription<'_>>> {
        if self.pending.is_empty() {
            self.arena.clear();
            self.octets.clear();
            let Some(decoded) = self.decode_one()? else {
                return Ok(None);
            };
            let needs_prefix = self.options.preserve().prefixes
                && matches!(&decoded.content, Pending::StartElement(q) if q.prefix.is_none());
            self.pending.push_back(decoded);
            if needs_prefix {
                self.scan_element_prefixes()?;
            }
        }
        let Some(decoded) = self.pending.pop_front() else {
            return Ok(None);
        };
        Ok(Some(self.describe(decoded)))
    }

    /// Octets of the binary value announced by the last
    /// [`EventContent::BinaryData`] event.
    pub fn binary_data(&mut self) -> BinaryDataSource<'_, 'a> {
        BinaryDataSource { scanner: self }
    }

    /// Liest NS-Events nach einem SE ohne Prefix voraus, bis ein anderes
    /// Event folgt. Ein NS mit `local_element_ns` liefert den Prefix des SE.
    ///
    /// Die Vorschau endet beim ersten Event, das weder NS noch SE ist:
    /// NS-Events eines Elements stehen vor seinen AT-Events und vor
    /// xsi:type/xsi:nil (EXI 4), der Attributlauf kann den Prefix also nicht
    /// mehr ändern. Attribute und Binärdaten werden danach einzeln gelesen.
    fn scan_element_prefixes(&mut self) -> Result<()> {
        let mut target = self.pending.len() - 1;
        while let Some(next) = self.decode_one()? {
            let (prefix, stop) = match &next.content {
                Pending::Namespace { prefix, local_element_ns, .. } => {
                    (local_element_ns.then(|| Rc::clone(prefix)), false)
                }
                Pending::StartElement(qname) if qname.prefix.is_none() => {
                    target = self.pending.len();
                    (None, false)
                }
                _ => (None, true),
            };
            if let Some(prefix) = prefix
                && let Some(Decoded { content: Pending::StartElement(qname), .. }) = self.pending.get_mut(target)
                && qname.prefix.is_none()
            {
                qname.prefix = Some(prefix);
            }
            self.pending.push_back(next);
            if stop {
                break;
            }
        }
        Ok(())
    }

    fn describe(&self, decoded: Decoded) -> EventDescription<'_> {
        let content = match decoded.content {
            Pending::None => EventContent::None,
            Pending::StartElement(qname) => EventContent::StartElement(qname),
            Pending::EndElement(out_of_scope) => EventContent::EndElement { out_of_scope },
            Pending::Attribute(name, value) => EventContent::Attribute { name, value: self.view(&value) },
            Pending::XsiType(qname) => EventContent::XsiType(qname),
            Pending::XsiNil(nil) => EventContent::XsiNil(nil),
            Pending::Characters(value) => EventContent::Characters(self.view(&value)),
            Pending::BinaryData(length) => EventContent::BinaryData { length },
            Pending::Namespace { uri, prefix, local_element_ns } => {
                EventContent::NamespaceDeclaration { uri, prefix, local_element_ns }
            }
            Pending::Comment(text) => EventContent::Comment(self.view(&text)),
            Pending::ProcessingInstruction(target, data) => {
                EventContent::ProcessingInstruction { target, data: self.view(&data) }
            }
            Pending::DocType { name, public, system, text } => EventContent::DocType { name, public, system, text },
            Pending::EntityReference(name) => EventContent::EntityReference(name),
        };
        EventDescription { event_type: decoded.event_type, content }
    }

    fn view(&self, text: &TextRef) -> Characters<'_> {
        text.view(&self.arena, &self.octets)
    }

    // ========================================================================
    // Event-Dekodierung
    // ========================================================================

    fn decode_one(&mut self) -> Result<Option<Decoded>> {
        if self.finished {
            return Ok(None);
        }
        self.skip_binary()?;

        let tuple = self.resolver.tuple(&self.table)?;
        let (code, entry) = tuple.decode(&mut self.reader)?;
        let entry = *entry;
        log::trace!("{code} {} at {:?}", entry.event, self.resolver.position());

        let content = match entry.event {
            EventType::StartDocument => {
                self.resolver.on_start_document(&entry);
                Pending::None
            }
            EventType::EndDocument => {
                self.resolver.on_end_document();
                self.finished = true;
                Pending::None
            }
            EventType::StartElement { name, .. } => self.start_element(&entry, name)?,
            EventType::StartElementNs { uri } => {
                let local_name = qname::decode_local_name(&mut self.reader, &mut self.table, uri)?;
                self.start_element(&entry, ExpandedNameId::new(uri, local_name))?
            }
            EventType::StartElementAny => {
                let name = qname::decode_qname(&mut self.reader, &mut self.table)?;
                self.start_element(&entry, name)?
            }
            EventType::EndElement => {
                self.resolver.on_end_element();
                Pending::EndElement(self.bindings.pop().unwrap_or_default())
            }
            EventType::Attribute { name, ty } => self.attribute(&entry, name, ty)?,
            EventType::AttributeNs { uri } => {
                let local_name = qname::decode_local_name(&mut self.reader, &mut self.table, uri)?;
                let name = ExpandedNameId::new(uri, local_name);
                let ty = self.wildcard_type(name)?;
                self.attribute(&entry, name, ty)?
            }
            EventType::AttributeAny => {
                let name = qname::decode_qname(&mut self.reader, &mut self.table)?;
                let ty = self.wildcard_type(name)?;
                self.attribute(&entry, name, ty)?
            }
            EventType::AttributeInvalid { name } => self.attribute(&entry, name, None)?,
            EventType::AttributeAnyUntyped => {
                let name = qname::decode_qname(&mut self.reader, &mut self.table)?;
                self.attribute(&entry, name, None)?
            }
            EventType::XsiType => {
                let qname = self.qname_value()?;
                self.resolver.on_other(&entry);
                self.resolver.on_xsi_type(self.grammar.named_type(&qname.uri, &qname.local_name));
                Pending::XsiType(qname)
            }
            EventType::XsiNil => {
                self.resolver.on_other(&entry);
                if self.options.preserve().lexical_values {
                    let name = ExpandedNameId::new(URI_ID_XSI, XSI_NIL);
                    let mut input = DecodeContext {
                        reader: &mut self.reader,
                        table: &mut self.table,
                        key: name.value_key(),
                        arena: &mut self.arena,
                        octets: &mut self.octets,
                    };
                    let value = value::read_value_string(&mut input, Some(&rcs::BOOLEAN))?;
                    self.nil_value(QName::xsi_nil(), value)
                } else {
                    let nil = self.reader.read_boolean()?;
                    self.resolver.on_xsi_nil(nil);
                    Pending::XsiNil(nil)
                }
            }
            EventType::Characters { ty } => {
                let key = self.element_key()?;
                let content = if self.chunks_binary(ty) {
                    let length = value::read_length(&mut self.reader)?;
                    self.binary_remaining = length;
                    Pending::BinaryData(length)
                } else {
                    Pending::Characters(self.read_value(Some(ty), key)?)
                };
                self.resolver.on_characters(&entry);
                content
            }
            EventType::CharactersUntyped => {
                let key = self.element_key()?;
                let value = self.read_value(None, key)?;
                self.resolver.on_characters(&entry);
                Pending::Characters(value)
            }
            EventType::NamespaceDeclaration => {
                let uri_id = qname::decode_uri(&mut self.reader, &mut self.table)?;
                let prefix_id = qname::decode_ns_prefix(&mut self.reader, &mut self.table, uri_id)?;
                let local_element_ns = self.reader.read_boolean()?;
                let uri = Rc::clone(self.table.uri(uri_id).ok_or(Error::InvalidCompactId(uri_id))?);
                let prefix =
                    Rc::clone(self.table.prefix(uri_id, prefix_id).ok_or(Error::InvalidCompactId(prefix_id))?);
                if let Some(scope) = self.bindings.last_mut() {
                    scope.push(Rc::clone(&prefix));
                }
                self.resolver.on_other(&entry);
                Pending::Namespace { uri, prefix, local_element_ns }
            }
            EventType::SelfContained => return Err(Error::UnsupportedFeature("self-contained elements")),
            EventType::EntityReference => {
                let name = string::decode(&mut self.reader)?;
                self.resolver.on_other(&entry);
                Pending::EntityReference(name.into())
            }
            EventType::Comment => {
                let text = self.literal()?;
                self.resolver.on_other(&entry);
                Pending::Comment(text)
            }
            EventType::ProcessingInstruction => {
                let target = string::decode(&mut self.reader)?;
                let data = self.literal()?;
                self.resolver.on_other(&entry);
                Pending::ProcessingInstruction(target.into(), data)
            }
            EventType::DocType => {
                let name = string::decode(&mut self.reader)?;
                let public = string::decode(&mut self.reader)?;
                let system = string::decode(&mut self.reader)?;
                let text = string::decode(&mut self.reader)?;
                self.resolver.on_other(&entry);
                Pending::DocType { name: name.into(), public: public.into(), system: system.into(), text: text.into() }
            }
        };
        Ok(Some(Decoded { event_type: entry.event, content }))
    }

    fn start_element(&mut self, entry: &Entry, name: ExpandedNameId) -> Result<Pending> {
        let mut qname = name.resolve(&self.table)?;
        qname.prefix = self.qname_prefix(name.uri)?;
        self.resolver.on_start_element(entry, name, &self.table);
        self.bindings.push(Vec::new());
        Ok(Pending::StartElement(qname))
    }

    /// AT-Inhalt. `xsi:type` über AT(*) trägt einen QName, `xsi:nil` einen
    /// String, der bei gültiger Form als XsiNil gemeldet wird (siehe
    /// [`Self::nil_value`]).
    fn attribute(&mut self, entry: &Entry, name: ExpandedNameId, ty: Option<TypeId>) -> Result<Pending> {
        let mut qname = name.resolve(&self.table)?;
        qname.prefix = self.qname_prefix(name.uri)?;

        if name == ExpandedNameId::new(URI_ID_XSI, XSI_TYPE) {
            let value = self.qname_value()?;
            self.resolver.on_attribute(entry, name);
            self.resolver.on_xsi_type(self.grammar.named_type(&value.uri, &value.local_name));
            return Ok(Pending::XsiType(value));
        }

        let value = self.read_value(ty, name.value_key())?;
        self.resolver.on_attribute(entry, name);
        if name == ExpandedNameId::new(URI_ID_XSI, XSI_NIL) {
            return Ok(self.nil_value(qname, value));
        }
        Ok(Pending::Attribute(qname, value))
    }

    /// Text eines `xsi:nil`. Gültige Werte schalten die Grammar; gemeldet
    /// wird XsiNil, außer unter Preserve.lexicalValues bei einer anderen
    /// Form als "true"/"false", dann bleibt das Literal als AT erhalten.
    fn nil_value(&mut self, qname: QName, value: TextRef) -> Pending {
        let (nil, canonical) = {
            let chars = value.view(&self.arena, &self.octets);
            let text = chars.text();
            (value::parse_nil(&text), matches!(&*text, "true" | "false"))
        };
        let Some(nil) = nil else {
            return Pending::Attribute(qname, value);
        };
        self.resolver.on_xsi_nil(nil);
        if canonical || !self.options.preserve().lexical_values {
            Pending::XsiNil(nil)
        } else {
            Pending::Attribute(qname, value)
        }
    }

    fn wildcard_type(&self, name: ExpandedNameId) -> Result<Option<TypeId>> {
        let qname = name.resolve(&self.table)?;
        Ok(self.resolver.wildcard_attribute_type(&qname.uri, &qname.local_name))
    }

    /// Prefix eines SE/AT-QNames (nur bei `preserve.prefixes`).
    fn qname_prefix(&mut self, uri_id: usize) -> Result<Option<Rc<str>>> {
        if !self.options.preserve().prefixes {
            return Ok(None);
        }
        qname::decode_qname_prefix(&mut self.reader, &self.table, uri_id)
    }

    /// QName-Wert von `xsi:type` (EXI 7.1.7).
    fn qname_value(&mut self) -> Result<QName> {
        let uri = qname::decode_uri(&mut self.reader, &mut self.table)?;
        let local_name = qname::decode_local_name(&mut self.reader, &mut self.table, uri)?;
        let mut qname = ExpandedNameId::new(uri, local_name).resolve(&self.table)?;
        qname.prefix = self.qname_prefix(uri)?;
        Ok(qname)
    }

    fn element_key(&self) -> Result<ValueKey> {
        self.resolver
            .element_name()
            .map(ExpandedNameId::value_key)
            .ok_or_else(|| Error::no_matching_production("CH", "outside of an element"))
    }

    fn read_value(&mut self, ty: Option<TypeId>, key: ValueKey) -> Result<TextRef> {
        let ty = match ty {
            Some(id) => TypeRef::typed(self.grammar, id),
            None => TypeRef::untyped(self.grammar),
        };
        let codec = value::codec_for(ty.info, self.options.preserve().lexical_values);
        let mut input = DecodeContext {
            reader: &mut self.reader,
            table: &mut self.table,
            key,
            arena: &mut self.arena,
            octets: &mut self.octets,
        };
        codec.read(ty, &mut input)
    }

    /// Kommentar- oder PI-Text als Literal in die Arena.
    fn literal(&mut self) -> Result<TextRef> {
        let text = string::decode(&mut self.reader)?;
        let start = self.arena.len();
        self.arena.push_str(&text);
        Ok(TextRef::Arena(start..self.arena.len()))
    }

    fn chunks_binary(&self, ty: TypeId) -> bool {
        self.binary_chunk_size.is_some()
            && value::codec_for(self.grammar.type_info(ty), self.options.preserve().lexical_values).codec_id()
                == CodecId::Binary
    }

    /// Überspringt Binärdaten, die der Aufrufer nicht abgeholt hat.
    fn skip_binary(&mut self) -> Result<()> {
        if self.binary_remaining == 0 {
            return Ok(());
        }
        log::debug!("skipping {} unread binary octets", self.binary_remaining);
        let mut scratch = [0u8; SKIP_BUFFER];
        while self.binary_remaining > 0 {
            let n = self.binary_remaining.min(SKIP_BUFFER as u64) as usize;
            self.reader.read_bytes(&mut scratch[..n])?;
            self.binary_remaining -= n as u64;
        }
        Ok(())
    }
}

/// Chunked access to the octets of a binary value.
///
/// Nicht abgeholte Octets überspringt der Scanner beim nächsten
/// `next_event`.
pub struct BinaryDataSource<'s, 'a> {
    scanner: &'s mut Scanner<'a>,
}

impl BinaryDataSource<'_, '_> {
    /// Octets not yet handed out.
    pub fn remaining(&self) -> u64 {
        self.scanner.binary_remaining
    }

    /// Next chunk of at most the configured chunk size, `None` when the
    /// value is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        let scanner = &mut *self.scanner;
        if scanner.binary_remaining == 0 {
            return Ok(None);
        }
        let limit = scanner.binary_chunk_size.unwrap_or(SKIP_BUFFER) as u64;
        let n = scanner.binary_remaining.min(limit) as usize;
        scanner.octets.clear();
        scanner.octets.resize(n, 0);
        scanner.reader.read_bytes(&mut scanner.octets)?;
        scanner.binary_remaining -= n as u64;
        Ok(Some(&scanner.octets))
    }
}

impl Read for BinaryDataSource<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let scanner = &mut *self.scanner;
        let n = scanner.binary_remaining.min(buf.len() as u64) as usize;
        scanner.reader.read_bytes(&mut buf[..n]).map_err(io::Error::other)?;
        scanner.binary_remaining -= n as u64;
        Ok(n)
    }
}
