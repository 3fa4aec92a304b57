//! EXI Stream Scriber (EXI 6, 5).
//!
//! Push-Encoder: eine Methode pro Event-Art. Jeder Aufruf berechnet das
//! Tupel der aktuellen Grammar-Position wie der Scanner, sucht die
//! passende Produktion und schreibt Event Code und Inhalt.
//!
//! Auswahl bei mehreren Kandidaten (EXI 6.1, 8.5.4.4):
//! - SE: SE(qname) vor SE(uri:*) vor SE(*)
//! - AT: typisiertes AT(qname), wenn der Wert gültig ist, sonst AT(qname)
//!   [untyped]; dann AT(uri:*), AT(*) und AT(*) [untyped]
//! - CH: typisiertes CH, sonst CH [untyped]
//!
//! Ohne passende Produktion (strict) gibt es `NoMatchingProduction`.
//!
//! # Beispiel
//!
//! ```
//! use erxi_stream::{CodecConfig, GrammarTable, QName, Scriber};
//!
//! let grammar = GrammarTable::schemaless();
//! let mut out = Vec::new();
//! {
//!     let mut scriber = Scriber::new(&mut out, &CodecConfig::default().with_cookie(), &grammar).unwrap();
//!     scriber.start_document().unwrap();
//!     scriber.start_element(&QName::new("", "root")).unwrap();
//!     scriber.attribute(&QName::new("", "id"), "7").unwrap();
//!     scriber.characters("hello").unwrap();
//!     scriber.end_element().unwrap();
//!     scriber.end_document().unwrap();
//!     scriber.finish().unwrap();
//! }
//! assert_eq!(&out[..4], b"$EXI");
//! ```

use std::borrow::Cow;
use std::io::{self, Write};
use std::rc::Rc;

use crate::bitstream::BitWriter;
use crate::event::ExiEvent;
use crate::event_code::{EventCode, EventType, Tuple};
use crate::grammar::{CompiledGrammar, TypeId};
use crate::options::{CodecConfig, ExiOptions};
use crate::qname::{self, ExpandedNameId, QName};
use crate::rcs;
use crate::resolver::{Entry, Resolver};
use crate::scribble::Scribble;
use crate::string_table::{StringTable, URI_ID_XSI, ValueKey, XSI_NIL, XSI_TYPE};
use crate::value::{self, CodecId, EncodeContext, TypeRef};
use crate::{Error, Result, header, string, unsigned_integer};

/// Dokument-Phase für die Reihenfolgeprüfung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Prolog,
    Body,
    Binary { declared: u64, written: u64 },
    Finished,
}

/// EXI stream encoder with a push API.
pub struct Scriber<'a> {
    writer: BitWriter<'a>,
    options: ExiOptions,
    grammar: &'a dyn CompiledGrammar,
    resolver: Resolver<'a>,
    table: StringTable,
    scribble: Scribble,
    phase: Phase,
}

impl<'a> Scriber<'a> {
    /// Writes the header and prepares the body writer.
    ///
    /// # Errors
    ///
    /// - configuration errors of [`CodecConfig::validate`]
    /// - `UnsupportedFeature` for compression and pre-compression
    pub fn new(sink: impl Write + 'a, config: &CodecConfig, grammar: &'a dyn CompiledGrammar) -> Result<Self> {
        config.validate()?;
        let options = config.options().clone();
        options.check_supported()?;

        let mut writer = BitWriter::new(sink);
        let header_options = config.include_options().then_some(&options);
        header::encode(&mut writer, config.include_cookie(), header_options, options.is_byte_aligned())?;
        writer.set_byte_aligned(options.is_byte_aligned());
        log::debug!(
            "EXI header written: cookie={}, options={}, alignment={:?}",
            config.include_cookie(),
            config.include_options(),
            options.alignment()
        );

        Ok(Self {
            writer,
            table: StringTable::for_grammar(grammar, &options),
            resolver: Resolver::new(grammar, &options),
            options,
            grammar,
            scribble: Scribble::new(),
            phase: Phase::Prolog,
        })
    }

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

    /// Bits written so far, header included.
    pub fn bit_position(&self) -> u64 {
        self.writer.bit_position()
    }

    /// Pads the last byte, flushes and returns the sink.
    ///
    /// # Errors
    ///
    /// `OrderingViolation` before ED.
    pub fn finish(self) -> Result<Box<dyn Write + 'a>> {
        if self.phase != Phase::Finished {
            return Err(Error::ordering_violation("ED", "finish"));
        }
        self.writer.finish()
    }

    /// Writes one owned event.
    pub fn event(&mut self, event: &ExiEvent) -> Result<()> {
        match event {
            ExiEvent::StartDocument => self.start_document(),
            ExiEvent::EndDocument => self.end_document(),
            ExiEvent::StartElement(name) => self.start_element(name),
            ExiEvent::EndElement => self.end_element(),
            ExiEvent::Attribute(at) => self.attribute(&at.qname, &at.value),
            ExiEvent::XsiType(name) => self.xsi_type(name),
            ExiEvent::XsiNil(nil) => self.xsi_nil(*nil),
            ExiEvent::Characters(ch) => self.characters(&ch.value),
            ExiEvent::NamespaceDeclaration(ns) => {
                self.namespace_declaration(&ns.uri, &ns.prefix, ns.local_element_ns)
            }
            ExiEvent::Comment(cm) => self.comment(&cm.text),
            ExiEvent::ProcessingInstruction(pi) => self.processing_instruction(&pi.name, &pi.text),
            ExiEvent::DocType(dt) => self.doctype(&dt.name, &dt.public, &dt.system, &dt.text),
            ExiEvent::EntityReference(er) => self.entity_reference(&er.name),
            ExiEvent::SelfContained => self.self_contained(),
        }
    }

    // ========================================================================
    // Dokument
    // ========================================================================

    pub fn start_document(&mut self) -> Result<()> {
        if self.phase != Phase::Prolog {
            return Err(Error::ordering_violation("start of stream", "SD"));
        }
        let (code, entry) = self.select("SD", |e| e.event == EventType::StartDocument)?;
        self.emit(code, &entry)?;
        self.resolver.on_start_document(&entry);
        self.phase = Phase::Body;
        Ok(())
    }

    pub fn end_document(&mut self) -> Result<()> {
        self.check_body("ED")?;
        if self.resolver.depth() > 0 {
            return Err(Error::ordering_violation("EE", "ED"));
        }
        let (code, entry) = self.select("ED", |e| e.event == EventType::EndDocument)?;
        self.emit(code, &entry)?;
        self.resolver.on_end_document();
        self.phase = Phase::Finished;
        Ok(())
    }

    // ========================================================================
    // Elemente
    // ========================================================================

    pub fn start_element(&mut self, name: &QName) -> Result<()> {
        self.check_body("SE")?;
        let ids = ExpandedNameId::lookup(&self.table, &name.uri, &name.local_name);
        let uri_id = self.table.lookup_uri(&name.uri);
        let tuple = self.resolver.tuple(&self.table)?;
        let found = ids
            .and_then(|n| tuple.locate(|e| matches!(e.event, EventType::StartElement { name, .. } if name == n)))
            .or_else(|| uri_id.and_then(|u| tuple.locate(|e| e.event == EventType::StartElementNs { uri: u })))
            .or_else(|| tuple.locate(|e| e.event == EventType::StartElementAny));
        let (code, entry) = match found {
            Some((code, entry)) => (code, *entry),
            None => return Err(self.no_production(format!("SE({name})"))),
        };
        self.emit(code, &entry)?;

        let ids = match entry.event {
            EventType::StartElement { name, .. } => name,
            EventType::StartElementNs { uri } => {
                let local_name = qname::encode_local_name(&mut self.writer, &mut self.table, uri, &name.local_name)?;
                ExpandedNameId::new(uri, local_name)
            }
            _ => qname::encode_qname(&mut self.writer, &mut self.table, name)?,
        };
        self.write_prefix(ids.uri, name.prefix.as_deref())?;
        self.resolver.on_start_element(&entry, ids, &self.table);
        Ok(())
    }

    pub fn end_element(&mut self) -> Result<()> {
        self.check_body("EE")?;
        if self.resolver.depth() == 0 {
            return Err(Error::ordering_violation("SE", "EE"));
        }
        let (code, entry) = self.select("EE", |e| e.event == EventType::EndElement)?;
        self.emit(code, &entry)?;
        self.resolver.on_end_element();
        Ok(())
    }

    /// NS (EXI 4); ignored unless prefixes are preserved.
    pub fn namespace_declaration(&mut self, uri: &str, prefix: &str, local_element_ns: bool) -> Result<()> {
        self.check_body("NS")?;
        if !self.options.preserve().prefixes {
            return Ok(());
        }
        self.check_start_tag("NS")?;
        let (code, entry) = self.select("NS", |e| e.event == EventType::NamespaceDeclaration)?;
        self.emit(code, &entry)?;
        let uri_id = qname::encode_uri(&mut self.writer, &mut self.table, uri)?;
        qname::encode_ns_prefix(&mut self.writer, &mut self.table, uri_id, prefix)?;
        self.writer.write_boolean(local_element_ns)?;
        self.resolver.on_other(&entry);
        Ok(())
    }

    // ========================================================================
    // Attribute
    // ========================================================================

    /// AT. `xsi:type` and a valid `xsi:nil` are routed to [`Self::xsi_type`]
    /// and [`Self::xsi_nil`].
    pub fn attribute(&mut self, name: &QName, value: &str) -> Result<()> {
        self.check_body("AT")?;
        if name.is_xsi_type() {
            let type_name = self.type_name_from_lexical(value)?;
            return self.xsi_type(&type_name);
        }
        if name.is_xsi_nil()
            && let Some(nil) = value::parse_nil(value)
        {
            return self.write_xsi_nil(nil, value);
        }
        self.check_start_tag("AT")?;

        let (code, entry, ty) = self.select_attribute(name, value)?;
        self.emit(code, &entry)?;
        let ids = self.write_attribute_name(&entry, name)?;
        match ty {
            Some(ty) => self.write_typed(ty, ids.value_key())?,
            None => self.write_untyped(value, ids.value_key())?,
        }
        self.resolver.on_attribute(&entry, ids);
        Ok(())
    }

    /// Production for an attribute and the type its value was staged with.
    fn select_attribute(&mut self, name: &QName, value: &str) -> Result<(EventCode, Entry, Option<TypeId>)> {
        let ids = ExpandedNameId::lookup(&self.table, &name.uri, &name.local_name);
        let uri_id = self.table.lookup_uri(&name.uri);
        let tuple = self.resolver.tuple(&self.table)?;

        if let Some(n) = ids {
            if let Some((code, entry)) =
                tuple.locate(|e| matches!(e.event, EventType::Attribute { name, .. } if name == n))
            {
                let entry = *entry;
                match entry.event {
                    EventType::Attribute { ty: Some(ty), .. } if self.stage(ty, value) => {
                        return Ok((code, entry, Some(ty)));
                    }
                    EventType::Attribute { ty: None, .. } => return Ok((code, entry, None)),
                    _ => log::warn!("AT({name}) value {value:?} is not valid for its type, writing it untyped"),
                }
            }
            if let Some((code, entry)) = tuple.locate(|e| e.event == EventType::AttributeInvalid { name: n }) {
                return Ok((code, *entry, None));
            }
        }

        let wildcard_type = self.resolver.wildcard_attribute_type(&name.uri, &name.local_name);
        let typed = match wildcard_type {
            Some(ty) => self.stage(ty, value),
            None => true,
        };
        if typed {
            let found = uri_id
                .and_then(|u| tuple.locate(|e| e.event == EventType::AttributeNs { uri: u }))
                .or_else(|| tuple.locate(|e| e.event == EventType::AttributeAny));
            if let Some((code, entry)) = found {
                return Ok((code, *entry, wildcard_type));
            }
        }
        match tuple.locate(|e| e.event == EventType::AttributeAnyUntyped) {
            Some((code, entry)) => Ok((code, *entry, None)),
            None => Err(self.no_production(format!("AT({name})"))),
        }
    }

    /// Name eines AT-Events je nach Produktion, dann der Prefix.
    fn write_attribute_name(&mut self, entry: &Entry, name: &QName) -> Result<ExpandedNameId> {
        let ids = match entry.event {
            EventType::Attribute { name, .. } | EventType::AttributeInvalid { name } => name,
            EventType::AttributeNs { uri } => {
                let local_name = qname::encode_local_name(&mut self.writer, &mut self.table, uri, &name.local_name)?;
                ExpandedNameId::new(uri, local_name)
            }
            _ => qname::encode_qname(&mut self.writer, &mut self.table, name)?,
        };
        self.write_prefix(ids.uri, name.prefix.as_deref())?;
        Ok(ids)
    }

    /// `xsi:type` (EXI 8.5.4.4). Switches the element grammar when the
    /// grammar knows the type.
    pub fn xsi_type(&mut self, type_name: &QName) -> Result<()> {
        self.check_body("AT(xsi:type)")?;
        self.check_start_tag("AT(xsi:type)")?;
        let entry = match self.select("AT(xsi:type)", |e| e.event == EventType::XsiType) {
            Ok((code, entry)) => {
                self.emit(code, &entry)?;
                entry
            }
            Err(_) => {
                let (code, entry) = self.select_xsi_attribute(XSI_TYPE, "AT(xsi:type)")?;
                self.emit(code, &entry)?;
                self.write_attribute_name(&entry, &QName::xsi_type())?;
                entry
            }
        };

        let uri_id = qname::encode_uri(&mut self.writer, &mut self.table, &type_name.uri)?;
        qname::encode_local_name(&mut self.writer, &mut self.table, uri_id, &type_name.local_name)?;
        self.write_prefix(uri_id, type_name.prefix.as_deref())?;

        if entry.event == EventType::XsiType {
            self.resolver.on_other(&entry);
        } else {
            self.resolver.on_attribute(&entry, ExpandedNameId::new(URI_ID_XSI, XSI_TYPE));
        }
        self.resolver.on_xsi_type(self.grammar.named_type(&type_name.uri, &type_name.local_name));
        Ok(())
    }

    /// `xsi:nil`. Schema-informed states write a boolean, built-in
    /// grammars an untyped string.
    ///
    /// Writes the canonical form. [`Scriber::attribute`] with `xsi:nil`
    /// keeps its literal ("1", " true ") when lexical values are preserved;
    /// otherwise the literal is reduced to the boolean.
    pub fn xsi_nil(&mut self, nil: bool) -> Result<()> {
        self.write_xsi_nil(nil, if nil { "true" } else { "false" })
    }

    fn write_xsi_nil(&mut self, nil: bool, lexical: &str) -> Result<()> {
        self.check_body("AT(xsi:nil)")?;
        self.check_start_tag("AT(xsi:nil)")?;
        let preserve_lexical = self.options.preserve().lexical_values;
        let lexical = match (preserve_lexical, nil) {
            (true, _) => lexical,
            (false, true) => "true",
            (false, false) => "false",
        };
        if let Ok((code, entry)) = self.select("AT(xsi:nil)", |e| e.event == EventType::XsiNil) {
            self.emit(code, &entry)?;
            if preserve_lexical {
                // Boolean als String mit dessen RCS (EXI 7.1.10)
                let key = ExpandedNameId::new(URI_ID_XSI, XSI_NIL).value_key();
                let mut out = EncodeContext { writer: &mut self.writer, table: &mut self.table, key };
                value::write_value_string(&mut out, lexical, Some(&rcs::BOOLEAN))?;
            } else {
                self.writer.write_boolean(nil)?;
            }
            self.resolver.on_other(&entry);
        } else {
            let (code, entry) = self.select_xsi_attribute(XSI_NIL, "AT(xsi:nil)")?;
            self.emit(code, &entry)?;
            let ids = self.write_attribute_name(&entry, &QName::xsi_nil())?;
            self.write_untyped(lexical, ids.value_key())?;
            self.resolver.on_attribute(&entry, ids);
        }
        self.resolver.on_xsi_nil(nil);
        Ok(())
    }

    /// Gelerntes AT(xsi:…) oder AT(*) der Built-in Grammar.
    fn select_xsi_attribute(&mut self, local_name: usize, what: &'static str) -> Result<(EventCode, Entry)> {
        let xsi = ExpandedNameId::new(URI_ID_XSI, local_name);
        self.select(what, |e| {
            matches!(e.event, EventType::Attribute { name, ty: None } if name == xsi)
                || e.event == EventType::AttributeAny
                || e.event == EventType::AttributeAnyUntyped
        })
    }

    /// `p:local` eines xsi:type-Attributs über die Prefix-Partitionen.
    fn type_name_from_lexical(&self, value: &str) -> Result<QName> {
        let value = value.trim_matches(value::is_xml_space);
        let (prefix, local_name) = value.split_once(':').unwrap_or(("", value));
        let uri = match self.table.uri_for_prefix(prefix).and_then(|id| self.table.uri(id)) {
            Some(uri) => Rc::clone(uri),
            None if prefix.is_empty() => "".into(),
            None => {
                return Err(Error::no_matching_production(
                    format!("xsi:type=\"{value}\""),
                    "prefix not declared",
                ));
            }
        };
        Ok(QName::with_prefix(uri, local_name, prefix))
    }

    // ========================================================================
    // Inhalt
    // ========================================================================

    pub fn characters(&mut self, value: &str) -> Result<()> {
        self.check_body("CH")?;
        let key = self.element_key("CH")?;
        let tuple = self.resolver.tuple(&self.table)?;
        let mut selected = None;
        if let Some((code, entry)) = tuple.locate(|e| matches!(e.event, EventType::Characters { .. })) {
            let entry = *entry;
            if let EventType::Characters { ty } = entry.event {
                if self.stage(ty, value) {
                    selected = Some((code, entry, Some(ty)));
                } else {
                    log::warn!("CH value {value:?} is not valid for the declared type, writing it untyped");
                }
            }
        }
        if selected.is_none() {
            selected = tuple
                .locate(|e| e.event == EventType::CharactersUntyped)
                .map(|(code, entry)| (code, *entry, None));
        }
        let Some((code, entry, ty)) = selected else {
            return Err(self.no_production("CH"));
        };
        self.emit(code, &entry)?;
        match ty {
            Some(ty) => self.write_typed(ty, key)?,
            None => self.write_untyped(value, key)?,
        }
        self.resolver.on_characters(&entry);
        Ok(())
    }

    /// Starts a binary CH of `length` octets, written in chunks.
    ///
    /// Requires a typed CH production of base64Binary or hexBinary.
    pub fn start_binary_data(&mut self, length: u64) -> Result<BinaryDataSink<'_, 'a>> {
        self.check_body("CH (binary)")?;
        self.element_key("CH (binary)")?;
        let lexical = self.options.preserve().lexical_values;
        let grammar = self.grammar;
        let (code, entry) = self.select("CH (binary)", |e| match e.event {
            EventType::Characters { ty } => value::codec_for(grammar.type_info(ty), lexical).codec_id() == CodecId::Binary,
            _ => false,
        })?;
        self.emit(code, &entry)?;
        unsigned_integer::encode(&mut self.writer, length)?;
        self.resolver.on_characters(&entry);
        self.phase = Phase::Binary { declared: length, written: 0 };
        Ok(BinaryDataSink { scriber: self })
    }

    pub fn binary_data_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let Phase::Binary { declared, written } = self.phase else {
            return Err(Error::ordering_violation("start_binary_data", "binary chunk"));
        };
        let written = written + chunk.len() as u64;
        if written > declared {
            return Err(Error::BinarySizeMismatch { declared, written });
        }
        self.writer.write_bytes(chunk)?;
        self.phase = Phase::Binary { declared, written };
        Ok(())
    }

    /// # Errors
    ///
    /// `BinarySizeMismatch` if fewer octets than declared were written.
    pub fn end_binary_data(&mut self) -> Result<()> {
        let Phase::Binary { declared, written } = self.phase else {
            return Err(Error::ordering_violation("start_binary_data", "end of binary data"));
        };
        if written != declared {
            return Err(Error::BinarySizeMismatch { declared, written });
        }
        self.phase = Phase::Body;
        Ok(())
    }

    /// CM; ignored unless comments are preserved.
    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.check_body("CM")?;
        if !self.options.preserve().comments {
            return Ok(());
        }
        let (code, entry) = self.select("CM", |e| e.event == EventType::Comment)?;
        self.emit(code, &entry)?;
        string::encode(&mut self.writer, text)?;
        self.resolver.on_other(&entry);
        Ok(())
    }

    /// PI; ignored unless processing instructions are preserved.
    pub fn processing_instruction(&mut self, target: &str, data: &str) -> Result<()> {
        self.check_body("PI")?;
        if !self.options.preserve().pis {
            return Ok(());
        }
        let (code, entry) = self.select("PI", |e| e.event == EventType::ProcessingInstruction)?;
        self.emit(code, &entry)?;
        string::encode(&mut self.writer, target)?;
        string::encode(&mut self.writer, data)?;
        self.resolver.on_other(&entry);
        Ok(())
    }

    /// DT; ignored unless DTD information is preserved.
    pub fn doctype(&mut self, name: &str, public: &str, system: &str, text: &str) -> Result<()> {
        self.check_body("DT")?;
        if !self.options.preserve().dtd {
            return Ok(());
        }
        let (code, entry) = self.select("DT", |e| e.event == EventType::DocType)?;
        self.emit(code, &entry)?;
        for part in [name, public, system, text] {
            string::encode(&mut self.writer, part)?;
        }
        self.resolver.on_other(&entry);
        Ok(())
    }

    /// ER; ignored unless DTD information is preserved.
    pub fn entity_reference(&mut self, name: &str) -> Result<()> {
        self.check_body("ER")?;
        if !self.options.preserve().dtd {
            return Ok(());
        }
        let (code, entry) = self.select("ER", |e| e.event == EventType::EntityReference)?;
        self.emit(code, &entry)?;
        string::encode(&mut self.writer, name)?;
        self.resolver.on_other(&entry);
        Ok(())
    }

    /// SC is not supported.
    pub fn self_contained(&mut self) -> Result<()> {
        self.check_body("SC")?;
        Err(Error::UnsupportedFeature("self-contained elements"))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_body(&self, event: &'static str) -> Result<()> {
        match self.phase {
            Phase::Body => Ok(()),
            Phase::Prolog => Err(Error::ordering_violation("SD", event)),
            Phase::Binary { .. } => Err(Error::ordering_violation("end of binary data", event)),
            Phase::Finished => Err(Error::ordering_violation("end of stream", event)),
        }
    }

    fn check_start_tag(&self, event: &'static str) -> Result<()> {
        if self.resolver.in_start_tag() {
            return Ok(());
        }
        Err(Error::ordering_violation("start tag", format!("{event} after element content")))
    }

    fn element_key(&self, event: &'static str) -> Result<ValueKey> {
        self.resolver
            .element_name()
            .map(ExpandedNameId::value_key)
            .ok_or_else(|| Error::ordering_violation("SE", event))
    }

    fn select(&mut self, event: &'static str, pred: impl FnMut(&Entry) -> bool) -> Result<(EventCode, Entry)> {
        let tuple: Rc<Tuple<Entry>> = self.resolver.tuple(&self.table)?;
        match tuple.locate(pred) {
            Some((code, entry)) => Ok((code, *entry)),
            None => Err(self.no_production(event)),
        }
    }

    fn no_production(&self, event: impl Into<Cow<'static, str>>) -> Error {
        Error::no_matching_production(event, format!("{:?}", self.resolver.position()))
    }

    fn emit(&mut self, code: EventCode, entry: &Entry) -> Result<()> {
        log::trace!("{code} {} at {:?}", entry.event, self.resolver.position());
        code.write(&mut self.writer)
    }

    fn write_prefix(&mut self, uri_id: usize, prefix: Option<&str>) -> Result<()> {
        if !self.options.preserve().prefixes {
            return Ok(());
        }
        qname::encode_qname_prefix(&mut self.writer, &self.table, uri_id, prefix)
    }

    fn type_ref(&self, ty: TypeId) -> TypeRef<'a> {
        TypeRef::typed(self.grammar, ty)
    }

    /// Stages `lexical` as a value of `ty` into the scribble.
    fn stage(&mut self, ty: TypeId, lexical: &str) -> bool {
        let ty = self.type_ref(ty);
        let codec = value::codec_for(ty.info, self.options.preserve().lexical_values);
        value::stage(codec, lexical, ty, &mut self.scribble)
    }

    /// Writes the staged value.
    fn write_typed(&mut self, ty: TypeId, key: ValueKey) -> Result<()> {
        let ty = self.type_ref(ty);
        let codec = value::codec_for(ty.info, self.options.preserve().lexical_values);
        let mut out = EncodeContext { writer: &mut self.writer, table: &mut self.table, key };
        codec.write(&self.scribble, ty, &mut out)
    }

    fn write_untyped(&mut self, text: &str, key: ValueKey) -> Result<()> {
        let mut out = EncodeContext { writer: &mut self.writer, table: &mut self.table, key };
        value::write_value_string(&mut out, text, None)
    }
}

/// Writes the octets of a binary value started with
/// [`Scriber::start_binary_data`].
pub struct BinaryDataSink<'s, 'a> {
    scriber: &'s mut Scriber<'a>,
}

impl BinaryDataSink<'_, '_> {
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.scriber.binary_data_chunk(chunk)
    }

    /// Ends the value; fails if the written total differs from the
    /// declared length.
    pub fn finish(self) -> Result<()> {
        self.scriber.end_binary_data()
    }
}

impl Write for BinaryDataSink<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scriber.binary_data_chunk(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests;
