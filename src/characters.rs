//! Borrowed views of decoded text and the events handed out by the Scanner.
//!
//! Dekodierte Werte landen entweder im Zeichen-Arena des Scanners (volatil,
//! gültig bis zum nächsten `next_event`), im Octet-Arena (Binärdaten) oder
//! sind interned Strings der String Table, die behalten werden dürfen.

use std::borrow::Cow;
use std::ops::Range;
use std::rc::Rc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::event::{AtContent, ChContent, CmContent, DtContent, ErContent, ExiEvent, NsContent, PiContent};
use crate::event_code::EventType;
use crate::grammar::BinaryFormat;
use crate::qname::QName;

/// Position of a decoded value inside the Scanner's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextRef {
    Shared(Rc<str>),
    Arena(Range<usize>),
    Octets(Range<usize>, BinaryFormat),
}

impl TextRef {
    /// Turns the reference into a view over the given buffers.
    ///
    /// Ungültige Bereiche ergeben leeren Text; sie entstehen nur, wenn die
    /// Arenen zwischen Lesen und Auflösen geleert wurden.
    pub(crate) fn view<'a>(&self, arena: &'a str, octets: &'a [u8]) -> Characters<'a> {
        match self {
            Self::Shared(rc) => Characters::shared(Rc::clone(rc)),
            Self::Arena(range) => Characters::arena(arena.get(range.clone()).unwrap_or_default()),
            Self::Octets(range, format) => {
                Characters::binary(octets.get(range.clone()).unwrap_or_default(), *format)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr<'a> {
    Arena(&'a str),
    Shared(Rc<str>),
    Binary(&'a [u8], BinaryFormat),
}

/// Text of a CH, AT or comment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characters<'a> {
    repr: Repr<'a>,
}

impl<'a> Characters<'a> {
    pub(crate) fn arena(text: &'a str) -> Self {
        Self { repr: Repr::Arena(text) }
    }

    pub(crate) fn shared(text: Rc<str>) -> Self {
        Self { repr: Repr::Shared(text) }
    }

    pub(crate) fn binary(octets: &'a [u8], format: BinaryFormat) -> Self {
        Self { repr: Repr::Binary(octets, format) }
    }

    /// Lexical form; binary values are rendered as base64 or hex on demand.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.repr {
            Repr::Arena(s) => Cow::Borrowed(s),
            Repr::Shared(rc) => Cow::Borrowed(rc),
            Repr::Binary(octets, BinaryFormat::Base64) => Cow::Owned(STANDARD.encode(octets)),
            Repr::Binary(octets, BinaryFormat::Hex) => Cow::Owned(hex_upper(octets)),
        }
    }

    /// `true` if the view dies with the next `next_event` call.
    pub fn is_volatile(&self) -> bool {
        !matches!(self.repr, Repr::Shared(_))
    }

    /// The interned string, if the value came from the string table.
    pub fn interned(&self) -> Option<&Rc<str>> {
        match &self.repr {
            Repr::Shared(rc) => Some(rc),
            _ => None,
        }
    }

    /// Raw octets of a base64Binary/hexBinary value.
    pub fn binary_octets(&self) -> Option<&'a [u8]> {
        match self.repr {
            Repr::Binary(octets, _) => Some(octets),
            _ => None,
        }
    }

    /// Owned copy that survives the next `next_event` call.
    pub fn to_shared(&self) -> Rc<str> {
        match &self.repr {
            Repr::Shared(rc) => Rc::clone(rc),
            _ => self.text().into(),
        }
    }
}

pub(crate) fn hex_upper(octets: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(octets.len() * 2);
    for &b in octets {
        out.push(char::from(DIGITS[usize::from(b >> 4)]));
        out.push(char::from(DIGITS[usize::from(b & 0x0F)]));
    }
    out
}

/// Payload of a decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventContent<'a> {
    /// SD, ED, SC
    None,
    StartElement(QName),
    /// Prefixe, deren Bindung mit dem Element endet (nur bei `preserve.prefixes`).
    EndElement { out_of_scope: Vec<Rc<str>> },
    Attribute { name: QName, value: Characters<'a> },
    XsiType(QName),
    XsiNil(bool),
    Characters(Characters<'a>),
    /// Binary value delivered in chunks through
    /// [`Scanner::binary_data`](crate::Scanner::binary_data).
    BinaryData { length: u64 },
    NamespaceDeclaration { uri: Rc<str>, prefix: Rc<str>, local_element_ns: bool },
    Comment(Characters<'a>),
    ProcessingInstruction { target: Rc<str>, data: Characters<'a> },
    DocType { name: Rc<str>, public: Rc<str>, system: Rc<str>, text: Rc<str> },
    EntityReference(Rc<str>),
}

/// One decoded event: its grammar event type and its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescription<'a> {
    pub event_type: EventType,
    pub content: EventContent<'a>,
}

impl EventDescription<'_> {
    /// Owned form of the event. `None` for chunked binary data, whose
    /// octets are only available through the Scanner.
    pub fn to_event(&self) -> Option<ExiEvent> {
        let event = match &self.content {
            EventContent::None => match self.event_type {
                EventType::StartDocument => ExiEvent::StartDocument,
                EventType::EndDocument => ExiEvent::EndDocument,
                _ => ExiEvent::SelfContained,
            },
            EventContent::StartElement(qname) => ExiEvent::StartElement(qname.clone()),
            EventContent::EndElement { .. } => ExiEvent::EndElement,
            EventContent::Attribute { name, value } => {
                ExiEvent::Attribute(AtContent { qname: name.clone(), value: value.to_shared() })
            }
            EventContent::XsiType(qname) => ExiEvent::XsiType(qname.clone()),
            EventContent::XsiNil(nil) => ExiEvent::XsiNil(*nil),
            EventContent::Characters(value) => ExiEvent::Characters(ChContent { value: value.to_shared() }),
            EventContent::BinaryData { .. } => return None,
            EventContent::NamespaceDeclaration { uri, prefix, local_element_ns } => {
                ExiEvent::NamespaceDeclaration(NsContent {
                    uri: Rc::clone(uri),
                    prefix: Rc::clone(prefix),
                    local_element_ns: *local_element_ns,
                })
            }
            EventContent::Comment(text) => ExiEvent::Comment(CmContent { text: text.to_shared() }),
            EventContent::ProcessingInstruction { target, data } => {
                ExiEvent::ProcessingInstruction(PiContent { name: Rc::clone(target), text: data.to_shared() })
            }
            EventContent::DocType { name, public, system, text } => ExiEvent::DocType(DtContent {
                name: Rc::clone(name),
                public: Rc::clone(public),
                system: Rc::clone(system),
                text: Rc::clone(text),
            }),
            EventContent::EntityReference(name) => ExiEvent::EntityReference(ErContent { name: Rc::clone(name) }),
        };
        Some(event)
    }
}
