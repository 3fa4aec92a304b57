//! Event Codes und Event-Code-Tupel (EXI 6.2, 8.3).
//!
//! Ein Event Code hat 1-3 Teile. Jede Ebene eines Tupels ist eine geordnete
//! Liste von Blättern und Untergruppen; der Teil wird als n-bit Unsigned
//! Integer mit `⌈log₂(Ebenengröße)⌉` Bits geschrieben.
//!
//! Gelernte Produktionen der Built-in Grammars werden in Lernreihenfolge
//! gespeichert; ein `reversed`-Präfix bildet Index `i` auf `len - 1 - i` ab,
//! sodass die zuletzt gelernte Produktion Code 0 bekommt.

use std::fmt;

use crate::bitstream::{BitReader, BitWriter};
use crate::grammar::{ElementId, TypeId};
use crate::qname::ExpandedNameId;
use crate::{Error, Result, bit_width};

/// Maximale Tiefe eines Event Codes.
pub const MAX_PARTS: usize = 3;

/// Grammar event type of a production.
///
/// Names are compact ids of the stream's string table, so a resolved event
/// type stays valid for the whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    StartDocument,
    EndDocument,
    /// SE(qname), declared or learned.
    StartElement { name: ExpandedNameId, decl: Option<ElementId> },
    /// SE(uri:*)
    StartElementNs { uri: usize },
    /// SE(*)
    StartElementAny,
    EndElement,
    /// AT(qname) with a typed value (`None` = untyped).
    Attribute { name: ExpandedNameId, ty: Option<TypeId> },
    /// AT(uri:*)
    AttributeNs { uri: usize },
    /// AT(*)
    AttributeAny,
    /// AT(qname) [untyped value] for a declared attribute with an invalid value.
    AttributeInvalid { name: ExpandedNameId },
    /// AT(*) [untyped value]
    AttributeAnyUntyped,
    XsiType,
    XsiNil,
    /// CH with a typed value.
    Characters { ty: TypeId },
    /// CH [untyped value]
    CharactersUntyped,
    NamespaceDeclaration,
    SelfContained,
    EntityReference,
    Comment,
    ProcessingInstruction,
    DocType,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartDocument => f.write_str("SD"),
            Self::EndDocument => f.write_str("ED"),
            Self::StartElement { name, .. } => write!(f, "SE({}:{})", name.uri, name.local_name),
            Self::StartElementNs { uri } => write!(f, "SE({uri}:*)"),
            Self::StartElementAny => f.write_str("SE(*)"),
            Self::EndElement => f.write_str("EE"),
            Self::Attribute { name, .. } => write!(f, "AT({}:{})", name.uri, name.local_name),
            Self::AttributeNs { uri } => write!(f, "AT({uri}:*)"),
            Self::AttributeAny => f.write_str("AT(*)"),
            Self::AttributeInvalid { name } => {
                write!(f, "AT({}:{})[untyped]", name.uri, name.local_name)
            }
            Self::AttributeAnyUntyped => f.write_str("AT(*)[untyped]"),
            Self::XsiType => f.write_str("AT(xsi:type)"),
            Self::XsiNil => f.write_str("AT(xsi:nil)"),
            Self::Characters { .. } => f.write_str("CH"),
            Self::CharactersUntyped => f.write_str("CH[untyped]"),
            Self::NamespaceDeclaration => f.write_str("NS"),
            Self::SelfContained => f.write_str("SC"),
            Self::EntityReference => f.write_str("ER"),
            Self::Comment => f.write_str("CM"),
            Self::ProcessingInstruction => f.write_str("PI"),
            Self::DocType => f.write_str("DT"),
        }
    }
}

/// Event Code mit Bitbreite pro Teil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCode {
    parts: [u32; MAX_PARTS],
    widths: [u8; MAX_PARTS],
    len: u8,
}

impl EventCode {
    fn push(&mut self, value: u32, width: u8) {
        let i = usize::from(self.len);
        self.parts[i] = value;
        self.widths[i] = width;
        self.len += 1;
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts[..usize::from(self.len)]
    }

    /// Summe der Bitbreiten (bit-packed).
    pub fn bit_len(&self) -> u32 {
        self.widths[..usize::from(self.len)].iter().map(|&w| u32::from(w)).sum()
    }

    pub fn write(&self, writer: &mut BitWriter<'_>) -> Result<()> {
        for i in 0..usize::from(self.len) {
            writer.write_nbit(u64::from(self.parts[i]), self.widths[i])?;
        }
        Ok(())
    }
}

/// `1.3.0`
impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts().iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Entry of one tuple level.
#[derive(Debug, Clone)]
pub enum Node<T> {
    Leaf(T),
    Group(Tuple<T>),
}

/// One level of an event-code tuple.
#[derive(Debug, Clone)]
pub struct Tuple<T> {
    items: Vec<Node<T>>,
    /// Die ersten `reversed` Einträge liegen in Lernreihenfolge.
    reversed: usize,
}

impl<T> Default for Tuple<T> {
    fn default() -> Self {
        Self { items: Vec::new(), reversed: 0 }
    }
}

impl<T> Tuple<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items `0..count` are in learning order; the last one gets code 0.
    pub fn with_reversed(items: Vec<Node<T>>, count: usize) -> Self {
        debug_assert!(count <= items.len());
        Self { items, reversed: count }
    }

    pub fn leaf(&mut self, value: T) {
        self.items.push(Node::Leaf(value));
    }

    /// Hängt eine Untergruppe an. Leere Gruppen entfallen, eine Gruppe mit
    /// genau einem Eintrag wird zu diesem Eintrag.
    pub fn group(&mut self, mut group: Tuple<T>) {
        match group.items.len() {
            0 => {}
            1 => {
                if let Some(only) = group.items.pop() {
                    self.items.push(only);
                }
            }
            _ => self.items.push(Node::Group(group)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn width(&self) -> u8 {
        bit_width::for_count(self.items.len())
    }

    fn get(&self, code: usize) -> Option<&Node<T>> {
        let index = if code < self.reversed { self.reversed - 1 - code } else { code };
        self.items.get(index)
    }

    /// First leaf in code order that satisfies `pred`, with its event code.
    ///
    /// Ebenen werden in Code-Reihenfolge durchsucht; ein Blatt der ersten
    /// Ebene gewinnt damit vor jedem Blatt einer später stehenden Gruppe.
    pub fn locate(&self, mut pred: impl FnMut(&T) -> bool) -> Option<(EventCode, &T)> {
        let mut code = EventCode::default();
        self.locate_in(&mut pred, &mut code).map(|leaf| (code, leaf))
    }

    fn locate_in(&self, pred: &mut impl FnMut(&T) -> bool, code: &mut EventCode) -> Option<&T> {
        let width = self.width();
        let depth = code.len;
        for i in 0..self.items.len() {
            code.len = depth;
            code.push(i as u32, width);
            match self.get(i) {
                Some(Node::Leaf(value)) if pred(value) => return Some(value),
                Some(Node::Group(group)) if usize::from(code.len) < MAX_PARTS => {
                    if let Some(found) = group.locate_in(pred, code) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        code.len = depth;
        None
    }

    /// Reads an event code and returns the selected leaf.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<(EventCode, &T)> {
        let mut code = EventCode::default();
        let mut level = self;
        loop {
            let width = level.width();
            let part = reader.read_nbit(width)?;
            code.push(part as u32, width);
            match usize::try_from(part).ok().and_then(|p| level.get(p)) {
                Some(Node::Leaf(value)) => return Ok((code, value)),
                Some(Node::Group(group)) if usize::from(code.len) < MAX_PARTS => level = group,
                _ => {
                    return Err(Error::invalid_event_code(code.to_string(), format!("{} entries", level.len())));
                }
            }
        }
    }

    /// Alle Blätter in Code-Reihenfolge (für Logs und Tests).
    pub fn leaves(&self) -> Vec<(EventCode, &T)> {
        let mut out = Vec::new();
        self.collect(&mut EventCode::default(), &mut out);
        out
    }

    fn collect<'t>(&'t self, code: &mut EventCode, out: &mut Vec<(EventCode, &'t T)>) {
        let width = self.width();
        let depth = code.len;
        for i in 0..self.items.len() {
            code.len = depth;
            code.push(i as u32, width);
            match self.get(i) {
                Some(Node::Leaf(value)) => out.push((*code, value)),
                Some(Node::Group(group)) => group.collect(code, out),
                None => {}
            }
        }
        code.len = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Built-in StartTagContent ohne Lernen, alle Fidelity-Optionen aktiv:
    /// EE 0.0, AT(*) 0.1, NS 0.2, SC 0.3, SE(*) 0.4, CH 0.5, ER 0.6, CM 0.7.0, PI 0.7.1
    fn start_tag_content() -> Tuple<&'static str> {
        let mut second = Tuple::new();
        for name in ["EE", "AT(*)", "NS", "SC", "SE(*)", "CH", "ER"] {
            second.leaf(name);
        }
        let mut third = Tuple::new();
        third.leaf("CM");
        third.leaf("PI");
        second.group(third);
        let mut top = Tuple::new();
        top.group(second);
        top
    }

    fn written(f: impl FnOnce(&mut BitWriter<'_>) -> Result<()>) -> (Vec<u8>, u64) {
        let mut out = Vec::new();
        let bits;
        {
            let mut w = BitWriter::new(&mut out);
            f(&mut w).unwrap();
            bits = w.bit_position();
            w.finish().unwrap();
        }
        (out, bits)
    }

    #[test]
    fn codes_wie_exi_8_4_3() {
        // Erste Ebene: nur die Gruppe, 0 Bits
        let tuple = start_tag_content();
        assert_eq!(tuple.len(), 1);
        let (code, _) = tuple.locate(|n| *n == "PI").unwrap();
        assert_eq!(code.to_string(), "0.7.1");
        assert_eq!(code.bit_len(), 3 + 1);
    }

    /// Eine Gruppe mit einem Eintrag kostet 0 Bits; sie wird direkt durch
    /// den Eintrag ersetzt, die Bitfolge bleibt gleich.
    #[test]
    fn gruppe_mit_einem_eintrag_kollabiert() {
        let mut top = Tuple::new();
        top.leaf("ED");
        let mut group = Tuple::new();
        group.leaf("PI");
        top.group(group);
        top.group(Tuple::new());
        assert_eq!(top.len(), 2);
        let (code, _) = top.locate(|n| *n == "PI").unwrap();
        assert_eq!(code.to_string(), "1");
        assert_eq!(code.bit_len(), 1);
    }

    #[test]
    fn verschachtelte_codes() {
        let mut top = Tuple::new();
        top.leaf("SE(a)");
        let mut second = Tuple::new();
        second.leaf("EE");
        let mut third = Tuple::new();
        third.leaf("CM");
        third.leaf("PI");
        second.group(third);
        top.group(second);

        let (code, _) = top.locate(|n| *n == "PI").unwrap();
        assert_eq!(code.parts(), &[1, 1, 1]);
        assert_eq!(code.bit_len(), 3);
        let (code, _) = top.locate(|n| *n == "SE(a)").unwrap();
        assert_eq!(code.to_string(), "0");
        assert!(top.locate(|n| *n == "SE(b)").is_none());
    }

    #[test]
    fn reversed_praefix() {
        let items = vec![Node::Leaf("AT(a)"), Node::Leaf("AT(b)"), Node::Leaf("EE")];
        let tuple = Tuple::with_reversed(items, 2);
        let codes: Vec<_> = tuple.leaves().into_iter().map(|(c, n)| (c.to_string(), *n)).collect();
        assert_eq!(codes, vec![("0".into(), "AT(b)"), ("1".into(), "AT(a)"), ("2".into(), "EE")]);
    }

    #[test]
    fn encode_decode_ueber_ebenen() {
        let tuple = start_tag_content();
        let targets = ["CM", "EE", "SE(*)"];
        let (data, bits) = written(|w| {
            for t in targets {
                tuple.locate(|n| *n == t).unwrap().0.write(w)?;
            }
            Ok(())
        });
        assert_eq!(bits, 4 + 3 + 3);
        let mut r = BitReader::new(&data[..]);
        for t in targets {
            assert_eq!(*tuple.decode(&mut r).unwrap().1, t);
        }
    }

    #[test]
    fn ungueltiger_index() {
        // 3 Einträge → 2 Bits; Wert 3 zeigt ins Leere
        let mut tuple = Tuple::new();
        tuple.leaf("a");
        tuple.leaf("b");
        tuple.leaf("c");
        let data = [0b1100_0000u8];
        let err = tuple.decode(&mut BitReader::new(&data[..])).unwrap_err();
        assert!(matches!(err, Error::InvalidEventCode { .. }));
        assert!(err.is_malformed_stream());
    }

    #[test]
    fn einzelnes_blatt_braucht_keine_bits() {
        let mut tuple = Tuple::new();
        tuple.leaf("SD");
        let (code, _) = tuple.locate(|_| true).unwrap();
        assert_eq!(code.bit_len(), 0);
        let data: [u8; 0] = [];
        assert_eq!(*tuple.decode(&mut BitReader::new(&data[..])).unwrap().1, "SD");
    }
}
