//! Owned EXI events (EXI 4, Table 4-1).
//!
//! Die Pull-API des Scanners liefert geliehene [`EventDescription`]s; für
//! Tests und die Batch-Funktionen [`crate::encode`]/[`crate::decode`] gibt es
//! diese besitzende Variante.
//!
//! [`EventDescription`]: crate::characters::EventDescription

use std::rc::Rc;

use crate::qname::QName;

/// Namespace declaration (NS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsContent {
    pub uri: Rc<str>,
    /// Leer für den Default-Namespace.
    pub prefix: Rc<str>,
    /// The declaration supplies the prefix of the enclosing SE.
    pub local_element_ns: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtContent {
    pub qname: QName,
    pub value: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChContent {
    pub value: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmContent {
    pub text: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiContent {
    /// Target
    pub name: Rc<str>,
    pub text: Rc<str>,
}

/// DOCTYPE; fehlende Teile sind leere Strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtContent {
    pub name: Rc<str>,
    pub public: Rc<str>,
    pub system: Rc<str>,
    pub text: Rc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErContent {
    pub name: Rc<str>,
}

/// One EXI event with owned content.
///
/// `xsi:type` and `xsi:nil` have their own variants because their values
/// change the grammar of the enclosing element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExiEvent {
    StartDocument,
    EndDocument,
    StartElement(QName),
    EndElement,
    Attribute(AtContent),
    /// `xsi:type` with the named type.
    XsiType(QName),
    /// `xsi:nil`
    XsiNil(bool),
    Characters(ChContent),
    NamespaceDeclaration(NsContent),
    Comment(CmContent),
    ProcessingInstruction(PiContent),
    DocType(DtContent),
    EntityReference(ErContent),
    SelfContained,
}

impl ExiEvent {
    /// Kurzname wie in EXI Table 4-1 (für Logs und Fehlermeldungen).
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::StartDocument => "SD",
            Self::EndDocument => "ED",
            Self::StartElement(_) => "SE",
            Self::EndElement => "EE",
            Self::Attribute(_) => "AT",
            Self::XsiType(_) => "AT(xsi:type)",
            Self::XsiNil(_) => "AT(xsi:nil)",
            Self::Characters(_) => "CH",
            Self::NamespaceDeclaration(_) => "NS",
            Self::Comment(_) => "CM",
            Self::ProcessingInstruction(_) => "PI",
            Self::DocType(_) => "DT",
            Self::EntityReference(_) => "ER",
            Self::SelfContained => "SC",
        }
    }

    pub fn start_element(uri: &str, local_name: &str) -> Self {
        Self::StartElement(QName::new(uri, local_name))
    }

    pub fn attribute(uri: &str, local_name: &str, value: &str) -> Self {
        Self::Attribute(AtContent { qname: QName::new(uri, local_name), value: value.into() })
    }

    pub fn characters(value: &str) -> Self {
        Self::Characters(ChContent { value: value.into() })
    }

    pub fn comment(text: &str) -> Self {
        Self::Comment(CmContent { text: text.into() })
    }
}
