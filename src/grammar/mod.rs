//! Compiled grammars (EXI 8).
//!
//! Der Codec arbeitet gegen die Accessor-Schnittstelle [`CompiledGrammar`]:
//! Produktionen pro Grammar-Zustand, Companion-Grammars (Content, Empty
//! Content), Deklarationen und Typinformationen. Woher diese Tabellen kommen
//! (Schema-Compiler, generierter Code, [`GrammarTable`]) ist für Scanner und
//! Scriber unerheblich.
//!
//! Nicht deklarierte Produktionen (EXI 8.5.4.4), Built-in Element Grammars
//! und das Lernen (EXI 8.4.3) berechnet der Resolver zur Laufzeit; eine
//! kompilierte Grammar bleibt für die Lebensdauer eines Streams unverändert.

mod table;

pub use table::{
    AttributeUse, ComplexContent, ComplexTypeDef, GrammarTable, GrammarTableBuilder, Particle,
    ParticleTerm, SimpleTypeDef, Wildcard,
};

use crate::rcs::RestrictedCharSet;

/// Index of a grammar state.
pub type GrammarId = usize;
/// Index of a type definition.
pub type TypeId = usize;
/// Index of an element declaration.
pub type ElementId = usize;
/// Index of an attribute declaration.
pub type AttributeId = usize;

/// Right-hand terminal of a compiled production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// SE(qname)
    StartElement(ElementId),
    /// SE(uri:*)
    StartElementNs(String),
    /// SE(*)
    StartElementAny,
    /// AT(qname), typed with the attribute's type.
    Attribute(AttributeId),
    /// AT(uri:*)
    AttributeNs(String),
    /// AT(*)
    AttributeAny,
    EndElement,
    /// CH with a typed value.
    Characters(TypeId),
    /// CH [untyped value] (mixed content).
    CharactersUntyped,
}

/// One production: terminal and subsequent grammar state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub terminal: Terminal,
    /// Folgezustand; bei SE der Zustand des Elternelements nach dem Kind.
    pub next: GrammarId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub uri: String,
    pub local_name: String,
    pub type_id: TypeId,
    pub nillable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub uri: String,
    pub local_name: String,
    pub type_id: TypeId,
}

/// Element of the schema-informed fragment grammar (EXI 8.5.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentElement {
    pub uri: String,
    pub local_name: String,
    /// `None` if declarations of this name disagree on the type.
    pub decl: Option<ElementId>,
}

/// Datatype family selecting the value codec (EXI Table 7-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    String,
    Boolean,
    Decimal,
    Integer,
    Float,
    DateTime(DateTimeKind),
    Binary(BinaryFormat),
}

/// Die acht Date-Time-Typen (EXI Table 7-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateTimeKind {
    GYear,
    GYearMonth,
    Date,
    DateTime,
    GMonth,
    GMonthDay,
    GDay,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryFormat {
    Base64,
    Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variety {
    Atomic,
    /// List with its item type.
    List(TypeId),
    Union,
}

/// Integer representation derived from the value-space facets (EXI 7.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegerRepr {
    /// n-bit offset from `min`, range at most 4096 values.
    NBit { min: i64, max: i64 },
    /// Non-negative unbounded.
    Unsigned,
    Signed,
}

impl IntegerRepr {
    /// Bitbreite der n-bit Darstellung.
    pub fn bits(self) -> u8 {
        match self {
            Self::NBit { min, max } => crate::bit_width::for_max(max.abs_diff(min)),
            _ => 0,
        }
    }
}

/// whiteSpace facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Whitespace {
    #[default]
    Preserve,
    Replace,
    Collapse,
}

/// Everything the codecs need to know about a type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// (uri, local name), `None` for anonymous types.
    pub name: Option<(String, String)>,
    pub base: Option<TypeId>,
    /// `false` for complex types.
    pub simple: bool,
    pub family: Family,
    pub variety: Variety,
    /// Aus dem Pattern-Facet abgeleitet.
    pub rcs: Option<RestrictedCharSet>,
    /// Lexical enumeration values, empty without the facet.
    pub enumeration: Vec<String>,
    pub integer: Option<IntegerRepr>,
    pub whitespace: Whitespace,
    pub has_pattern: bool,
    pub has_named_subtypes: bool,
    /// First state of the type grammar.
    pub grammar: GrammarId,
    /// First state of the TypeEmpty grammar (xsi:nil="true").
    pub empty_grammar: GrammarId,
}

/// Read-only accessor contract of a compiled grammar.
///
/// Implementations are immutable and shared between threads; one value can
/// drive any number of Scanners and Scribers.
pub trait CompiledGrammar: Send + Sync {
    /// `false` for the built-in grammars of schema-less streams.
    fn is_schema_informed(&self) -> bool;

    /// URIs and qualified names that pre-populate the string table.
    fn string_table_seed(&self) -> (Vec<&str>, Vec<(&str, &str)>);

    fn production_count(&self, grammar: GrammarId) -> usize;

    fn production(&self, grammar: GrammarId, index: usize) -> Option<&Production>;

    fn has_end_element(&self, grammar: GrammarId) -> bool {
        (0..self.production_count(grammar))
            .filter_map(|i| self.production(grammar, i))
            .any(|p| p.terminal == Terminal::EndElement)
    }

    /// State j ≤ content of its type grammar (attributes still allowed).
    fn is_start_tag(&self, grammar: GrammarId) -> bool;

    /// State 0 of its type grammar.
    fn is_first(&self, grammar: GrammarId) -> bool;

    /// The content state of the type this state belongs to.
    fn content_grammar(&self, grammar: GrammarId) -> Option<GrammarId>;

    /// First TypeEmpty state of the type this state belongs to.
    fn empty_content_grammar(&self, grammar: GrammarId) -> Option<GrammarId>;

    fn element(&self, id: ElementId) -> Option<&ElementDecl>;

    fn attribute(&self, id: AttributeId) -> Option<&AttributeDecl>;

    /// Global elements sorted by local name, then URI.
    fn global_elements(&self) -> &[ElementId];

    fn global_element(&self, uri: &str, local_name: &str) -> Option<ElementId>;

    fn global_attribute(&self, uri: &str, local_name: &str) -> Option<AttributeId>;

    /// Sortierte Elemente der Fragment Grammar.
    fn fragment_elements(&self) -> &[FragmentElement];

    fn type_info(&self, id: TypeId) -> Option<&TypeInfo>;

    /// Lookup of a named type (xsi:type).
    fn named_type(&self, uri: &str, local_name: &str) -> Option<TypeId>;

    fn type_grammar(&self, id: TypeId) -> Option<GrammarId> {
        self.type_info(id).map(|t| t.grammar)
    }

    /// `id` and its base types, nearest first.
    fn ancestry(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = vec![id];
        let mut current = self.type_info(id).and_then(|t| t.base);
        while let Some(base) = current {
            if out.contains(&base) {
                break;
            }
            out.push(base);
            current = self.type_info(base).and_then(|t| t.base);
        }
        out
    }
}
