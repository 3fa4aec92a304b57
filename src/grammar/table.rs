//! In-memory grammar tables (EXI 8.5.4).
//!
//! [`GrammarTableBuilder`] nimmt bereits aufgelöste Deklarationen entgegen
//! (Typen, Elemente, Attribute, Content-Modelle) und erzeugt daraus die
//! normalisierten Type Grammars:
//!
//! - Attribut-Zustände sortiert nach local-name, dann URI (EXI 8.5.4.1.3.2)
//! - optionale Attribute und Partikel werden durch Zusammenführen der
//!   Folgezustände aufgelöst (kein Epsilon zur Laufzeit)
//! - unbeschränkte Partikel bekommen einen Wiederholungszustand
//! - jede Type Grammar hat eine TypeEmpty-Variante für `xsi:nil="true"`
//!
//! Die XSD-Built-in-Typen (EXI Table D-5) sind vorregistriert. Ein XSD-Parser
//! ist das nicht: Pattern-Facets kommen als fertiger Zeichenvorrat an.

use std::hash::Hash;

use indexmap::Equivalent;

use super::{
    AttributeDecl, AttributeId, BinaryFormat, CompiledGrammar, DateTimeKind, ElementDecl, ElementId,
    Family, FragmentElement, GrammarId, IntegerRepr, Production, Terminal, TypeId, TypeInfo, Variety,
    Whitespace,
};
use crate::FastIndexMap;
use crate::integer::MAX_BOUNDED_RANGE;
use crate::rcs::RestrictedCharSet;
use crate::string_table::URI_XSD;

/// Lookup-Schlüssel ohne Allokation.
#[derive(Hash)]
struct NameRef<'a>(&'a str, &'a str);

impl Equivalent<(String, String)> for NameRef<'_> {
    fn equivalent(&self, key: &(String, String)) -> bool {
        self.0 == key.0 && self.1 == key.1
    }
}

type NameIndex<T> = FastIndexMap<(String, String), T>;

#[derive(Debug, Clone)]
struct State {
    productions: Vec<Production>,
    start_tag: bool,
    first: bool,
    content: GrammarId,
    empty: GrammarId,
}

/// Compiled grammar tables held in memory.
#[derive(Debug, Clone)]
pub struct GrammarTable {
    schema_informed: bool,
    states: Vec<State>,
    elements: Vec<ElementDecl>,
    attributes: Vec<AttributeDecl>,
    global_elements: Vec<ElementId>,
    global_element_index: NameIndex<ElementId>,
    global_attribute_index: NameIndex<AttributeId>,
    fragment: Vec<FragmentElement>,
    types: Vec<TypeInfo>,
    named_types: NameIndex<TypeId>,
}

impl GrammarTable {
    /// Grammar of a schema-less stream: only the built-in grammars apply.
    pub fn schemaless() -> Self {
        Self {
            schema_informed: false,
            states: Vec::new(),
            elements: Vec::new(),
            attributes: Vec::new(),
            global_elements: Vec::new(),
            global_element_index: NameIndex::default(),
            global_attribute_index: NameIndex::default(),
            fragment: Vec::new(),
            types: Vec::new(),
            named_types: NameIndex::default(),
        }
    }

    /// Builder with the XSD built-in types registered.
    pub fn builder() -> GrammarTableBuilder {
        GrammarTableBuilder::new()
    }

    fn state(&self, grammar: GrammarId) -> Option<&State> {
        self.states.get(grammar)
    }
}

impl CompiledGrammar for GrammarTable {
    fn is_schema_informed(&self) -> bool {
        self.schema_informed
    }

    fn string_table_seed(&self) -> (Vec<&str>, Vec<(&str, &str)>) {
        let mut names: Vec<(&str, &str)> = Vec::new();
        names.extend(self.elements.iter().map(|e| (e.uri.as_str(), e.local_name.as_str())));
        names.extend(self.attributes.iter().map(|a| (a.uri.as_str(), a.local_name.as_str())));
        names.extend(self.named_types.keys().map(|(u, l)| (u.as_str(), l.as_str())));
        let mut uris: Vec<&str> = names.iter().map(|(u, _)| *u).collect();
        // Namespaces der Wildcards (SE(uri:*), AT(uri:*))
        for production in self.states.iter().flat_map(|s| &s.productions) {
            if let Terminal::StartElementNs(uri) | Terminal::AttributeNs(uri) = &production.terminal {
                uris.push(uri);
            }
        }
        (uris, names)
    }

    fn production_count(&self, grammar: GrammarId) -> usize {
        self.state(grammar).map_or(0, |s| s.productions.len())
    }

    fn production(&self, grammar: GrammarId, index: usize) -> Option<&Production> {
        self.state(grammar)?.productions.get(index)
    }

    fn is_start_tag(&self, grammar: GrammarId) -> bool {
        self.state(grammar).is_some_and(|s| s.start_tag)
    }

    fn is_first(&self, grammar: GrammarId) -> bool {
        self.state(grammar).is_some_and(|s| s.first)
    }

    fn content_grammar(&self, grammar: GrammarId) -> Option<GrammarId> {
        self.state(grammar).map(|s| s.content)
    }

    fn empty_content_grammar(&self, grammar: GrammarId) -> Option<GrammarId> {
        self.state(grammar).map(|s| s.empty)
    }

    fn element(&self, id: ElementId) -> Option<&ElementDecl> {
        self.elements.get(id)
    }

    fn attribute(&self, id: AttributeId) -> Option<&AttributeDecl> {
        self.attributes.get(id)
    }

    fn global_elements(&self) -> &[ElementId] {
        &self.global_elements
    }

    fn global_element(&self, uri: &str, local_name: &str) -> Option<ElementId> {
        self.global_element_index.get(&NameRef(uri, local_name)).copied()
    }

    fn global_attribute(&self, uri: &str, local_name: &str) -> Option<AttributeId> {
        self.global_attribute_index.get(&NameRef(uri, local_name)).copied()
    }

    fn fragment_elements(&self) -> &[FragmentElement] {
        &self.fragment
    }

    fn type_info(&self, id: TypeId) -> Option<&TypeInfo> {
        self.types.get(id)
    }

    fn named_type(&self, uri: &str, local_name: &str) -> Option<TypeId> {
        self.named_types.get(&NameRef(uri, local_name)).copied()
    }
}

// ============================================================================
// Definitionen
// ============================================================================

/// Simple type derived by restriction, list or union.
#[derive(Debug, Clone, Default)]
pub struct SimpleTypeDef {
    name: Option<(String, String)>,
    base: Option<TypeId>,
    list_item: Option<TypeId>,
    union: bool,
    enumeration: Vec<String>,
    min_inclusive: Option<i64>,
    max_inclusive: Option<i64>,
    pattern: Option<Option<Vec<char>>>,
    whitespace: Option<Whitespace>,
}

impl SimpleTypeDef {
    pub fn restriction(base: TypeId) -> Self {
        Self { base: Some(base), ..Self::default() }
    }

    pub fn list(item: TypeId) -> Self {
        Self { list_item: Some(item), ..Self::default() }
    }

    pub fn union() -> Self {
        Self { union: true, ..Self::default() }
    }

    pub fn named(mut self, uri: &str, local_name: &str) -> Self {
        self.name = Some((uri.to_owned(), local_name.to_owned()));
        self
    }

    pub fn enumeration<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_inclusive(mut self, min: i64) -> Self {
        self.min_inclusive = Some(min);
        self
    }

    pub fn max_inclusive(mut self, max: i64) -> Self {
        self.max_inclusive = Some(max);
        self
    }

    /// Pattern facet. `chars` is the finite character set the pattern
    /// admits, `None` when it admits arbitrary characters.
    pub fn pattern(mut self, chars: Option<Vec<char>>) -> Self {
        self.pattern = Some(chars);
        self
    }

    pub fn whitespace(mut self, whitespace: Whitespace) -> Self {
        self.whitespace = Some(whitespace);
        self
    }
}

/// Namespace constraint of a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wildcard {
    Any,
    Namespace(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticleTerm {
    Element(ElementId),
    Wildcard(Wildcard),
}

/// Particle of a sequence with occurrence 0/1 .. 1/unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    pub term: ParticleTerm,
    pub optional: bool,
    pub unbounded: bool,
}

impl Particle {
    pub fn once(element: ElementId) -> Self {
        Self { term: ParticleTerm::Element(element), optional: false, unbounded: false }
    }

    pub fn optional(element: ElementId) -> Self {
        Self { optional: true, ..Self::once(element) }
    }

    pub fn zero_or_more(element: ElementId) -> Self {
        Self { optional: true, unbounded: true, ..Self::once(element) }
    }

    pub fn one_or_more(element: ElementId) -> Self {
        Self { unbounded: true, ..Self::once(element) }
    }

    /// `<xs:any>` with the given occurrence.
    pub fn any(wildcard: Wildcard, optional: bool, unbounded: bool) -> Self {
        Self { term: ParticleTerm::Wildcard(wildcard), optional, unbounded }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    pub attribute: AttributeId,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexContent {
    Empty,
    /// Simple content of the given type.
    Simple(TypeId),
    /// Sequence of particles.
    Elements { particles: Vec<Particle>, mixed: bool },
}

#[derive(Debug, Clone)]
pub struct ComplexTypeDef {
    pub name: Option<(String, String)>,
    /// Default: `xs:anyType`
    pub base: Option<TypeId>,
    pub attributes: Vec<AttributeUse>,
    pub attribute_wildcard: Option<Wildcard>,
    pub content: ComplexContent,
}

impl ComplexTypeDef {
    pub fn new(content: ComplexContent) -> Self {
        Self { name: None, base: None, attributes: Vec::new(), attribute_wildcard: None, content }
    }

    pub fn named(mut self, uri: &str, local_name: &str) -> Self {
        self.name = Some((uri.to_owned(), local_name.to_owned()));
        self
    }

    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn attribute(mut self, attribute: AttributeId, required: bool) -> Self {
        self.attributes.push(AttributeUse { attribute, required });
        self
    }

    pub fn attribute_wildcard(mut self, wildcard: Wildcard) -> Self {
        self.attribute_wildcard = Some(wildcard);
        self
    }
}

#[derive(Debug, Clone)]
enum Shape {
    Simple,
    Complex(ComplexTypeDef),
    AnyType,
}

/// Integer-Grenzen für die Ableitung der Darstellung.
type Bounds = (Option<i64>, Option<i64>);

// ============================================================================
// Builder
// ============================================================================

/// Collects declarations and compiles them into a [`GrammarTable`].
#[derive(Debug, Clone)]
pub struct GrammarTableBuilder {
    types: Vec<TypeInfo>,
    shapes: Vec<Shape>,
    bounds: Vec<Bounds>,
    named_types: NameIndex<TypeId>,
    elements: Vec<ElementDecl>,
    attributes: Vec<AttributeDecl>,
    global_elements: Vec<ElementId>,
    global_attributes: Vec<AttributeId>,
}

impl GrammarTableBuilder {
    fn new() -> Self {
        let mut builder = Self {
            types: Vec::new(),
            shapes: Vec::new(),
            bounds: Vec::new(),
            named_types: NameIndex::default(),
            elements: Vec::new(),
            attributes: Vec::new(),
            global_elements: Vec::new(),
            global_attributes: Vec::new(),
        };
        builder.register_builtins();
        builder
    }

    /// Built-in XSD type by local name (`"int"`, `"string"`, ...).
    pub fn builtin(&self, local_name: &str) -> Option<TypeId> {
        self.named_types.get(&NameRef(URI_XSD, local_name)).copied()
    }

    pub fn type_id(&self, uri: &str, local_name: &str) -> Option<TypeId> {
        self.named_types.get(&NameRef(uri, local_name)).copied()
    }

    fn xsd(&self, local_name: &str) -> TypeId {
        // Nur mit registrierten Built-in-Namen aufgerufen.
        self.builtin(local_name).unwrap_or(0)
    }

    fn push_type(&mut self, info: TypeInfo, shape: Shape, bounds: Bounds) -> TypeId {
        let id = self.types.len();
        if let Some((uri, local)) = &info.name {
            self.named_types.insert((uri.clone(), local.clone()), id);
        }
        self.types.push(info);
        self.shapes.push(shape);
        self.bounds.push(bounds);
        id
    }

    fn register_builtins(&mut self) {
        fn info(name: &str, base: Option<TypeId>, family: Family, whitespace: Whitespace) -> TypeInfo {
            TypeInfo {
                name: Some((URI_XSD.to_owned(), name.to_owned())),
                base,
                simple: true,
                family,
                variety: Variety::Atomic,
                rcs: None,
                enumeration: Vec::new(),
                integer: None,
                whitespace,
                has_pattern: false,
                has_named_subtypes: false,
                grammar: 0,
                empty_grammar: 0,
            }
        }
        use Whitespace::Collapse;

        let mut any = info("anyType", None, Family::String, Whitespace::Preserve);
        any.simple = false;
        let any_type = self.push_type(any, Shape::AnyType, (None, None));
        let any_simple =
            self.push_type(info("anySimpleType", Some(any_type), Family::String, Collapse), Shape::Simple, (None, None));

        // (Name, Basis, Familie, Whitespace)
        let strings: [(&str, &str, Whitespace); 12] = [
            ("string", "anySimpleType", Whitespace::Preserve),
            ("normalizedString", "string", Whitespace::Replace),
            ("token", "normalizedString", Collapse),
            ("language", "token", Collapse),
            ("Name", "token", Collapse),
            ("NMTOKEN", "token", Collapse),
            ("NCName", "Name", Collapse),
            ("ID", "NCName", Collapse),
            ("IDREF", "NCName", Collapse),
            ("ENTITY", "NCName", Collapse),
            ("QName", "anySimpleType", Collapse),
            ("NOTATION", "anySimpleType", Collapse),
        ];
        for (name, base, ws) in strings {
            let base = self.xsd(base);
            self.push_type(info(name, Some(base), Family::String, ws), Shape::Simple, (None, None));
        }
        for name in ["anyURI", "duration"] {
            self.push_type(info(name, Some(any_simple), Family::String, Collapse), Shape::Simple, (None, None));
        }
        for (name, item) in [("NMTOKENS", "NMTOKEN"), ("IDREFS", "IDREF"), ("ENTITIES", "ENTITY")] {
            let mut list = info(name, Some(any_simple), Family::String, Collapse);
            list.variety = Variety::List(self.xsd(item));
            self.push_type(list, Shape::Simple, (None, None));
        }

        let atomic: [(&str, Family); 12] = [
            ("boolean", Family::Boolean),
            ("decimal", Family::Decimal),
            ("float", Family::Float),
            ("double", Family::Float),
            ("dateTime", Family::DateTime(DateTimeKind::DateTime)),
            ("date", Family::DateTime(DateTimeKind::Date)),
            ("time", Family::DateTime(DateTimeKind::Time)),
            ("gYear", Family::DateTime(DateTimeKind::GYear)),
            ("gYearMonth", Family::DateTime(DateTimeKind::GYearMonth)),
            ("gMonth", Family::DateTime(DateTimeKind::GMonth)),
            ("gMonthDay", Family::DateTime(DateTimeKind::GMonthDay)),
            ("gDay", Family::DateTime(DateTimeKind::GDay)),
        ];
        for (name, family) in atomic {
            self.push_type(info(name, Some(any_simple), family, Collapse), Shape::Simple, (None, None));
        }
        for (name, format) in [("base64Binary", BinaryFormat::Base64), ("hexBinary", BinaryFormat::Hex)] {
            self.push_type(info(name, Some(any_simple), Family::Binary(format), Collapse), Shape::Simple, (None, None));
        }

        // Integer-Hierarchie mit Wertebereichen (XSD Part 2, 3.3)
        let integers: [(&str, &str, Bounds); 13] = [
            ("integer", "decimal", (None, None)),
            ("nonPositiveInteger", "integer", (None, Some(0))),
            ("negativeInteger", "nonPositiveInteger", (None, Some(-1))),
            ("long", "integer", (Some(i64::MIN), Some(i64::MAX))),
            ("int", "long", (Some(i32::MIN.into()), Some(i32::MAX.into()))),
            ("short", "int", (Some(i16::MIN.into()), Some(i16::MAX.into()))),
            ("byte", "short", (Some(i8::MIN.into()), Some(i8::MAX.into()))),
            ("nonNegativeInteger", "integer", (Some(0), None)),
            ("unsignedLong", "nonNegativeInteger", (Some(0), None)),
            ("unsignedInt", "unsignedLong", (Some(0), Some(u32::MAX.into()))),
            ("unsignedShort", "unsignedInt", (Some(0), Some(u16::MAX.into()))),
            ("unsignedByte", "unsignedShort", (Some(0), Some(u8::MAX.into()))),
            ("positiveInteger", "nonNegativeInteger", (Some(1), None)),
        ];
        for (name, base, bounds) in integers {
            let base = self.xsd(base);
            let mut ty = info(name, Some(base), Family::Integer, Collapse);
            ty.integer = Some(integer_repr(bounds));
            self.push_type(ty, Shape::Simple, bounds);
        }
    }

    /// Registers a simple type; facets not given are inherited from the base.
    pub fn simple_type(&mut self, def: SimpleTypeDef) -> TypeId {
        let any_simple = self.xsd("anySimpleType");
        let base = def.base.unwrap_or(any_simple);
        let mut info = match (def.list_item, def.union) {
            (Some(item), _) => {
                let mut info = self.types[any_simple].clone();
                info.variety = Variety::List(item);
                info.whitespace = Whitespace::Collapse;
                info
            }
            (None, true) => {
                let mut info = self.types[any_simple].clone();
                info.variety = Variety::Union;
                info
            }
            (None, false) => self.types.get(base).cloned().unwrap_or_else(|| self.types[any_simple].clone()),
        };
        info.name = def.name;
        info.base = Some(base);
        info.simple = true;
        info.has_named_subtypes = false;

        let (base_min, base_max) = self.bounds.get(base).copied().unwrap_or((None, None));
        let bounds = (
            max_opt(base_min, def.min_inclusive),
            min_opt(base_max, def.max_inclusive),
        );
        if info.family == Family::Integer && info.variety == Variety::Atomic {
            info.integer = Some(integer_repr(bounds));
        }
        if !def.enumeration.is_empty() {
            info.enumeration = def.enumeration;
        }
        if let Some(pattern) = def.pattern {
            info.has_pattern = true;
            info.rcs = pattern.and_then(RestrictedCharSet::new);
        }
        if let Some(ws) = def.whitespace {
            info.whitespace = ws;
        }
        self.push_type(info, Shape::Simple, bounds)
    }

    pub fn complex_type(&mut self, def: ComplexTypeDef) -> TypeId {
        let base = def.base.unwrap_or_else(|| self.xsd("anyType"));
        let info = TypeInfo {
            name: def.name.clone(),
            base: Some(base),
            simple: false,
            family: Family::String,
            variety: Variety::Atomic,
            rcs: None,
            enumeration: Vec::new(),
            integer: None,
            whitespace: Whitespace::Preserve,
            has_pattern: false,
            has_named_subtypes: false,
            grammar: 0,
            empty_grammar: 0,
        };
        self.push_type(info, Shape::Complex(def), (None, None))
    }

    /// Local element declaration.
    pub fn element(&mut self, uri: &str, local_name: &str, type_id: TypeId) -> ElementId {
        self.elements.push(ElementDecl {
            uri: uri.to_owned(),
            local_name: local_name.to_owned(),
            type_id,
            nillable: false,
        });
        self.elements.len() - 1
    }

    pub fn global_element(&mut self, uri: &str, local_name: &str, type_id: TypeId) -> ElementId {
        let id = self.element(uri, local_name, type_id);
        self.global_elements.push(id);
        id
    }

    pub fn set_nillable(&mut self, element: ElementId) {
        if let Some(decl) = self.elements.get_mut(element) {
            decl.nillable = true;
        }
    }

    /// Local attribute declaration.
    pub fn attribute(&mut self, uri: &str, local_name: &str, type_id: TypeId) -> AttributeId {
        self.attributes.push(AttributeDecl { uri: uri.to_owned(), local_name: local_name.to_owned(), type_id });
        self.attributes.len() - 1
    }

    pub fn global_attribute(&mut self, uri: &str, local_name: &str, type_id: TypeId) -> AttributeId {
        let id = self.attribute(uri, local_name, type_id);
        self.global_attributes.push(id);
        id
    }

    pub fn build(mut self) -> GrammarTable {
        for id in 0..self.types.len() {
            if self.types[id].name.is_some()
                && let Some(base) = self.types[id].base
                && base != id
            {
                self.types[base].has_named_subtypes = true;
            }
        }

        let mut compiler = Compiler { states: Vec::new(), attributes: &self.attributes };
        for id in 0..self.types.len() {
            let (grammar, empty) = match &self.shapes[id] {
                Shape::Simple => compiler.simple(id),
                Shape::AnyType => compiler.any_type(),
                Shape::Complex(def) => compiler.complex(def),
            };
            self.types[id].grammar = grammar;
            self.types[id].empty_grammar = empty;
        }
        let states = compiler.states;

        let sort_key = |decl: &ElementDecl| (decl.local_name.clone(), decl.uri.clone());
        let mut global_elements = self.global_elements.clone();
        global_elements.sort_by_key(|&id| sort_key(&self.elements[id]));
        global_elements.dedup_by_key(|id| sort_key(&self.elements[*id]));

        let mut global_element_index = NameIndex::default();
        for &id in &global_elements {
            let decl = &self.elements[id];
            global_element_index.insert((decl.uri.clone(), decl.local_name.clone()), id);
        }
        let mut global_attribute_index = NameIndex::default();
        for &id in &self.global_attributes {
            let decl = &self.attributes[id];
            global_attribute_index.insert((decl.uri.clone(), decl.local_name.clone()), id);
        }

        GrammarTable {
            schema_informed: true,
            fragment: fragment_elements(&self.elements),
            states,
            elements: self.elements,
            attributes: self.attributes,
            global_elements,
            global_element_index,
            global_attribute_index,
            types: self.types,
            named_types: self.named_types,
        }
    }
}

fn max_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Darstellung aus den Grenzen (EXI 7.1.5).
fn integer_repr((min, max): Bounds) -> IntegerRepr {
    match (min, max) {
        (Some(min), Some(max)) if max >= min && max.abs_diff(min) < MAX_BOUNDED_RANGE => {
            IntegerRepr::NBit { min, max }
        }
        (Some(min), _) if min >= 0 => IntegerRepr::Unsigned,
        _ => IntegerRepr::Signed,
    }
}

/// Alle Elementdeklarationen nach Namen gruppiert (EXI 8.5.2). Deklarationen
/// mit gleichem Namen und verschiedenen Typen verlieren ihre Grammar.
fn fragment_elements(elements: &[ElementDecl]) -> Vec<FragmentElement> {
    let mut by_name: FastIndexMap<(String, String), Option<ElementId>> = FastIndexMap::default();
    for (id, decl) in elements.iter().enumerate() {
        let key = (decl.local_name.clone(), decl.uri.clone());
        match by_name.get_mut(&key) {
            None => {
                by_name.insert(key, Some(id));
            }
            Some(slot) => {
                if slot.is_some_and(|other| elements[other].type_id != decl.type_id) {
                    *slot = None;
                }
            }
        }
    }
    by_name.sort_keys();
    by_name
        .into_iter()
        .map(|((local_name, uri), decl)| FragmentElement { uri, local_name, decl })
        .collect()
}

// ============================================================================
// Grammar-Compiler
// ============================================================================

struct Compiler<'d> {
    states: Vec<State>,
    attributes: &'d [AttributeDecl],
}

impl Compiler<'_> {
    fn alloc(&mut self) -> GrammarId {
        self.states.push(State { productions: Vec::new(), start_tag: false, first: false, content: 0, empty: 0 });
        self.states.len() - 1
    }

    fn set(&mut self, id: GrammarId, productions: Vec<Production>) {
        self.states[id].productions = productions;
    }

    /// Markiert die Zustände `range` als zu einem Typ gehörig.
    fn finish_type(&mut self, range: std::ops::Range<GrammarId>, content: GrammarId, empty: GrammarId) {
        for state in &mut self.states[range] {
            state.content = content;
            state.empty = empty;
        }
    }

    /// Type_0: CH → Type_1, Type_1: EE; TypeEmpty_0: EE (EXI 8.5.4.1.3.1)
    fn simple(&mut self, type_id: TypeId) -> (GrammarId, GrammarId) {
        let start = self.states.len();
        let s0 = self.alloc();
        let s1 = self.alloc();
        let e0 = self.alloc();
        self.set(s0, vec![Production { terminal: Terminal::Characters(type_id), next: s1 }]);
        self.set(s1, vec![end_element()]);
        self.set(e0, vec![end_element()]);
        for id in [s0, e0] {
            self.states[id].start_tag = true;
            self.states[id].first = true;
        }
        self.finish_type(start..self.states.len(), s0, e0);
        (s0, e0)
    }

    /// Ur-Type Grammar (EXI 8.5.4.1.3.3).
    fn any_type(&mut self) -> (GrammarId, GrammarId) {
        let start = self.states.len();
        let s0 = self.alloc();
        let s1 = self.alloc();
        let e0 = self.alloc();
        self.set(
            s0,
            vec![
                Production { terminal: Terminal::AttributeAny, next: s0 },
                Production { terminal: Terminal::StartElementAny, next: s1 },
                end_element(),
                Production { terminal: Terminal::CharactersUntyped, next: s1 },
            ],
        );
        self.set(
            s1,
            vec![
                Production { terminal: Terminal::StartElementAny, next: s1 },
                end_element(),
                Production { terminal: Terminal::CharactersUntyped, next: s1 },
            ],
        );
        self.set(e0, vec![Production { terminal: Terminal::AttributeAny, next: e0 }, end_element()]);
        for id in [s0, e0] {
            self.states[id].start_tag = true;
            self.states[id].first = true;
        }
        self.finish_type(start..self.states.len(), s0, e0);
        (s0, e0)
    }

    fn complex(&mut self, def: &ComplexTypeDef) -> (GrammarId, GrammarId) {
        let start = self.states.len();
        let content = self.content(&def.content);
        let first = self.attribute_chain(def, content);

        let empty = self.alloc();
        self.set(empty, vec![end_element()]);
        let empty_first = self.attribute_chain(def, empty);

        self.finish_type(start..self.states.len(), content, empty_first);
        (first, empty_first)
    }

    /// Content-Zustände; liefert den ersten (Element_i,content).
    fn content(&mut self, content: &ComplexContent) -> GrammarId {
        match content {
            ComplexContent::Empty => {
                let c0 = self.alloc();
                self.set(c0, vec![end_element()]);
                c0
            }
            ComplexContent::Simple(ty) => {
                let c0 = self.alloc();
                let c1 = self.alloc();
                self.set(c0, vec![Production { terminal: Terminal::Characters(*ty), next: c1 }]);
                self.set(c1, vec![end_element()]);
                c0
            }
            ComplexContent::Elements { particles, mixed } => self.particles(particles, *mixed),
        }
    }

    /// Sequenz `p_0 .. p_{m-1}`: `C_k` steht vor Partikel k, `R_k` nach
    /// mindestens einem Vorkommen eines unbeschränkten Partikels.
    fn particles(&mut self, particles: &[Particle], mixed: bool) -> GrammarId {
        let c: Vec<GrammarId> = (0..=particles.len()).map(|_| self.alloc()).collect();
        let r: Vec<Option<GrammarId>> =
            particles.iter().map(|p| p.unbounded.then(|| self.alloc())).collect();

        let characters = |state: GrammarId| Production { terminal: Terminal::CharactersUntyped, next: state };

        let mut after = vec![end_element()];
        if mixed {
            after.push(characters(c[particles.len()]));
        }
        self.set(c[particles.len()], after.clone());

        for (k, particle) in particles.iter().enumerate().rev() {
            let terminal = self.particle_terminal(&particle.term);
            if let Some(repeat) = r[k] {
                let mut prods = vec![Production { terminal: terminal.clone(), next: repeat }];
                if mixed {
                    prods.push(characters(repeat));
                }
                merge(&mut prods, &after);
                self.set(repeat, prods);
            }
            let mut prods = vec![Production { terminal, next: r[k].unwrap_or(c[k + 1]) }];
            if mixed {
                prods.push(characters(c[k]));
            }
            if particle.optional {
                merge(&mut prods, &after);
            }
            self.set(c[k], prods.clone());
            after = prods;
        }
        c[0]
    }

    fn particle_terminal(&self, term: &ParticleTerm) -> Terminal {
        match term {
            ParticleTerm::Element(id) => Terminal::StartElement(*id),
            ParticleTerm::Wildcard(Wildcard::Any) => Terminal::StartElementAny,
            ParticleTerm::Wildcard(Wildcard::Namespace(uri)) => Terminal::StartElementNs(uri.clone()),
        }
    }

    /// Attribut-Zustände vor `content`; liefert den ersten Zustand.
    fn attribute_chain(&mut self, def: &ComplexTypeDef, content: GrammarId) -> GrammarId {
        let mut uses: Vec<&AttributeUse> = def.attributes.iter().collect();
        uses.sort_by(|a, b| {
            let (a, b) = (&self.attributes[a.attribute], &self.attributes[b.attribute]);
            (&a.local_name, &a.uri).cmp(&(&b.local_name, &b.uri))
        });
        let wildcard = def.attribute_wildcard.as_ref().map(|w| match w {
            Wildcard::Any => Terminal::AttributeAny,
            Wildcard::Namespace(uri) => Terminal::AttributeNs(uri.clone()),
        });

        let mut after = self.states[content].productions.clone();
        if let Some(terminal) = &wildcard {
            after.insert(0, Production { terminal: terminal.clone(), next: content });
            self.set(content, after.clone());
        }
        self.states[content].start_tag = true;

        let mut next = content;
        for attribute in uses.into_iter().rev() {
            let state = self.alloc();
            let mut prods = vec![Production { terminal: Terminal::Attribute(attribute.attribute), next }];
            if let Some(terminal) = &wildcard {
                prods.push(Production { terminal: terminal.clone(), next: state });
            }
            if !attribute.required {
                merge(&mut prods, &after);
            }
            self.states[state].start_tag = true;
            self.set(state, prods.clone());
            after = prods;
            next = state;
        }
        self.states[next].first = true;
        next
    }
}

fn end_element() -> Production {
    Production { terminal: Terminal::EndElement, next: 0 }
}

/// Übernimmt Produktionen, deren Terminal noch fehlt.
fn merge(into: &mut Vec<Production>, from: &[Production]) {
    for production in from {
        if !into.iter().any(|p| p.terminal == production.terminal) {
            into.push(production.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminals(table: &GrammarTable, grammar: GrammarId) -> Vec<Terminal> {
        (0..table.production_count(grammar))
            .filter_map(|i| table.production(grammar, i))
            .map(|p| p.terminal.clone())
            .collect()
    }

    #[test]
    fn builtins_registriert() {
        let table = GrammarTable::builder().build();
        assert!(table.is_schema_informed());
        let int = table.named_type(URI_XSD, "int").unwrap();
        let info = table.type_info(int).unwrap();
        assert_eq!(info.family, Family::Integer);
        assert_eq!(info.integer, Some(IntegerRepr::Signed));
        let byte = table.named_type(URI_XSD, "byte").unwrap();
        let repr = table.type_info(byte).unwrap().integer.unwrap();
        assert_eq!(repr, IntegerRepr::NBit { min: -128, max: 127 });
        assert_eq!(repr.bits(), 8);
        let ulong = table.named_type(URI_XSD, "unsignedLong").unwrap();
        assert_eq!(table.type_info(ulong).unwrap().integer, Some(IntegerRepr::Unsigned));
        // Alle 46 Namen aus EXI Table D-5
        for name in crate::string_table::XSD_LOCAL_NAMES {
            assert!(table.named_type(URI_XSD, name).is_some(), "{name}");
        }
    }

    #[test]
    fn ableitung_und_subtypen() {
        let mut b = GrammarTable::builder();
        let int = b.builtin("int").unwrap();
        let small = b.simple_type(SimpleTypeDef::restriction(int).named("urn:t", "Small").min_inclusive(10).max_inclusive(20));
        let table = b.build();
        let info = table.type_info(small).unwrap();
        assert_eq!(info.integer, Some(IntegerRepr::NBit { min: 10, max: 20 }));
        assert!(table.type_info(int).unwrap().has_named_subtypes);
        assert!(!info.has_named_subtypes);
        assert_eq!(table.ancestry(small)[..2], [small, int]);
        assert_eq!(table.named_type("urn:t", "Small"), Some(small));
    }

    #[test]
    fn pattern_liefert_rcs() {
        let mut b = GrammarTable::builder();
        let string = b.builtin("string").unwrap();
        let code = b.simple_type(SimpleTypeDef::restriction(string).pattern(Some(vec!['A', 'B', 'C'])));
        let free = b.simple_type(SimpleTypeDef::restriction(string).pattern(None));
        let table = b.build();
        let info = table.type_info(code).unwrap();
        assert!(info.has_pattern);
        assert_eq!(info.rcs.as_ref().map(RestrictedCharSet::len), Some(3));
        assert!(table.type_info(free).unwrap().rcs.is_none());
    }

    #[test]
    fn simple_type_grammar() {
        let table = GrammarTable::builder().build();
        let string = table.named_type(URI_XSD, "string").unwrap();
        let g = table.type_grammar(string).unwrap();
        assert_eq!(terminals(&table, g), vec![Terminal::Characters(string)]);
        assert!(table.is_first(g));
        assert!(table.is_start_tag(g));
        assert_eq!(table.content_grammar(g), Some(g));
        let next = table.production(g, 0).unwrap().next;
        assert!(table.has_end_element(next));
        assert!(!table.is_start_tag(next));
        let empty = table.empty_content_grammar(g).unwrap();
        assert_eq!(terminals(&table, empty), vec![Terminal::EndElement]);
    }

    /// `<a id? x>` mit Sequenz (b, c*) und sortierten Attributen.
    #[test]
    fn complex_type_zustaende() {
        let mut b = GrammarTable::builder();
        let string = b.builtin("string").unwrap();
        let x = b.attribute("", "x", string);
        let id = b.attribute("", "id", string);
        let eb = b.element("", "b", string);
        let ec = b.element("", "c", string);
        let ty = b.complex_type(
            ComplexTypeDef::new(ComplexContent::Elements {
                particles: vec![Particle::once(eb), Particle::zero_or_more(ec)],
                mixed: false,
            })
            .attribute(x, true)
            .attribute(id, false),
        );
        b.global_element("", "a", ty);
        let table = b.build();

        let a0 = table.type_grammar(ty).unwrap();
        // id (optional) vor x (required): AT(id), AT(x)
        assert_eq!(terminals(&table, a0), vec![Terminal::Attribute(id), Terminal::Attribute(x)]);
        let a1 = table.production(a0, 1).unwrap().next;
        assert_eq!(terminals(&table, a1), vec![Terminal::Attribute(x)]);
        let content = table.production(a1, 0).unwrap().next;
        assert_eq!(table.content_grammar(a0), Some(content));
        assert!(table.is_start_tag(content));
        assert_eq!(terminals(&table, content), vec![Terminal::StartElement(eb)]);

        let c1 = table.production(content, 0).unwrap().next;
        assert!(!table.is_start_tag(c1));
        assert_eq!(terminals(&table, c1), vec![Terminal::StartElement(ec), Terminal::EndElement]);
        let repeat = table.production(c1, 0).unwrap().next;
        assert_eq!(terminals(&table, repeat), vec![Terminal::StartElement(ec), Terminal::EndElement]);
        assert_eq!(table.production(repeat, 0).unwrap().next, repeat);

        // TypeEmpty: Attribute, dann nur EE
        let empty = table.empty_content_grammar(a0).unwrap();
        assert_eq!(terminals(&table, empty), vec![Terminal::Attribute(id), Terminal::Attribute(x)]);
    }

    #[test]
    fn optionale_attribute_und_wildcard() {
        let mut b = GrammarTable::builder();
        let string = b.builtin("string").unwrap();
        let a = b.attribute("", "a", string);
        let ty = b.complex_type(
            ComplexTypeDef::new(ComplexContent::Elements { particles: Vec::new(), mixed: true })
                .attribute(a, false)
                .attribute_wildcard(Wildcard::Namespace("urn:w".into())),
        );
        let table = b.build();
        let g = table.type_grammar(ty).unwrap();
        assert_eq!(
            terminals(&table, g),
            vec![
                Terminal::Attribute(a),
                Terminal::AttributeNs("urn:w".into()),
                Terminal::EndElement,
                Terminal::CharactersUntyped,
            ]
        );
        // AT(urn:w:*) bleibt im Zustand
        assert_eq!(table.production(g, 1).unwrap().next, g);
    }

    #[test]
    fn globale_elemente_sortiert() {
        let mut b = GrammarTable::builder();
        let string = b.builtin("string").unwrap();
        let int = b.builtin("int").unwrap();
        let z = b.global_element("", "z", string);
        let a2 = b.global_element("urn:b", "a", string);
        let a1 = b.global_element("urn:a", "a", string);
        b.element("", "z", int);
        let table = b.build();
        assert_eq!(table.global_elements(), &[a1, a2, z]);
        assert_eq!(table.global_element("urn:b", "a"), Some(a2));
        assert_eq!(table.global_element("", "nope"), None);

        // "z" ist zweimal mit verschiedenen Typen deklariert
        let fragment = table.fragment_elements();
        assert_eq!(fragment.len(), 3);
        assert_eq!(fragment[2].local_name, "z");
        assert_eq!(fragment[2].decl, None);
        assert_eq!(fragment[0].decl, Some(a1));
    }

    #[test]
    fn seed_enthaelt_deklarationen() {
        let mut b = GrammarTable::builder();
        let string = b.builtin("string").unwrap();
        b.global_element("urn:x", "root", string);
        let table = b.build();
        let (uris, names) = table.string_table_seed();
        assert!(uris.contains(&"urn:x"));
        assert!(names.contains(&("urn:x", "root")));
        assert!(names.contains(&(URI_XSD, "int")));
    }

    #[test]
    fn schemaless_ist_leer() {
        let table = GrammarTable::schemaless();
        assert!(!table.is_schema_informed());
        assert!(table.global_elements().is_empty());
        assert_eq!(table.named_type(URI_XSD, "int"), None);
        assert_eq!(table.production_count(0), 0);
    }
}
