//! Grammar-driven event resolution (EXI 8).
//!
//! Der Resolver kennt die aktuelle Grammar-Position jedes offenen Elements
//! und liefert für sie das Event-Code-Tupel. Scanner und Scriber teilen
//! sich diese Logik; beide melden jedes Event über die `on_*`-Methoden
//! zurück, damit Lernen und Zustandswechsel identisch ablaufen.
//!
//! Positionen:
//! - Document/Fragment Grammar (EXI 8.4.1, 8.4.2, 8.5.1, 8.5.2)
//! - kompilierte Element-Zustände samt nicht deklarierter Produktionen
//!   (EXI 8.5.4.4); `content2` ist die Kopie des Content-Zustands, in die
//!   undeklarierte SE/CH/ER/CM/PI aus dem Start-Tag führen
//! - Built-in Element Grammars mit Lernen (EXI 8.4.3)
//!
//! Tupel der kompilierten Zustände hängen nur von der Grammar ab und
//! werden gecacht; Built-in Tupel werden nach jedem Lernschritt neu gebaut.

use std::rc::Rc;

use crate::event_code::{EventType, Node, Tuple};
use crate::grammar::{CompiledGrammar, ElementId, GrammarId, Terminal, TypeId, Variety};
use crate::options::ExiOptions;
use crate::qname::ExpandedNameId;
use crate::string_table::StringTable;
use crate::{Error, FastHashMap, Result};

/// Grammar position of the document or of one open element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Document,
    DocContent,
    DocEnd,
    Fragment,
    FragmentContent,
    /// Compiled state of a schema-informed grammar.
    Element { grammar: GrammarId, content2: bool },
    /// StartTagContent of a built-in element grammar.
    StartTag(usize),
    /// ElementContent of a built-in element grammar.
    ElementContent(usize),
    Finished,
}

/// Leaf of an event-code tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub event: EventType,
    /// Folgeposition; bei SE die Position des Elternelements nach dem Kind.
    pub next: Position,
}

impl Entry {
    fn new(event: EventType, next: Position) -> Self {
        Self { event, next }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    position: Position,
    name: Option<ExpandedNameId>,
    type_id: Option<TypeId>,
    nillable: bool,
}

impl Frame {
    fn document(position: Position) -> Self {
        Self { position, name: None, type_id: None, nillable: false }
    }
}

/// Learned productions of one built-in element grammar (EXI 8.4.3).
#[derive(Debug, Default)]
struct BuiltinGrammar {
    /// In Lernreihenfolge.
    start_tag: Vec<Entry>,
    content: Vec<Entry>,
    start_tag_tuple: Option<Rc<Tuple<Entry>>>,
    content_tuple: Option<Rc<Tuple<Entry>>>,
}

/// Fidelity-Optionen, die Produktionen ein- oder ausblenden (EXI 8.3).
#[derive(Debug, Clone, Copy)]
struct Pruning {
    strict: bool,
    comments: bool,
    pis: bool,
    dtd: bool,
    prefixes: bool,
    self_contained: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ElementKey {
    grammar: GrammarId,
    content2: bool,
    nillable: bool,
    typable: bool,
}

pub struct Resolver<'g> {
    grammar: &'g dyn CompiledGrammar,
    pruning: Pruning,
    frames: Vec<Frame>,
    builtins: Vec<BuiltinGrammar>,
    builtin_index: FastHashMap<ExpandedNameId, usize>,
    /// SE-Produktionen der Built-in Fragment Grammar, in Lernreihenfolge.
    fragment_learned: Vec<Entry>,
    document_tuples: FastHashMap<Position, Rc<Tuple<Entry>>>,
    element_tuples: FastHashMap<ElementKey, Rc<Tuple<Entry>>>,
}

impl<'g> Resolver<'g> {
    pub fn new(grammar: &'g dyn CompiledGrammar, options: &ExiOptions) -> Self {
        let preserve = options.preserve();
        let start = if options.fragment() { Position::Fragment } else { Position::Document };
        Self {
            grammar,
            pruning: Pruning {
                strict: options.strict(),
                comments: preserve.comments,
                pis: preserve.pis,
                dtd: preserve.dtd,
                prefixes: preserve.prefixes,
                self_contained: options.self_contained(),
            },
            frames: vec![Frame::document(start)],
            builtins: Vec::new(),
            builtin_index: FastHashMap::default(),
            fragment_learned: Vec::new(),
            document_tuples: FastHashMap::default(),
            element_tuples: FastHashMap::default(),
        }
    }

    pub fn position(&self) -> Position {
        self.frame().position
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Name of the innermost open element.
    pub fn element_name(&self) -> Option<ExpandedNameId> {
        self.frame().name
    }

    /// `true` while attributes may still follow (start tag).
    pub fn in_start_tag(&self) -> bool {
        match self.position() {
            Position::StartTag(_) => true,
            Position::Element { grammar, content2 } => !content2 && self.grammar.is_start_tag(grammar),
            _ => false,
        }
    }

    /// `true` in a compiled (schema-informed) element state.
    pub fn is_schema_position(&self) -> bool {
        matches!(self.position(), Position::Element { .. })
    }

    fn frame(&self) -> &Frame {
        // Der Dokument-Frame wird nie entfernt
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    // ========================================================================
    // Tupel
    // ========================================================================

    /// Event-code tuple of the current position.
    pub fn tuple(&mut self, table: &StringTable) -> Result<Rc<Tuple<Entry>>> {
        let position = self.position();
        match position {
            Position::Document | Position::Fragment => {
                let next = if position == Position::Document {
                    Position::DocContent
                } else {
                    Position::FragmentContent
                };
                self.cached_document(position, |_| {
                    let mut tuple = Tuple::new();
                    tuple.leaf(Entry::new(EventType::StartDocument, next));
                    Ok(tuple)
                })
            }
            Position::DocContent => self.cached_document(position, |r| r.doc_content(table)),
            Position::DocEnd => self.cached_document(position, |r| {
                let mut tuple = Tuple::new();
                tuple.leaf(Entry::new(EventType::EndDocument, Position::Finished));
                tuple.group(r.comments_pis(Position::DocEnd));
                Ok(tuple)
            }),
            Position::FragmentContent => self.cached_document(position, |r| r.fragment_content(table)),
            Position::Element { grammar, content2 } => {
                let frame = self.frame();
                let key = if self.pruning.strict {
                    ElementKey { grammar, content2, nillable: frame.nillable, typable: self.typable(frame.type_id) }
                } else {
                    ElementKey { grammar, content2, nillable: false, typable: false }
                };
                if let Some(tuple) = self.element_tuples.get(&key) {
                    return Ok(Rc::clone(tuple));
                }
                let tuple = Rc::new(self.element_tuple(key, table)?);
                self.element_tuples.insert(key, Rc::clone(&tuple));
                Ok(tuple)
            }
            Position::StartTag(b) => {
                if let Some(tuple) = &self.builtins[b].start_tag_tuple {
                    return Ok(Rc::clone(tuple));
                }
                let tuple = Rc::new(self.start_tag_tuple(b));
                self.builtins[b].start_tag_tuple = Some(Rc::clone(&tuple));
                Ok(tuple)
            }
            Position::ElementContent(b) => {
                if let Some(tuple) = &self.builtins[b].content_tuple {
                    return Ok(Rc::clone(tuple));
                }
                let tuple = Rc::new(self.element_content_tuple(b));
                self.builtins[b].content_tuple = Some(Rc::clone(&tuple));
                Ok(tuple)
            }
            Position::Finished => Err(Error::no_matching_production("any event", "after ED")),
        }
    }

    fn cached_document(
        &mut self,
        position: Position,
        build: impl FnOnce(&Self) -> Result<Tuple<Entry>>,
    ) -> Result<Rc<Tuple<Entry>>> {
        if let Some(tuple) = self.document_tuples.get(&position) {
            return Ok(Rc::clone(tuple));
        }
        let tuple = Rc::new(build(self)?);
        self.document_tuples.insert(position, Rc::clone(&tuple));
        Ok(tuple)
    }

    /// CM und PI als Untergruppe.
    fn comments_pis(&self, next: Position) -> Tuple<Entry> {
        let mut group = Tuple::new();
        if self.pruning.comments {
            group.leaf(Entry::new(EventType::Comment, next));
        }
        if self.pruning.pis {
            group.leaf(Entry::new(EventType::ProcessingInstruction, next));
        }
        group
    }

    fn element_name_id(&self, table: &StringTable, id: ElementId) -> Result<ExpandedNameId> {
        let decl = self
            .grammar
            .element(id)
            .ok_or_else(|| Error::no_matching_production(format!("element #{id}"), "grammar"))?;
        ExpandedNameId::lookup(table, &decl.uri, &decl.local_name).ok_or_else(|| {
            Error::no_matching_production(format!("SE({}:{})", decl.uri, decl.local_name), "string table")
        })
    }

    /// DocContent (EXI 8.4.1, 8.5.1).
    fn doc_content(&self, table: &StringTable) -> Result<Tuple<Entry>> {
        let mut tuple = Tuple::new();
        for &id in self.grammar.global_elements() {
            let name = self.element_name_id(table, id)?;
            tuple.leaf(Entry::new(EventType::StartElement { name, decl: Some(id) }, Position::DocEnd));
        }
        tuple.leaf(Entry::new(EventType::StartElementAny, Position::DocEnd));
        let mut second = Tuple::new();
        if self.pruning.dtd {
            second.leaf(Entry::new(EventType::DocType, Position::DocContent));
        }
        second.group(self.comments_pis(Position::DocContent));
        tuple.group(second);
        Ok(tuple)
    }

    /// FragmentContent (EXI 8.4.2, 8.5.2).
    fn fragment_content(&self, table: &StringTable) -> Result<Tuple<Entry>> {
        let here = Position::FragmentContent;
        let mut tuple = if self.grammar.is_schema_informed() {
            let mut tuple = Tuple::new();
            for element in self.grammar.fragment_elements() {
                let name = ExpandedNameId::lookup(table, &element.uri, &element.local_name).ok_or_else(|| {
                    Error::no_matching_production(
                        format!("SE({}:{})", element.uri, element.local_name),
                        "string table",
                    )
                })?;
                tuple.leaf(Entry::new(EventType::StartElement { name, decl: element.decl }, here));
            }
            tuple
        } else {
            let learned = self.fragment_learned.iter().copied().map(Node::Leaf).collect();
            Tuple::with_reversed(learned, self.fragment_learned.len())
        };
        tuple.leaf(Entry::new(EventType::StartElementAny, here));
        tuple.leaf(Entry::new(EventType::EndDocument, Position::Finished));
        tuple.group(self.comments_pis(here));
        Ok(tuple)
    }

    fn typable(&self, type_id: Option<TypeId>) -> bool {
        type_id
            .and_then(|t| self.grammar.type_info(t))
            .is_some_and(|info| info.has_named_subtypes || info.variety == Variety::Union)
    }

    /// Compiled state plus undeclared productions (EXI 8.5.4.4).
    fn element_tuple(&self, key: ElementKey, table: &StringTable) -> Result<Tuple<Entry>> {
        let g = key.grammar;
        let here = Position::Element { grammar: g, content2: key.content2 };
        let mut productions: Vec<_> = (0..self.grammar.production_count(g))
            .filter_map(|i| self.grammar.production(g, i))
            .filter(|p| !key.content2 || !is_attribute(&p.terminal))
            .collect();
        productions.sort_by_key(|p| category(&p.terminal));

        let mut tuple = Tuple::new();
        let mut invalid = Tuple::new();
        let mut has_end_element = false;
        for production in productions {
            let next = Position::Element { grammar: production.next, content2: false };
            let event = match &production.terminal {
                Terminal::StartElement(id) => {
                    EventType::StartElement { name: self.element_name_id(table, *id)?, decl: Some(*id) }
                }
                Terminal::StartElementNs(uri) => EventType::StartElementNs { uri: uri_id(table, uri)? },
                Terminal::StartElementAny => EventType::StartElementAny,
                Terminal::Attribute(id) => {
                    let decl = self
                        .grammar
                        .attribute(*id)
                        .ok_or_else(|| Error::no_matching_production(format!("attribute #{id}"), "grammar"))?;
                    let name = ExpandedNameId::lookup(table, &decl.uri, &decl.local_name).ok_or_else(|| {
                        Error::no_matching_production(
                            format!("AT({}:{})", decl.uri, decl.local_name),
                            "string table",
                        )
                    })?;
                    invalid.leaf(Entry::new(EventType::AttributeInvalid { name }, next));
                    EventType::Attribute { name, ty: Some(decl.type_id) }
                }
                Terminal::AttributeNs(uri) => EventType::AttributeNs { uri: uri_id(table, uri)? },
                Terminal::AttributeAny => EventType::AttributeAny,
                Terminal::EndElement => {
                    has_end_element = true;
                    EventType::EndElement
                }
                Terminal::Characters(ty) => EventType::Characters { ty: *ty },
                Terminal::CharactersUntyped => EventType::CharactersUntyped,
            };
            tuple.leaf(Entry::new(event, next));
        }

        let start_tag = !key.content2 && self.grammar.is_start_tag(g);
        let first = !key.content2 && self.grammar.is_first(g);
        let mut second = Tuple::new();

        if self.pruning.strict {
            if first && key.typable {
                second.leaf(Entry::new(EventType::XsiType, here));
            }
            if first && key.nillable {
                second.leaf(Entry::new(EventType::XsiNil, here));
            }
            tuple.group(second);
            return Ok(tuple);
        }

        let content = if start_tag {
            Position::Element { grammar: self.grammar.content_grammar(g).unwrap_or(g), content2: true }
        } else {
            here
        };
        if !has_end_element {
            second.leaf(Entry::new(EventType::EndElement, here));
        }
        if start_tag {
            if first {
                second.leaf(Entry::new(EventType::XsiType, here));
                second.leaf(Entry::new(EventType::XsiNil, here));
            }
            second.leaf(Entry::new(EventType::AttributeAny, here));
            invalid.leaf(Entry::new(EventType::AttributeAnyUntyped, here));
            second.group(invalid);
            if first && self.pruning.prefixes {
                second.leaf(Entry::new(EventType::NamespaceDeclaration, here));
            }
            if first && self.pruning.self_contained {
                second.leaf(Entry::new(EventType::SelfContained, here));
            }
        }
        second.leaf(Entry::new(EventType::StartElementAny, content));
        second.leaf(Entry::new(EventType::CharactersUntyped, content));
        if self.pruning.dtd {
            second.leaf(Entry::new(EventType::EntityReference, content));
        }
        second.group(self.comments_pis(content));
        tuple.group(second);
        Ok(tuple)
    }

    /// StartTagContent (EXI 8.4.3).
    fn start_tag_tuple(&self, b: usize) -> Tuple<Entry> {
        let learned = &self.builtins[b].start_tag;
        let here = Position::StartTag(b);
        let content = Position::ElementContent(b);
        let mut tuple = Tuple::with_reversed(
            learned.iter().copied().map(Node::Leaf).collect(),
            learned.len(),
        );
        let mut second = Tuple::new();
        second.leaf(Entry::new(EventType::EndElement, here));
        second.leaf(Entry::new(EventType::AttributeAny, here));
        if self.pruning.prefixes {
            second.leaf(Entry::new(EventType::NamespaceDeclaration, here));
        }
        if self.pruning.self_contained {
            second.leaf(Entry::new(EventType::SelfContained, here));
        }
        self.content_undeclared(&mut second, content);
        tuple.group(second);
        tuple
    }

    /// ElementContent (EXI 8.4.3).
    fn element_content_tuple(&self, b: usize) -> Tuple<Entry> {
        let learned = &self.builtins[b].content;
        let here = Position::ElementContent(b);
        let mut tuple = Tuple::with_reversed(
            learned.iter().copied().map(Node::Leaf).collect(),
            learned.len(),
        );
        tuple.leaf(Entry::new(EventType::EndElement, here));
        let mut second = Tuple::new();
        self.content_undeclared(&mut second, here);
        tuple.group(second);
        tuple
    }

    /// SE(*), CH, ER, CM/PI der Built-in Grammars.
    fn content_undeclared(&self, into: &mut Tuple<Entry>, next: Position) {
        into.leaf(Entry::new(EventType::StartElementAny, next));
        into.leaf(Entry::new(EventType::CharactersUntyped, next));
        if self.pruning.dtd {
            into.leaf(Entry::new(EventType::EntityReference, next));
        }
        into.group(self.comments_pis(next));
    }

    // ========================================================================
    // Übergänge
    // ========================================================================

    pub fn on_start_document(&mut self, entry: &Entry) {
        self.frame_mut().position = entry.next;
    }

    pub fn on_end_document(&mut self) {
        self.frame_mut().position = Position::Finished;
    }

    /// SE: learns SE(qname) where the built-in grammars do, moves the
    /// parent on and opens the child element.
    pub fn on_start_element(&mut self, entry: &Entry, name: ExpandedNameId, table: &StringTable) {
        let decl = match entry.event {
            EventType::StartElement { decl, .. } => decl,
            _ => None,
        };
        if matches!(entry.event, EventType::StartElementAny | EventType::StartElementNs { .. }) {
            let learned = Entry::new(EventType::StartElement { name, decl: None }, entry.next);
            match self.position() {
                Position::StartTag(b) => {
                    log::trace!("learned SE in StartTagContent #{b}");
                    self.builtins[b].start_tag.push(learned);
                    self.builtins[b].start_tag_tuple = None;
                }
                Position::ElementContent(b) => {
                    log::trace!("learned SE in ElementContent #{b}");
                    self.builtins[b].content.push(learned);
                    self.builtins[b].content_tuple = None;
                }
                Position::FragmentContent if !self.grammar.is_schema_informed() => {
                    self.fragment_learned.push(learned);
                    self.document_tuples.remove(&Position::FragmentContent);
                }
                _ => {}
            }
        }
        self.frame_mut().position = entry.next;
        let child = self.child_frame(name, decl, table);
        self.frames.push(child);
    }

    fn child_frame(&mut self, name: ExpandedNameId, decl: Option<ElementId>, table: &StringTable) -> Frame {
        let decl = decl.or_else(|| {
            if !self.grammar.is_schema_informed() {
                return None;
            }
            let uri = table.uri(name.uri)?;
            let local_name = table.local_name(name.uri, name.local_name)?;
            self.grammar.global_element(uri, local_name)
        });
        let declared = decl.and_then(|id| {
            let element = self.grammar.element(id)?;
            let grammar = self.grammar.type_grammar(element.type_id)?;
            Some((element.type_id, element.nillable, grammar))
        });
        match declared {
            Some((type_id, nillable, grammar)) => Frame {
                position: Position::Element { grammar, content2: false },
                name: Some(name),
                type_id: Some(type_id),
                nillable,
            },
            None => {
                let next_index = self.builtins.len();
                let b = *self.builtin_index.entry(name).or_insert(next_index);
                if b == next_index {
                    self.builtins.push(BuiltinGrammar::default());
                }
                Frame { position: Position::StartTag(b), name: Some(name), type_id: None, nillable: false }
            }
        }
    }

    /// AT: learns AT(qname) in StartTagContent.
    pub fn on_attribute(&mut self, entry: &Entry, name: ExpandedNameId) {
        if let (EventType::AttributeAny, Position::StartTag(b)) = (entry.event, self.position()) {
            let learned = Entry::new(EventType::Attribute { name, ty: None }, entry.next);
            self.builtins[b].start_tag.push(learned);
            self.builtins[b].start_tag_tuple = None;
        }
        self.frame_mut().position = entry.next;
    }

    /// CH: learns the untyped CH production once per built-in state.
    pub fn on_characters(&mut self, entry: &Entry) {
        match self.position() {
            Position::StartTag(b) => {
                let grammar = &mut self.builtins[b];
                if !grammar.start_tag.iter().any(|e| e.event == EventType::CharactersUntyped) {
                    grammar
                        .start_tag
                        .push(Entry::new(EventType::CharactersUntyped, Position::ElementContent(b)));
                    grammar.start_tag_tuple = None;
                }
            }
            Position::ElementContent(b) => {
                let grammar = &mut self.builtins[b];
                if !grammar.content.iter().any(|e| e.event == EventType::CharactersUntyped) {
                    grammar.content.push(Entry::new(EventType::CharactersUntyped, Position::ElementContent(b)));
                    grammar.content_tuple = None;
                }
            }
            _ => {}
        }
        self.frame_mut().position = entry.next;
    }

    /// EE: learns EE in StartTagContent and closes the element.
    pub fn on_end_element(&mut self) {
        if let Position::StartTag(b) = self.position() {
            let grammar = &mut self.builtins[b];
            if !grammar.start_tag.iter().any(|e| e.event == EventType::EndElement) {
                grammar.start_tag.push(Entry::new(EventType::EndElement, Position::StartTag(b)));
                grammar.start_tag_tuple = None;
            }
        }
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// NS, CM, PI, DT, ER, SC and the schema-informed xsi:type/xsi:nil.
    pub fn on_other(&mut self, entry: &Entry) {
        self.frame_mut().position = entry.next;
    }

    /// Switches to the grammar of the named type (EXI 8.5.4.4).
    pub fn on_xsi_type(&mut self, type_id: Option<TypeId>) {
        let Some(type_id) = type_id.filter(|_| self.grammar.is_schema_informed()) else {
            return;
        };
        let Some(grammar) = self.grammar.type_grammar(type_id) else {
            return;
        };
        let frame = self.frame_mut();
        frame.position = Position::Element { grammar, content2: false };
        frame.type_id = Some(type_id);
    }

    /// `xsi:nil="true"` switches to the TypeEmpty grammar.
    pub fn on_xsi_nil(&mut self, nil: bool) {
        if !nil {
            return;
        }
        if let Position::Element { grammar, .. } = self.position()
            && let Some(empty) = self.grammar.empty_content_grammar(grammar)
        {
            self.frame_mut().position = Position::Element { grammar: empty, content2: false };
        }
    }

    /// Type of a wildcard attribute value: the global declaration in
    /// schema-informed states, untyped otherwise.
    pub fn wildcard_attribute_type(&self, uri: &str, local_name: &str) -> Option<TypeId> {
        if !self.is_schema_position() {
            return None;
        }
        let id = self.grammar.global_attribute(uri, local_name)?;
        self.grammar.attribute(id).map(|a| a.type_id)
    }
}

fn uri_id(table: &StringTable, uri: &str) -> Result<usize> {
    table
        .lookup_uri(uri)
        .ok_or_else(|| Error::no_matching_production(format!("{uri}:*"), "string table"))
}

fn is_attribute(terminal: &Terminal) -> bool {
    matches!(terminal, Terminal::Attribute(_) | Terminal::AttributeNs(_) | Terminal::AttributeAny)
}

/// Reihenfolge der ersten Ebene: AT(qname), AT(uri:*), AT(*), SE(qname),
/// SE(uri:*), SE(*), EE, CH.
fn category(terminal: &Terminal) -> u8 {
    match terminal {
        Terminal::Attribute(_) => 0,
        Terminal::AttributeNs(_) => 1,
        Terminal::AttributeAny => 2,
        Terminal::StartElement(_) => 3,
        Terminal::StartElementNs(_) => 4,
        Terminal::StartElementAny => 5,
        Terminal::EndElement => 6,
        Terminal::Characters(_) | Terminal::CharactersUntyped => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{ComplexContent, ComplexTypeDef, GrammarTable, Particle};
    use crate::options::Preserve;

    fn codes(tuple: &Tuple<Entry>) -> Vec<(String, String)> {
        tuple.leaves().into_iter().map(|(code, e)| (code.to_string(), e.event.to_string())).collect()
    }

    fn names(table: &StringTable, uri: &str, local: &str) -> ExpandedNameId {
        ExpandedNameId::lookup(table, uri, local).unwrap()
    }

    /// DocContent ohne Schema: SE(*) allein, CM/PI als zweite Ebene.
    #[test]
    fn document_schemaless() {
        let grammar = GrammarTable::schemaless();
        let options = ExiOptions::default().with_preserve(Preserve { comments: true, pis: true, ..Preserve::default() });
        let table = StringTable::default();
        let mut r = Resolver::new(&grammar, &options);
        let sd = r.tuple(&table).unwrap();
        assert_eq!(sd.width(), 0);
        let (_, entry) = sd.locate(|e| e.event == EventType::StartDocument).unwrap();
        r.on_start_document(&entry.clone());
        let tuple = r.tuple(&table).unwrap();
        assert_eq!(
            codes(&tuple),
            [("0".into(), "SE(*)".into()), ("1.0".into(), "CM".into()), ("1.1".into(), "PI".into())]
        );
    }

    /// Gelernte Produktionen bekommen Code 0 (EXI 8.4.3).
    #[test]
    fn builtin_lernen() {
        let grammar = GrammarTable::schemaless();
        let options = ExiOptions::default().with_fragment();
        let mut table = StringTable::default();
        let root = ExpandedNameId::new(0, table.intern_local_name(0, "root"));
        let a = ExpandedNameId::new(0, table.intern_local_name(0, "a"));
        let b = ExpandedNameId::new(0, table.intern_local_name(0, "b"));
        let mut r = Resolver::new(&grammar, &options);
        let sd = r.tuple(&table).unwrap().leaves()[0].1.clone();
        r.on_start_document(&sd);
        assert_eq!(r.position(), Position::FragmentContent);
        let se = *r.tuple(&table).unwrap().locate(|e| e.event == EventType::StartElementAny).unwrap().1;
        r.on_start_element(&se, root, &table);
        assert!(matches!(r.position(), Position::StartTag(_)));

        // StartTagContent ohne Gelerntes: EE 0.0, AT(*) 0.1
        let tuple = r.tuple(&table).unwrap();
        assert_eq!(codes(&tuple)[..2], [("0.0".into(), "EE".into()), ("0.1".into(), "AT(*)".into())]);

        let at = *tuple.locate(|e| e.event == EventType::AttributeAny).unwrap().1;
        r.on_attribute(&at, a);
        let tuple = r.tuple(&table).unwrap();
        let (code, _) = tuple.locate(|e| matches!(e.event, EventType::Attribute { name, .. } if name == a)).unwrap();
        assert_eq!(code.to_string(), "0");
        assert_eq!(tuple.len(), 2);

        let se = *tuple.locate(|e| e.event == EventType::StartElementAny).unwrap().1;
        r.on_start_element(&se, b, &table);
        r.on_end_element();
        assert!(matches!(r.position(), Position::ElementContent(_)));
        let tuple = r.tuple(&table).unwrap();
        assert_eq!(codes(&tuple)[0], ("0".into(), "EE".into()));
        r.on_end_element();
        assert_eq!(r.depth(), 0);

        // Zweites <root>: SE(root) ist im Fragment gelernt
        let tuple = r.tuple(&table).unwrap();
        let (code, se) =
            tuple.locate(|e| matches!(e.event, EventType::StartElement { name, .. } if name == root)).unwrap();
        assert_eq!(code.to_string(), "0");
        let se = *se;
        r.on_start_element(&se, root, &table);
        // AT(a) und SE(b) sind gelernt, das jüngste zuerst
        let tuple = r.tuple(&table).unwrap();
        assert_eq!(codes(&tuple)[0], ("0".into(), "SE(0:2)".into()));
        assert_eq!(codes(&tuple)[1], ("1".into(), "AT(0:1)".into()));
    }

    fn typed_grammar() -> GrammarTable {
        let mut b = GrammarTable::builder();
        let int = b.builtin("int").unwrap();
        let string = b.builtin("string").unwrap();
        let id = b.attribute("", "id", int);
        let child = b.element("", "child", string);
        let ty = b.complex_type(
            ComplexTypeDef::new(ComplexContent::Elements { particles: vec![Particle::once(child)], mixed: false })
                .attribute(id, true),
        );
        b.global_element("", "root", ty);
        b.build()
    }

    fn enter_root<'g>(grammar: &'g GrammarTable, options: &ExiOptions, table: &StringTable) -> Resolver<'g> {
        let mut r = Resolver::new(grammar, options);
        let sd = r.tuple(table).unwrap().leaves()[0].1.clone();
        r.on_start_document(&sd);
        let root = names(table, "", "root");
        let tuple = r.tuple(table).unwrap();
        let (code, se) = tuple.locate(|e| matches!(e.event, EventType::StartElement { name, .. } if name == root)).unwrap();
        assert_eq!(code.to_string(), "0");
        let se = *se;
        r.on_start_element(&se, root, table);
        r
    }

    fn seeded(grammar: &GrammarTable) -> StringTable {
        let (uris, names) = grammar.string_table_seed();
        StringTable::schema_informed(uris, names, None, None)
    }

    #[test]
    fn schema_zustand_nicht_strikt() {
        let grammar = typed_grammar();
        let table = seeded(&grammar);
        let mut r = enter_root(&grammar, &ExiOptions::default(), &table);
        let tuple = r.tuple(&table).unwrap();
        let leaves = codes(&tuple);
        // AT(id) typisiert auf der ersten Ebene, dann EE, xsi:type, xsi:nil, AT(*), [AT(id) untyped, AT(*) untyped]
        assert_eq!(leaves[0].0, "0");
        assert!(leaves[0].1.starts_with("AT("));
        assert_eq!(leaves[1], ("1.0".into(), "EE".into()));
        assert_eq!(leaves[2], ("1.1".into(), "AT(xsi:type)".into()));
        assert_eq!(leaves[3], ("1.2".into(), "AT(xsi:nil)".into()));
        assert_eq!(leaves[4], ("1.3".into(), "AT(*)".into()));
        assert!(leaves[5].0 == "1.4.0" && leaves[5].1.ends_with("[untyped]"));
        assert_eq!(leaves[6], ("1.4.1".into(), "AT(*)[untyped]".into()));
        assert_eq!(leaves[7], ("1.5".into(), "SE(*)".into()));

        // Undeklariertes CH im Start-Tag führt nach content2: dort kein AT mehr
        let (_, ch) = tuple.locate(|e| e.event == EventType::CharactersUntyped).unwrap();
        let ch = *ch;
        r.on_characters(&ch);
        assert!(matches!(r.position(), Position::Element { content2: true, .. }));
        assert!(!r.in_start_tag());
        let tuple = r.tuple(&table).unwrap();
        assert!(tuple.locate(|e| matches!(e.event, EventType::AttributeAny)).is_none());
    }

    #[test]
    fn schema_zustand_strikt() {
        let grammar = typed_grammar();
        let table = seeded(&grammar);
        let options = ExiOptions::default().with_strict();
        let mut r = enter_root(&grammar, &options, &table);
        let tuple = r.tuple(&table).unwrap();
        // Nur AT(id): Typ ohne Subtypen, Element nicht nillable
        assert_eq!(tuple.leaves().len(), 1);
        assert_eq!(tuple.width(), 0);
    }

    #[test]
    fn xsi_nil_wechselt_zu_type_empty() {
        let grammar = typed_grammar();
        let table = seeded(&grammar);
        let mut r = enter_root(&grammar, &ExiOptions::default(), &table);
        let tuple = r.tuple(&table).unwrap();
        let nil = *tuple.locate(|e| e.event == EventType::XsiNil).unwrap().1;
        r.on_other(&nil);
        r.on_xsi_nil(true);
        // TypeEmpty: AT(id) bleibt Pflicht, danach nur EE
        let tuple = r.tuple(&table).unwrap();
        let at = *tuple.locate(|e| matches!(e.event, EventType::Attribute { .. })).unwrap().1;
        r.on_attribute(&at, names(&table, "", "id"));
        let tuple = r.tuple(&table).unwrap();
        let (code, _) = tuple.locate(|e| e.event == EventType::EndElement).unwrap();
        assert_eq!(code.to_string(), "0");
        assert!(tuple.locate(|e| matches!(e.event, EventType::StartElement { .. })).is_none());
    }

    #[test]
    fn undeklariertes_element_nutzt_builtin() {
        let grammar = typed_grammar();
        let mut table = seeded(&grammar);
        let mut r = enter_root(&grammar, &ExiOptions::default(), &table);
        let tuple = r.tuple(&table).unwrap();
        let se = *tuple.locate(|e| e.event == EventType::StartElementAny).unwrap().1;
        let extra = ExpandedNameId::new(0, table.intern_local_name(0, "extra"));
        r.on_start_element(&se, extra, &table);
        assert!(matches!(r.position(), Position::StartTag(_)));
        assert_eq!(r.depth(), 2);
        r.on_end_element();
        assert!(matches!(r.position(), Position::Element { content2: true, .. }));
    }
}
