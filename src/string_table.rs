//! String Table (EXI 7.3, Appendix D).
//!
//! Vier Partitionsarten vergeben fortlaufende Compact IDs an zuerst
//! gesehene Strings:
//! - URI (stream-weit)
//! - Prefix und Local-Name (je URI)
//! - Value (global plus lokal je Qualified Name)
//!
//! Lebensdauer: eine StringTable pro EXI-Stream. Scanner und Scriber
//! halten je eine eigene Instanz und müssen sie identisch fortschreiben,
//! sonst divergieren die Bitbreiten.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::FastHashMap;
use crate::grammar::CompiledGrammar;
use crate::options::ExiOptions;

/// Well-known namespace URIs (EXI Table D-1, D-2).
pub const URI_EMPTY: &str = "";
pub const URI_XML: &str = "http://www.w3.org/XML/1998/namespace";
/// XML Schema instance namespace (xsi:type, xsi:nil).
pub const URI_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// XML Schema namespace, present in schema-informed streams.
pub const URI_XSD: &str = "http://www.w3.org/2001/XMLSchema";

pub const URI_ID_EMPTY: usize = 0;
pub const URI_ID_XML: usize = 1;
pub const URI_ID_XSI: usize = 2;
pub const URI_ID_XSD: usize = 3;

/// Local-Name IDs in der XSI-Partition (alphabetisch, Table D-4).
pub const XSI_NIL: usize = 0;
pub const XSI_TYPE: usize = 1;

const XML_LOCAL_NAMES: [&str; 4] = ["base", "id", "lang", "space"];
const XSI_LOCAL_NAMES: [&str; 2] = ["nil", "type"];

/// EXI Table D-5: die 46 eingebauten XSD-Typnamen, alphabetisch.
pub const XSD_LOCAL_NAMES: [&str; 46] = [
    "ENTITIES", "ENTITY", "ID", "IDREF", "IDREFS", "NCName", "NMTOKEN", "NMTOKENS",
    "NOTATION", "Name", "QName", "anySimpleType", "anyType", "anyURI", "base64Binary",
    "boolean", "byte", "date", "dateTime", "decimal", "double", "duration", "float",
    "gDay", "gMonth", "gMonthDay", "gYear", "gYearMonth", "hexBinary", "int", "integer",
    "language", "long", "negativeInteger", "nonNegativeInteger", "nonPositiveInteger",
    "normalizedString", "positiveInteger", "short", "string", "time", "token",
    "unsignedByte", "unsignedInt", "unsignedLong", "unsignedShort",
];

/// Value-Kontext: (URI-ID, Local-Name-ID) des Elements bzw. Attributs.
pub type ValueKey = (usize, usize);

/// Ab dieser Größe bekommt eine Partition einen Hash-Index.
const PARTITION_LINEAR_THRESHOLD: usize = 64;

/// Append-only String→ID Partition.
///
/// Kleine Partitionen (URIs, Prefixe) werden linear durchsucht, größere
/// legen lazy einen Hash-Index an.
#[derive(Clone, Default)]
struct Partition {
    entries: Vec<Rc<str>>,
    index: Option<FastHashMap<Rc<str>, usize>>,
}

impl Partition {
    fn with_entries<'s>(values: impl IntoIterator<Item = &'s str>) -> Self {
        let mut partition = Self::default();
        for value in values {
            partition.intern(value);
        }
        partition
    }

    #[inline]
    fn lookup(&self, value: &str) -> Option<usize> {
        match &self.index {
            Some(map) => map.get(value).copied(),
            None => self.entries.iter().position(|e| &**e == value),
        }
    }

    /// Idempotent: bekannte Strings behalten ihre ID.
    fn intern(&mut self, value: &str) -> usize {
        if let Some(existing) = self.lookup(value) {
            return existing;
        }
        let id = self.entries.len();
        let rc: Rc<str> = value.into();
        if let Some(map) = &mut self.index {
            map.insert(Rc::clone(&rc), id);
        } else if id + 1 >= PARTITION_LINEAR_THRESHOLD {
            let mut map = FastHashMap::with_capacity_and_hasher(id + 1, Default::default());
            for (i, e) in self.entries.iter().enumerate() {
                map.insert(Rc::clone(e), i);
            }
            map.insert(Rc::clone(&rc), id);
            self.index = Some(map);
        }
        self.entries.push(rc);
        id
    }

    fn get(&self, id: usize) -> Option<&Rc<str>> {
        self.entries.get(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// ID→Value Speicher einer Value-Partition. Verdrängte Einträge werden zu
/// Löchern; die Bitbreite richtet sich nach der höchsten vergebenen ID.
#[derive(Clone, Default)]
struct ValueStore {
    entries: Vec<Option<Rc<str>>>,
    /// Belegte Einträge (ohne Löcher).
    count: usize,
}

impl ValueStore {
    fn get(&self, id: usize) -> Option<&Rc<str>> {
        self.entries.get(id)?.as_ref()
    }

    fn push(&mut self, rc: Rc<str>) -> usize {
        self.entries.push(Some(rc));
        self.count += 1;
        self.entries.len() - 1
    }

    fn set(&mut self, id: usize, rc: Rc<str>) {
        if id >= self.entries.len() {
            self.entries.resize(id + 1, None);
        }
        if self.entries[id].is_none() {
            self.count += 1;
        }
        self.entries[id] = Some(rc);
    }

    fn remove(&mut self, id: usize) -> Option<Rc<str>> {
        let old = self.entries.get_mut(id)?.take();
        if old.is_some() {
            self.count -= 1;
        }
        old
    }

    /// Größe für die Bitbreite: höchste vergebene ID + 1.
    fn size_for_bits(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone, Copy)]
struct ValueInfo {
    key: ValueKey,
    global_id: usize,
    local_id: usize,
}

/// Ergebnis eines Value-Lookups (EXI 7.3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHit {
    /// Treffer in der lokalen Partition des aktuellen Qualified Name.
    Local(usize),
    /// Treffer in der globalen Partition.
    Global(usize),
    Miss,
}

/// Per-stream string table.
#[derive(Clone)]
pub struct StringTable {
    uri: Partition,
    /// Index = URI-ID
    prefix: Vec<Partition>,
    /// Index = URI-ID
    local_name: Vec<Partition>,
    value_lookup: FastHashMap<Rc<str>, ValueInfo>,
    global_value: ValueStore,
    local_value: FastHashMap<ValueKey, ValueStore>,
    /// Nächste globale ID (läuft bei begrenzter Kapazität im Kreis).
    next_global: usize,
    /// Global-ID → Eigentümer, für das Entfernen aus der lokalen Partition.
    global_owner: Vec<Option<(ValueKey, usize)>>,
    value_max_length: Option<usize>,
    value_partition_capacity: Option<usize>,
}

impl StringTable {
    /// Schema-less pre-population (EXI D.1-D.3).
    pub fn new(value_max_length: Option<usize>, value_partition_capacity: Option<usize>) -> Self {
        let uri = Partition::with_entries([URI_EMPTY, URI_XML, URI_XSI]);
        let local_name = vec![
            Partition::default(),
            Partition::with_entries(XML_LOCAL_NAMES),
            Partition::with_entries(XSI_LOCAL_NAMES),
        ];
        Self::assemble(uri, local_name, value_max_length, value_partition_capacity)
    }

    /// Schema-informed pre-population: the XSD namespace and its built-in
    /// type names, then the grammar's URIs and names, each partition sorted.
    pub fn schema_informed<'s>(
        uris: impl IntoIterator<Item = &'s str>,
        names: impl IntoIterator<Item = (&'s str, &'s str)>,
        value_max_length: Option<usize>,
        value_partition_capacity: Option<usize>,
    ) -> Self {
        const BUILTIN_URIS: [&str; 4] = [URI_EMPTY, URI_XML, URI_XSI, URI_XSD];

        let mut by_uri: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        by_uri.entry(URI_XML).or_default().extend(XML_LOCAL_NAMES);
        by_uri.entry(URI_XSI).or_default().extend(XSI_LOCAL_NAMES);
        by_uri.entry(URI_XSD).or_default().extend(XSD_LOCAL_NAMES);
        let mut extra_uris: BTreeSet<&str> = uris.into_iter().collect();
        for (uri, local) in names {
            by_uri.entry(uri).or_default().insert(local);
            extra_uris.insert(uri);
        }

        let mut uri = Partition::with_entries(BUILTIN_URIS);
        for extra in extra_uris {
            uri.intern(extra);
        }
        let local_name = uri
            .entries
            .iter()
            .map(|u| match by_uri.get(&**u) {
                Some(names) => Partition::with_entries(names.iter().copied()),
                None => Partition::default(),
            })
            .collect();
        Self::assemble(uri, local_name, value_max_length, value_partition_capacity)
    }

    /// Table of one stream: Appendix D defaults for a schema-less grammar,
    /// otherwise seeded from the grammar.
    pub fn for_grammar(grammar: &dyn CompiledGrammar, options: &ExiOptions) -> Self {
        let max_length = options.value_max_length().map(|n| n as usize);
        let capacity = options.value_partition_capacity().map(|n| n as usize);
        if !grammar.is_schema_informed() {
            return Self::new(max_length, capacity);
        }
        let (uris, names) = grammar.string_table_seed();
        Self::schema_informed(uris, names, max_length, capacity)
    }

    fn assemble(
        uri: Partition,
        mut local_name: Vec<Partition>,
        value_max_length: Option<usize>,
        value_partition_capacity: Option<usize>,
    ) -> Self {
        let mut prefix: Vec<Partition> = vec![
            Partition::with_entries([""]),
            Partition::with_entries(["xml"]),
            Partition::with_entries(["xsi"]),
        ];
        prefix.resize_with(uri.len(), Partition::default);
        local_name.resize_with(uri.len(), Partition::default);
        Self {
            uri,
            prefix,
            local_name,
            value_lookup: FastHashMap::default(),
            global_value: ValueStore::default(),
            local_value: FastHashMap::default(),
            next_global: 0,
            global_owner: Vec::new(),
            value_max_length,
            value_partition_capacity,
        }
    }

    // === URI Partition ===

    pub fn lookup_uri(&self, uri: &str) -> Option<usize> {
        self.uri.lookup(uri)
    }

    /// Fügt eine URI hinzu und legt leere Prefix-/Local-Name-Partitionen an.
    pub fn intern_uri(&mut self, uri: &str) -> usize {
        let id = self.uri.intern(uri);
        if id >= self.prefix.len() {
            self.prefix.resize_with(id + 1, Partition::default);
            self.local_name.resize_with(id + 1, Partition::default);
        }
        id
    }

    pub fn uri(&self, id: usize) -> Option<&Rc<str>> {
        self.uri.get(id)
    }

    pub fn uri_count(&self) -> usize {
        self.uri.len()
    }

    // === Prefix Partition ===

    pub fn lookup_prefix(&self, uri_id: usize, prefix: &str) -> Option<usize> {
        self.prefix.get(uri_id)?.lookup(prefix)
    }

    pub fn intern_prefix(&mut self, uri_id: usize, prefix: &str) -> usize {
        if uri_id >= self.prefix.len() {
            self.prefix.resize_with(uri_id + 1, Partition::default);
        }
        self.prefix[uri_id].intern(prefix)
    }

    pub fn prefix(&self, uri_id: usize, id: usize) -> Option<&Rc<str>> {
        self.prefix.get(uri_id)?.get(id)
    }

    pub fn prefix_count(&self, uri_id: usize) -> usize {
        self.prefix.get(uri_id).map_or(0, Partition::len)
    }

    /// Erste URI, in deren Prefix-Partition `prefix` vorkommt.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<usize> {
        self.prefix.iter().position(|p| p.lookup(prefix).is_some())
    }

    // === Local-Name Partition ===

    pub fn lookup_local_name(&self, uri_id: usize, local_name: &str) -> Option<usize> {
        self.local_name.get(uri_id)?.lookup(local_name)
    }

    pub fn intern_local_name(&mut self, uri_id: usize, local_name: &str) -> usize {
        if uri_id >= self.local_name.len() {
            self.local_name.resize_with(uri_id + 1, Partition::default);
        }
        self.local_name[uri_id].intern(local_name)
    }

    pub fn local_name(&self, uri_id: usize, id: usize) -> Option<&Rc<str>> {
        self.local_name.get(uri_id)?.get(id)
    }

    pub fn local_name_count(&self, uri_id: usize) -> usize {
        self.local_name.get(uri_id).map_or(0, Partition::len)
    }

    // === Value Partitions ===

    /// Looks `value` up for the qualified name `key`.
    pub fn lookup_value(&self, key: ValueKey, value: &str) -> ValueHit {
        match self.value_lookup.get(value) {
            Some(info) if info.key == key => ValueHit::Local(info.local_id),
            Some(info) => ValueHit::Global(info.global_id),
            None => ValueHit::Miss,
        }
    }

    /// Adds a value literal to the global and the local partition.
    ///
    /// Skipped for empty strings, strings longer than `value_max_length`
    /// and a capacity of zero (EXI 7.3.3). With a bounded capacity the
    /// global ID wraps and the displaced value leaves both partitions.
    pub fn intern_value(&mut self, key: ValueKey, value: &str) {
        if self.should_skip_value(value) || self.value_lookup.contains_key(value) {
            return;
        }
        let global_id = self.next_global;
        if self.value_partition_capacity.is_some() {
            self.evict(global_id);
        }

        let rc: Rc<str> = value.into();
        let local_id = self.local_value.entry(key).or_default().push(Rc::clone(&rc));
        self.global_value.set(global_id, Rc::clone(&rc));
        self.value_lookup.insert(rc, ValueInfo { key, global_id, local_id });

        if global_id >= self.global_owner.len() {
            self.global_owner.resize(global_id + 1, None);
        }
        self.global_owner[global_id] = Some((key, local_id));
        self.next_global = match self.value_partition_capacity {
            Some(cap) => (global_id + 1) % cap,
            None => global_id + 1,
        };
    }

    fn should_skip_value(&self, value: &str) -> bool {
        self.value_partition_capacity == Some(0)
            || value.is_empty()
            || self
                .value_max_length
                .is_some_and(|max| value.len() > max && value.chars().count() > max)
    }

    fn evict(&mut self, slot: usize) {
        let Some((key, local_id)) = self.global_owner.get_mut(slot).and_then(Option::take) else {
            return;
        };
        if let Some(old) = self.global_value.remove(slot) {
            self.value_lookup.remove(&old);
        }
        if let Some(store) = self.local_value.get_mut(&key) {
            store.remove(local_id);
        }
        log::trace!("value partition wrapped, evicted global id {slot}");
    }

    pub fn local_value(&self, key: ValueKey, id: usize) -> Option<&Rc<str>> {
        self.local_value.get(&key)?.get(id)
    }

    pub fn global_value(&self, id: usize) -> Option<&Rc<str>> {
        self.global_value.get(id)
    }

    /// Anzahl für die Bitbreite der lokalen Partition.
    pub fn local_value_size(&self, key: ValueKey) -> usize {
        self.local_value.get(&key).map_or(0, ValueStore::size_for_bits)
    }

    /// Anzahl für die Bitbreite der globalen Partition; nach dem ersten
    /// Umlauf die Kapazität.
    pub fn global_value_size(&self) -> usize {
        self.global_value.size_for_bits()
    }

    /// Belegte Einträge der globalen Partition.
    pub fn global_value_count(&self) -> usize {
        self.global_value.count
    }

    pub fn local_value_count(&self, key: ValueKey) -> usize {
        self.local_value.get(&key).map_or(0, |s| s.count)
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_less_vorbelegung() {
        let t = StringTable::default();
        assert_eq!(t.uri_count(), 3);
        assert_eq!(t.lookup_uri(URI_XSI), Some(URI_ID_XSI));
        assert_eq!(t.lookup_prefix(URI_ID_XML, "xml"), Some(0));
        assert_eq!(t.local_name_count(URI_ID_XML), 4);
        assert_eq!(t.lookup_local_name(URI_ID_XSI, "type"), Some(XSI_TYPE));
        assert_eq!(t.lookup_local_name(URI_ID_XSI, "nil"), Some(XSI_NIL));
        assert_eq!(t.local_name_count(URI_ID_EMPTY), 0);
        assert_eq!(t.lookup_uri(URI_XSD), None);
    }

    #[test]
    fn schema_informed_vorbelegung_sortiert() {
        let t = StringTable::schema_informed(
            ["urn:z"],
            [("urn:b", "zeta"), ("urn:b", "alpha"), ("", "root")],
            None,
            None,
        );
        assert_eq!(t.lookup_uri(URI_XSD), Some(URI_ID_XSD));
        assert_eq!(t.local_name_count(URI_ID_XSD), 46);
        assert_eq!(t.lookup_local_name(URI_ID_XSD, "ENTITIES"), Some(0));
        assert_eq!(t.lookup_local_name(URI_ID_XSD, "unsignedShort"), Some(45));
        // Zusätzliche URIs alphabetisch nach den eingebauten
        assert_eq!(t.lookup_uri("urn:b"), Some(4));
        assert_eq!(t.lookup_uri("urn:z"), Some(5));
        let b = t.lookup_uri("urn:b").unwrap();
        assert_eq!(t.lookup_local_name(b, "alpha"), Some(0));
        assert_eq!(t.lookup_local_name(b, "zeta"), Some(1));
        assert_eq!(t.lookup_local_name(URI_ID_EMPTY, "root"), Some(0));
        assert_eq!(t.prefix_count(b), 0);
    }

    #[test]
    fn intern_ist_idempotent() {
        let mut t = StringTable::default();
        let id = t.intern_uri("urn:a");
        assert_eq!(id, 3);
        assert_eq!(t.intern_uri("urn:a"), 3);
        assert_eq!(t.local_name_count(id), 0);
        assert_eq!(t.intern_local_name(id, "x"), 0);
        assert_eq!(t.intern_local_name(id, "y"), 1);
        assert_eq!(t.intern_local_name(id, "x"), 0);
        assert_eq!(t.uri_for_prefix("xsi"), Some(URI_ID_XSI));
    }

    #[test]
    fn grosse_partition_nutzt_index() {
        let mut t = StringTable::default();
        for i in 0..200 {
            assert_eq!(t.intern_local_name(URI_ID_EMPTY, &format!("n{i}")), i);
        }
        assert_eq!(t.lookup_local_name(URI_ID_EMPTY, "n150"), Some(150));
        assert_eq!(t.local_name(URI_ID_EMPTY, 199).map(|s| &**s), Some("n199"));
    }

    #[test]
    fn value_local_und_global() {
        let mut t = StringTable::default();
        let a = (0, 0);
        let b = (0, 1);
        assert_eq!(t.lookup_value(a, "v"), ValueHit::Miss);
        t.intern_value(a, "v");
        assert_eq!(t.lookup_value(a, "v"), ValueHit::Local(0));
        assert_eq!(t.lookup_value(b, "v"), ValueHit::Global(0));
        t.intern_value(b, "w");
        assert_eq!(t.lookup_value(b, "w"), ValueHit::Local(0));
        assert_eq!(t.global_value(1).map(|s| &**s), Some("w"));
        assert_eq!(t.global_value_size(), 2);
        assert_eq!(t.local_value_size(a), 1);
    }

    #[test]
    fn value_optionen_verhindern_interning() {
        let mut t = StringTable::new(Some(3), None);
        t.intern_value((0, 0), "");
        t.intern_value((0, 0), "abcd");
        t.intern_value((0, 0), "abc");
        assert_eq!(t.global_value_count(), 1);

        let mut t = StringTable::new(None, Some(0));
        t.intern_value((0, 0), "x");
        assert_eq!(t.global_value_count(), 0);
    }

    #[test]
    fn wrap_entfernt_auch_lokal() {
        let mut t = StringTable::new(None, Some(2));
        t.intern_value((0, 0), "a");
        t.intern_value((0, 1), "b");
        t.intern_value((0, 2), "c");
        // "a" wurde von "c" verdrängt
        assert_eq!(t.lookup_value((0, 0), "a"), ValueHit::Miss);
        assert_eq!(t.local_value((0, 0), 0), None);
        assert_eq!(t.global_value(0).map(|s| &**s), Some("c"));
        assert_eq!(t.global_value_size(), 2);
        // Lokale Bitbreite zählt das Loch weiter mit
        assert_eq!(t.local_value_size((0, 0)), 1);
        assert_eq!(t.local_value_count((0, 0)), 0);
    }
}
