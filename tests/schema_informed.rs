//! Schema-informierte Streams: typisierte Werte, xsi:type, xsi:nil und
//! die Rückfälle auf untypisierte Produktionen (EXI 8.5.4.4).

use erxi_stream::grammar::{ComplexContent, ComplexTypeDef, Particle, SimpleTypeDef};
use erxi_stream::string_table::URI_XSD;
use erxi_stream::{CodecConfig, Error, ExiEvent, ExiOptions, GrammarTable, QName, Scriber};

/// `<werte>` mit je einem Kind pro Wert-Familie, in fester Reihenfolge.
fn werte_grammar() -> GrammarTable {
    let mut b = GrammarTable::builder();
    let builtin = |b: &erxi_stream::grammar::GrammarTableBuilder, name: &str| b.builtin(name).unwrap();
    let int = builtin(&b, "int");
    let decimal = builtin(&b, "decimal");
    let double = builtin(&b, "double");
    let boolean = builtin(&b, "boolean");
    let date_time = builtin(&b, "dateTime");
    let unsigned_byte = builtin(&b, "unsignedByte");
    let string = builtin(&b, "string");
    let list = b.simple_type(SimpleTypeDef::list(int));
    let color = b.simple_type(SimpleTypeDef::restriction(string).enumeration(["rot", "grün", "blau"]));

    let children = [
        ("i", int),
        ("d", decimal),
        ("f", double),
        ("b", boolean),
        ("t", date_time),
        ("n", unsigned_byte),
        ("l", list),
        ("c", color),
    ];
    let particles = children.iter().map(|&(name, ty)| Particle::once(b.element("", name, ty))).collect();
    let root = b.complex_type(ComplexTypeDef::new(ComplexContent::Elements { particles, mixed: false }));
    b.global_element("", "werte", root);
    b.build()
}

fn werte_events(values: [&str; 8]) -> Vec<ExiEvent> {
    let mut events = vec![ExiEvent::StartDocument, ExiEvent::start_element("", "werte")];
    for (name, value) in ["i", "d", "f", "b", "t", "n", "l", "c"].into_iter().zip(values) {
        events.push(ExiEvent::start_element("", name));
        events.push(ExiEvent::characters(value));
        events.push(ExiEvent::EndElement);
    }
    events.push(ExiEvent::EndElement);
    events.push(ExiEvent::EndDocument);
    events
}

fn round_trip(events: &[ExiEvent], config: &CodecConfig, grammar: &GrammarTable) -> Vec<ExiEvent> {
    let bytes = erxi_stream::encode(events, config, grammar).unwrap();
    erxi_stream::decode(&bytes, config, grammar).unwrap()
}

// ============================================================================
// Typisierte Werte
// ============================================================================

#[test]
fn kanonische_werte() {
    let grammar = werte_grammar();
    let input = werte_events([
        " -17 ",
        "0012.3400",
        "1.5",
        "1",
        "2024-02-29T23:59:59Z",
        "255",
        " 1  -2 300 ",
        "grün",
    ]);
    let expected = werte_events(["-17", "12.34", "15E-1", "true", "2024-02-29T23:59:59Z", "255", "1 -2 300", "grün"]);
    assert_eq!(round_trip(&input, &CodecConfig::default(), &grammar), expected);
}

#[test]
fn float_sonderwerte() {
    let grammar = werte_grammar();
    for special in ["INF", "-INF", "NaN"] {
        let events = werte_events(["0", "0", special, "false", "2000-01-01T00:00:00", "0", "", "rot"]);
        let decoded = round_trip(&events, &CodecConfig::default(), &grammar);
        assert_eq!(decoded[9], ExiEvent::characters(special));
    }
}

#[test]
fn lexikalische_werte_bleiben() {
    let grammar = werte_grammar();
    let options = ExiOptions::default().with_preserve(erxi_stream::Preserve {
        lexical_values: true,
        ..Default::default()
    });
    let config = CodecConfig::default().with_options(options);
    let events = werte_events(["+017", "0012.3400", "1.50", "1", "2024-02-29T23:59:59+00:00", "007", "1 2", "blau"]);
    assert_eq!(round_trip(&events, &config, &grammar), events);
}

#[test]
fn typisiert_kuerzer_als_text() {
    // Ein int-Wert braucht weniger Bits als sein Literal ohne Schema
    let grammar = werte_grammar();
    let events = werte_events(["123456789", "1", "1", "1", "2000-01-01T00:00:00Z", "1", "1", "rot"]);
    let typed = erxi_stream::encode(&events, &CodecConfig::default(), &grammar).unwrap();
    let untyped = erxi_stream::encode(&events, &CodecConfig::default(), &GrammarTable::schemaless()).unwrap();
    assert!(typed.len() < untyped.len(), "typed={} untyped={}", typed.len(), untyped.len());
}

#[test]
fn ungueltige_werte_untypisiert() {
    let grammar = werte_grammar();
    let events = werte_events(["viele", "1,5", "x", "ja", "gestern", "256", "1 zwei", "lila"]);
    assert_eq!(round_trip(&events, &CodecConfig::default(), &grammar), events);
}

#[test]
fn strict_lehnt_ungueltige_werte_ab() {
    let grammar = werte_grammar();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_strict());
    let valid = werte_events(["1", "1", "1", "1", "2000-01-01T00:00:00Z", "1", "1", "rot"]);
    assert_eq!(round_trip(&valid, &config, &grammar), valid);

    let invalid = werte_events(["1", "1", "1", "1", "2000-01-01T00:00:00Z", "256", "1", "rot"]);
    assert!(matches!(
        erxi_stream::encode(&invalid, &config, &grammar),
        Err(Error::NoMatchingProduction { .. })
    ));
}

#[test]
fn strict_lehnt_falsche_reihenfolge_ab() {
    let grammar = werte_grammar();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_strict());
    let mut out = Vec::new();
    let mut scriber = Scriber::new(&mut out, &config, &grammar).unwrap();
    scriber.start_document().unwrap();
    scriber.start_element(&QName::new("", "werte")).unwrap();
    assert!(matches!(
        scriber.start_element(&QName::new("", "d")),
        Err(Error::NoMatchingProduction { .. })
    ));
}

#[test]
fn undeklarierte_elemente_ohne_strict() {
    let grammar = werte_grammar();
    let mut events = werte_events(["1", "1", "1", "1", "2000-01-01T00:00:00Z", "1", "1", "rot"]);
    // fremdes Element und Attribut direkt im Wurzelelement
    events.insert(2, ExiEvent::attribute("", "extra", "ja"));
    events.insert(3, ExiEvent::start_element("urn:fremd", "zusatz"));
    events.insert(4, ExiEvent::characters("frei"));
    events.insert(5, ExiEvent::EndElement);
    assert_eq!(round_trip(&events, &CodecConfig::default(), &grammar), events);
}

// ============================================================================
// xsi:type und xsi:nil
// ============================================================================

/// `<v>` vom Typ string (nillable), `<liste>` mit beliebig vielen `<v>`.
fn xsi_grammar() -> GrammarTable {
    let mut b = GrammarTable::builder();
    let string = b.builtin("string").unwrap();
    let v = b.element("", "v", string);
    b.set_nillable(v);
    let liste = b.complex_type(ComplexTypeDef::new(ComplexContent::Elements {
        particles: vec![Particle::zero_or_more(v)],
        mixed: false,
    }));
    b.global_element("", "liste", liste);
    b.build()
}

fn in_liste(inner: Vec<ExiEvent>) -> Vec<ExiEvent> {
    let mut events = vec![ExiEvent::StartDocument, ExiEvent::start_element("", "liste")];
    events.extend(inner);
    events.push(ExiEvent::EndElement);
    events.push(ExiEvent::EndDocument);
    events
}

#[test]
fn xsi_type_wechselt_die_grammar() {
    let grammar = xsi_grammar();
    let input = in_liste(vec![
        ExiEvent::start_element("", "v"),
        ExiEvent::XsiType(QName::new(URI_XSD, "boolean")),
        ExiEvent::characters("1"),
        ExiEvent::EndElement,
        ExiEvent::start_element("", "v"),
        ExiEvent::characters("1"),
        ExiEvent::EndElement,
    ]);
    let decoded = round_trip(&input, &CodecConfig::default(), &grammar);
    // boolean kanonisch, der zweite Wert bleibt ein string
    assert_eq!(decoded[4], ExiEvent::characters("true"));
    assert_eq!(decoded[7], ExiEvent::characters("1"));
    assert_eq!(decoded[3], ExiEvent::XsiType(QName::new(URI_XSD, "boolean")));
}

#[test]
fn xsi_type_aus_attribut_text() {
    let grammar = xsi_grammar();
    let mut out = Vec::new();
    {
        let mut scriber = Scriber::new(&mut out, &CodecConfig::default(), &grammar).unwrap();
        scriber.start_document().unwrap();
        scriber.start_element(&QName::new("", "liste")).unwrap();
        scriber.start_element(&QName::new("", "v")).unwrap();
        // ohne Prefix: Namespace der leeren URI
        scriber.attribute(&QName::xsi_type(), "unbekannt").unwrap();
        scriber.characters("x").unwrap();
        scriber.end_element().unwrap();
        scriber.end_element().unwrap();
        scriber.end_document().unwrap();
        scriber.finish().unwrap();
    }
    let decoded = erxi_stream::decode(&out, &CodecConfig::default(), &grammar).unwrap();
    assert_eq!(decoded[3], ExiEvent::XsiType(QName::new("", "unbekannt")));
    assert_eq!(decoded[4], ExiEvent::characters("x"));
}

#[test]
fn xsi_nil_leert_das_element() {
    let grammar = xsi_grammar();
    let events = in_liste(vec![
        ExiEvent::start_element("", "v"),
        ExiEvent::XsiNil(true),
        ExiEvent::EndElement,
        ExiEvent::start_element("", "v"),
        ExiEvent::XsiNil(false),
        ExiEvent::characters("da"),
        ExiEvent::EndElement,
    ]);
    assert_eq!(round_trip(&events, &CodecConfig::default(), &grammar), events);

    // strict: nach xsi:nil="true" gibt es nur noch EE
    let config = CodecConfig::default().with_options(ExiOptions::default().with_strict());
    let mut out = Vec::new();
    let mut scriber = Scriber::new(&mut out, &config, &grammar).unwrap();
    scriber.start_document().unwrap();
    scriber.start_element(&QName::new("", "liste")).unwrap();
    scriber.start_element(&QName::new("", "v")).unwrap();
    scriber.xsi_nil(true).unwrap();
    assert!(matches!(scriber.characters("x"), Err(Error::NoMatchingProduction { .. })));
}

#[test]
fn xsi_nil_als_attribut_text() {
    let grammar = xsi_grammar();
    let input = in_liste(vec![
        ExiEvent::start_element("", "v"),
        ExiEvent::Attribute(erxi_stream::AtContent { qname: QName::xsi_nil(), value: " 1 ".into() }),
        ExiEvent::EndElement,
    ]);
    let decoded = round_trip(&input, &CodecConfig::default(), &grammar);
    assert_eq!(decoded[3], ExiEvent::XsiNil(true));
}

#[test]
fn xsi_nil_literal_bei_lexikalischen_werten() {
    let lexical = CodecConfig::default().with_options(ExiOptions::default().with_preserve(erxi_stream::Preserve {
        lexical_values: true,
        ..Default::default()
    }));
    let nil_attribute = |text: &str| {
        ExiEvent::Attribute(erxi_stream::AtContent { qname: QName::xsi_nil(), value: text.into() })
    };
    let events = |text: &str| {
        in_liste(vec![ExiEvent::start_element("", "v"), nil_attribute(text), ExiEvent::EndElement])
    };

    // Schema-Produktion AT(xsi:nil) und Built-in Grammar
    for grammar in [xsi_grammar(), GrammarTable::schemaless()] {
        for literal in ["1", " true ", "0"] {
            assert_eq!(round_trip(&events(literal), &lexical, &grammar), events(literal), "{literal:?}");
        }
        // kanonische Form wird weiter als XsiNil gemeldet
        assert_eq!(round_trip(&events("true"), &lexical, &grammar)[3], ExiEvent::XsiNil(true));
        // ohne Preserve.lexicalValues bleibt nur der Wert
        assert_eq!(round_trip(&events("1"), &CodecConfig::default(), &grammar)[3], ExiEvent::XsiNil(true));
    }

    // strict: "1" schaltet genauso auf leeren Inhalt
    let strict = CodecConfig::default().with_options(
        ExiOptions::default()
            .with_strict()
            .with_preserve(erxi_stream::Preserve { lexical_values: true, ..Default::default() }),
    );
    let mut out = Vec::new();
    let grammar = xsi_grammar();
    let mut scriber = Scriber::new(&mut out, &strict, &grammar).unwrap();
    scriber.start_document().unwrap();
    scriber.start_element(&QName::new("", "liste")).unwrap();
    scriber.start_element(&QName::new("", "v")).unwrap();
    scriber.attribute(&QName::xsi_nil(), "1").unwrap();
    assert!(matches!(scriber.characters("x"), Err(Error::NoMatchingProduction { .. })));
}
