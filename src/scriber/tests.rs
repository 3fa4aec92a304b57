use super::*;
use crate::grammar::{ComplexContent, ComplexTypeDef, GrammarTable, Particle};
use crate::options::Preserve;

fn scriber<'a>(out: &'a mut Vec<u8>, config: &CodecConfig, grammar: &'a dyn CompiledGrammar) -> Scriber<'a> {
    Scriber::new(out, config, grammar).unwrap()
}

fn written(events: &[ExiEvent], config: &CodecConfig, grammar: &dyn CompiledGrammar) -> Vec<u8> {
    crate::encode(events, config, grammar).unwrap()
}

/// `<root><count>int</count></root>`, `count` einmal.
fn int_grammar() -> GrammarTable {
    let mut b = GrammarTable::builder();
    let int = b.builtin("int").unwrap();
    let count = b.element("", "count", int);
    let root = b.complex_type(ComplexTypeDef::new(ComplexContent::Elements {
        particles: vec![Particle::once(count)],
        mixed: false,
    }));
    b.global_element("", "root", root);
    b.build()
}

fn assert_ordering(result: Result<()>) {
    match result {
        Err(Error::OrderingViolation { .. }) => {}
        other => panic!("Expected OrderingViolation, got {other:?}"),
    }
}

// ============================================================================
// Reihenfolge
// ============================================================================

#[test]
fn events_vor_sd() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    assert_ordering(s.start_element(&QName::new("", "a")));
    assert_ordering(s.characters("x"));
    assert_ordering(s.end_document());
}

#[test]
fn sd_zweimal() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    assert_ordering(s.start_document());
}

#[test]
fn finish_vor_ed() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    assert_ordering(s.end_document());
    match s.finish() {
        Err(Error::OrderingViolation { .. }) => {}
        Err(e) => panic!("Expected OrderingViolation, got {e:?}"),
        Ok(_) => panic!("finish vor ED"),
    }
}

#[test]
fn ee_ohne_offenes_element() {
    let grammar = GrammarTable::schemaless();
    let options = ExiOptions::default().with_fragment();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default().with_options(options), &grammar);
    s.start_document().unwrap();
    assert_ordering(s.end_element());
}

#[test]
fn attribut_nach_inhalt() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    s.characters("text").unwrap();
    assert_ordering(s.attribute(&QName::new("", "id"), "1"));
}

#[test]
fn nach_ed_ist_schluss() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    s.end_element().unwrap();
    s.end_document().unwrap();
    assert_ordering(s.comment("spät"));
    assert!(s.finish().is_ok());
}

// ============================================================================
// Produktionen
// ============================================================================

#[test]
fn zweites_vorkommen_ist_kuerzer() {
    // SE(*) mit Literal beim ersten, gelerntes SE(qname) beim zweiten Mal
    let grammar = GrammarTable::schemaless();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_fragment());
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &config, &grammar);
    s.start_document().unwrap();

    let before = s.bit_position();
    s.start_element(&QName::new("", "item")).unwrap();
    s.end_element().unwrap();
    let first = s.bit_position() - before;

    let before = s.bit_position();
    s.start_element(&QName::new("", "item")).unwrap();
    s.end_element().unwrap();
    let second = s.bit_position() - before;
    assert!(second < first, "first={first} second={second}");
}

#[test]
fn strict_ohne_produktion() {
    let grammar = int_grammar();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_strict());
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &config, &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "root")).unwrap();
    match s.start_element(&QName::new("", "unbekannt")) {
        Err(Error::NoMatchingProduction { .. }) => {}
        other => panic!("Expected NoMatchingProduction, got {other:?}"),
    }
}

#[test]
fn strict_ungueltiger_wert() {
    let grammar = int_grammar();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_strict());
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &config, &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "root")).unwrap();
    s.start_element(&QName::new("", "count")).unwrap();
    match s.characters("zwölf") {
        Err(Error::NoMatchingProduction { .. }) => {}
        other => panic!("Expected NoMatchingProduction, got {other:?}"),
    }
}

#[test]
fn ungueltiger_wert_wird_untypisiert_geschrieben() {
    let grammar = int_grammar();
    let events = vec![
        ExiEvent::StartDocument,
        ExiEvent::start_element("", "root"),
        ExiEvent::start_element("", "count"),
        ExiEvent::characters("zwölf"),
        ExiEvent::EndElement,
        ExiEvent::EndElement,
        ExiEvent::EndDocument,
    ];
    let bytes = written(&events, &CodecConfig::default(), &grammar);
    assert_eq!(crate::decode(&bytes, &CodecConfig::default(), &grammar).unwrap(), events);
}

#[test]
fn typisierter_wert_wird_kanonisch() {
    let grammar = int_grammar();
    let events = |value: &str| {
        vec![
            ExiEvent::StartDocument,
            ExiEvent::start_element("", "root"),
            ExiEvent::start_element("", "count"),
            ExiEvent::characters(value),
            ExiEvent::EndElement,
            ExiEvent::EndElement,
            ExiEvent::EndDocument,
        ]
    };
    let bytes = written(&events(" +042 "), &CodecConfig::default(), &grammar);
    assert_eq!(crate::decode(&bytes, &CodecConfig::default(), &grammar).unwrap(), events("42"));

    // preserve.lexicalValues: die Schreibweise bleibt
    let options = ExiOptions::default().with_preserve(Preserve { lexical_values: true, ..Preserve::default() });
    let config = CodecConfig::default().with_options(options);
    let bytes = written(&events("+042"), &config, &grammar);
    assert_eq!(crate::decode(&bytes, &config, &grammar).unwrap(), events("+042"));
}

#[test]
fn self_contained_nicht_unterstuetzt() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    assert!(matches!(s.self_contained(), Err(Error::UnsupportedFeature(_))));
}

#[test]
fn komprimierung_nicht_unterstuetzt() {
    let grammar = GrammarTable::schemaless();
    let config = CodecConfig::default().with_options(ExiOptions::default().with_compression());
    let mut out = Vec::new();
    assert!(matches!(Scriber::new(&mut out, &config, &grammar), Err(Error::UnsupportedFeature(_))));
    assert!(out.is_empty());
}

// ============================================================================
// Fidelity
// ============================================================================

#[test]
fn nicht_erhaltene_events_werden_ignoriert() {
    let grammar = GrammarTable::schemaless();
    let plain = vec![
        ExiEvent::StartDocument,
        ExiEvent::start_element("", "a"),
        ExiEvent::characters("x"),
        ExiEvent::EndElement,
        ExiEvent::EndDocument,
    ];
    let mut noisy = plain.clone();
    noisy.insert(1, ExiEvent::comment("weg"));
    noisy.insert(3, ExiEvent::ProcessingInstruction(crate::event::PiContent { name: "t".into(), text: "d".into() }));
    noisy.insert(4, ExiEvent::EntityReference(crate::event::ErContent { name: "amp".into() }));

    let config = CodecConfig::default();
    assert_eq!(written(&noisy, &config, &grammar), written(&plain, &config, &grammar));
}

#[test]
fn xsi_type_als_attribut() {
    // Ohne Schema wird xsi:type über AT(*) als QName geschrieben
    let grammar = GrammarTable::schemaless();
    let preserve = Preserve { prefixes: true, ..Preserve::default() };
    let config = CodecConfig::default().with_options(ExiOptions::default().with_preserve(preserve));
    let mut out = Vec::new();
    {
        let mut s = scriber(&mut out, &config, &grammar);
        s.start_document().unwrap();
        s.start_element(&QName::new("", "a")).unwrap();
        s.namespace_declaration("urn:t", "t", false).unwrap();
        s.attribute(&QName::xsi_type(), "t:meinTyp").unwrap();
        s.end_element().unwrap();
        s.end_document().unwrap();
        s.finish().unwrap();
    }
    let decoded = crate::decode(&out, &config, &grammar).unwrap();
    let Some(ExiEvent::XsiType(name)) = decoded.iter().find(|e| matches!(e, ExiEvent::XsiType(_))) else {
        panic!("Expected XsiType in {decoded:?}");
    };
    assert_eq!(&*name.uri, "urn:t");
    assert_eq!(&*name.local_name, "meinTyp");
    assert_eq!(name.prefix.as_deref(), Some("t"));
}

#[test]
fn xsi_type_mit_unbekanntem_prefix() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    assert!(matches!(
        s.attribute(&QName::xsi_type(), "nix:typ"),
        Err(Error::NoMatchingProduction { .. })
    ));
}

// ============================================================================
// Binärdaten
// ============================================================================

fn hex_grammar() -> GrammarTable {
    let mut b = GrammarTable::builder();
    let ty = b.builtin("hexBinary").unwrap();
    b.global_element("", "blob", ty);
    b.build()
}

#[test]
fn binaer_zu_wenig_octets() {
    let grammar = hex_grammar();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "blob")).unwrap();
    let mut sink = s.start_binary_data(3).unwrap();
    sink.write_chunk(&[1, 2]).unwrap();
    match sink.finish() {
        Err(Error::BinarySizeMismatch { declared: 3, written: 2 }) => {}
        other => panic!("Expected BinarySizeMismatch, got {other:?}"),
    }
}

#[test]
fn binaer_zu_viele_octets() {
    let grammar = hex_grammar();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "blob")).unwrap();
    let mut sink = s.start_binary_data(2).unwrap();
    assert!(matches!(
        sink.write_chunk(&[1, 2, 3]),
        Err(Error::BinarySizeMismatch { declared: 2, written: 3 })
    ));
}

#[test]
fn binaer_ueber_io_write() {
    let grammar = hex_grammar();
    let mut out = Vec::new();
    {
        let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
        s.start_document().unwrap();
        s.start_element(&QName::new("", "blob")).unwrap();
        let mut sink = s.start_binary_data(4).unwrap();
        sink.write_all(&[0xCA, 0xFE, 0xBA, 0xBE]).unwrap();
        sink.finish().unwrap();
        s.end_element().unwrap();
        s.end_document().unwrap();
        s.finish().unwrap();
    }
    let decoded = crate::decode(&out, &CodecConfig::default(), &grammar).unwrap();
    assert_eq!(decoded[2], ExiEvent::characters("CAFEBABE"));
}

#[test]
fn events_waehrend_binaerdaten() {
    let grammar = hex_grammar();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "blob")).unwrap();
    drop(s.start_binary_data(4).unwrap());
    assert_ordering(s.end_element());
}

#[test]
fn binaer_ohne_binaertyp() {
    let grammar = GrammarTable::schemaless();
    let mut out = Vec::new();
    let mut s = scriber(&mut out, &CodecConfig::default(), &grammar);
    s.start_document().unwrap();
    s.start_element(&QName::new("", "a")).unwrap();
    assert!(matches!(s.start_binary_data(1), Err(Error::NoMatchingProduction { .. })));
}
