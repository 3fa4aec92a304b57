//! Eigenschaften über zufällige Eingaben (proptest).

use erxi_stream::bitstream::{BitReader, BitWriter};
use erxi_stream::grammar::{ComplexContent, ComplexTypeDef, Particle};
use erxi_stream::options::Alignment;
use erxi_stream::{CodecConfig, ExiEvent, ExiOptions, GrammarTable, unsigned_integer};
use proptest::prelude::*;

fn int_list_grammar() -> GrammarTable {
    let mut b = GrammarTable::builder();
    let long = b.builtin("long").unwrap();
    let v = b.element("", "v", long);
    let root = b.complex_type(ComplexTypeDef::new(ComplexContent::Elements {
        particles: vec![Particle::zero_or_more(v)],
        mixed: false,
    }));
    b.global_element("", "r", root);
    b.build()
}

fn document(name: &str, children: impl IntoIterator<Item = String>) -> Vec<ExiEvent> {
    let mut events = vec![ExiEvent::StartDocument, ExiEvent::start_element("", name)];
    for text in children {
        events.push(ExiEvent::start_element("", "v"));
        events.push(ExiEvent::characters(&text));
        events.push(ExiEvent::EndElement);
    }
    events.push(ExiEvent::EndElement);
    events.push(ExiEvent::EndDocument);
    events
}

proptest! {
    /// Varint-Länge: 7 Bit pro Octet, mindestens ein Octet (EXI 7.1.6).
    #[test]
    fn varint_laenge(value in any::<u64>()) {
        let mut out = Vec::new();
        {
            let mut writer = BitWriter::new(&mut out);
            unsigned_integer::encode(&mut writer, value).unwrap();
            writer.finish().unwrap();
        }
        let bits = 64 - value.leading_zeros() as usize;
        prop_assert_eq!(out.len(), bits.div_ceil(7).max(1));
        prop_assert_eq!(out.len(), unsigned_integer::encoded_len(value));
        prop_assert_eq!(out.last().map(|b| b & 0x80), Some(0));
        prop_assert_eq!(unsigned_integer::decode(&mut BitReader::new(&out[..])).unwrap(), value);
    }

    /// Beliebiger Text übersteht den Weg durch einen Stream ohne Schema.
    #[test]
    fn text_ohne_schema(texts in prop::collection::vec("\\PC{0,12}", 0..8)) {
        let grammar = GrammarTable::schemaless();
        let events = document("r", texts);
        let bytes = erxi_stream::encode(&events, &CodecConfig::default(), &grammar).unwrap();
        prop_assert_eq!(erxi_stream::decode(&bytes, &CodecConfig::default(), &grammar).unwrap(), events);
    }

    /// xs:long-Werte kommen in kanonischer Form zurück.
    #[test]
    fn long_werte(values in prop::collection::vec(any::<i64>(), 0..8)) {
        let grammar = int_list_grammar();
        let lexical = values.iter().map(|v| format!("{v:+}"));
        let canonical = values.iter().map(|v| v.to_string());
        let bytes = erxi_stream::encode(&document("r", lexical), &CodecConfig::default(), &grammar).unwrap();
        let decoded = erxi_stream::decode(&bytes, &CodecConfig::default(), &grammar).unwrap();
        prop_assert_eq!(decoded, document("r", canonical));
    }

    /// Bit-gepackt und byte-ausgerichtet liefern dieselben Events.
    #[test]
    fn alignment_aendert_keine_events(texts in prop::collection::vec("[a-z]{0,6}", 0..6)) {
        let grammar = GrammarTable::schemaless();
        let events = document("r", texts);
        let aligned = CodecConfig::default().with_options(ExiOptions::default().with_alignment(Alignment::ByteAlignment));
        let packed = erxi_stream::encode(&events, &CodecConfig::default(), &grammar).unwrap();
        let bytes = erxi_stream::encode(&events, &aligned, &grammar).unwrap();
        prop_assert!(bytes.len() >= packed.len());
        prop_assert_eq!(
            erxi_stream::decode(&bytes, &aligned, &grammar).unwrap(),
            erxi_stream::decode(&packed, &CodecConfig::default(), &grammar).unwrap()
        );
    }
}
