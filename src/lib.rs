//! erxi-stream – EXI 1.0 (W3C Second Edition) Stream-Codec
//!
//! Bit-I/O, String Table, grammar-getriebene Event Codes und die typisierten
//! Wert-Codecs. [`Scanner`] dekodiert (Pull), [`Scriber`] kodiert (Push);
//! beide arbeiten gegen eine [`CompiledGrammar`](grammar::CompiledGrammar).
//!
//! # Beispiel
//!
//! ```
//! use erxi_stream::{CodecConfig, ExiEvent, GrammarTable};
//!
//! let grammar = GrammarTable::schemaless();
//! let config = CodecConfig::default().with_cookie();
//!
//! // Encode
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start_element("", "greeting"),
//!     ExiEvent::attribute("", "lang", "de"),
//!     ExiEvent::characters("Hallo"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let bytes = erxi_stream::encode(&events, &config, &grammar).unwrap();
//! assert_eq!(&bytes[..4], b"$EXI");
//!
//! // Decode
//! let decoded = erxi_stream::decode(&bytes, &config, &grammar).unwrap();
//! assert_eq!(decoded, events);
//! ```

pub mod bit_width;
pub mod bitstream;
pub mod characters;
pub mod error;
pub mod event;
pub mod event_code;
pub mod grammar;
pub mod header;
pub mod integer;
pub mod options;
pub mod options_codec;
pub mod qname;
pub mod rcs;
pub mod resolver;
pub mod scanner;
pub mod scribble;
pub mod scriber;
pub mod string;
pub mod string_table;
pub mod unsigned_integer;
pub mod value;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent, für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Events
pub use characters::{Characters, EventContent, EventDescription};
pub use event::{AtContent, ChContent, CmContent, DtContent, ErContent, ExiEvent, NsContent, PiContent};
pub use event_code::EventType;

// Public API: Options
pub use options::{Alignment, CodecConfig, ExiOptions, Preserve, SchemaId};

// Public API: Header
pub use header::ExiHeader;

// Public API: Scanner/Scriber
pub use scanner::{BinaryDataSource, Scanner};
pub use scriber::{BinaryDataSink, Scriber};

// Public API: Types
pub use grammar::{CompiledGrammar, GrammarTable};
pub use qname::QName;

/// Encodes a complete event sequence.
///
/// # Errors
///
/// Errors of [`Scriber`], e.g. `NoMatchingProduction` for an event the
/// grammar has no production for in strict mode.
pub fn encode(events: &[ExiEvent], config: &CodecConfig, grammar: &dyn CompiledGrammar) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut scriber = Scriber::new(&mut out, config, grammar)?;
        for event in events {
            scriber.event(event)?;
        }
        scriber.finish()?;
    }
    Ok(out)
}

/// Decodes a complete stream into owned events.
///
/// Binary values are delivered whole, regardless of the configured chunk
/// size.
pub fn decode(data: &[u8], config: &CodecConfig, grammar: &dyn CompiledGrammar) -> Result<Vec<ExiEvent>> {
    let mut config = config.clone();
    config.set_binary_chunk_size(None);
    let mut scanner = Scanner::new(data, &config, grammar)?;
    let mut events = Vec::new();
    while let Some(event) = scanner.next_event()? {
        if let Some(event) = event.to_event() {
            events.push(event);
        }
    }
    Ok(events)
}
