#![no_main]
use libfuzzer_sys::fuzz_target;
use erxi_stream::{CodecConfig, GrammarTable, Scanner};

fuzz_target!(|data: &[u8]| {
    // Event für Event, damit auch Streams ohne ED bis zum Fehler laufen
    let grammar = GrammarTable::schemaless();
    let Ok(mut scanner) = Scanner::new(data, &CodecConfig::default().with_binary_chunk_size(64), &grammar) else {
        return;
    };
    while let Ok(Some(_)) = scanner.next_event() {}
});
