#![no_main]
use libfuzzer_sys::fuzz_target;
use erxi_stream::{CodecConfig, GrammarTable, Scanner};

fuzz_target!(|data: &[u8]| {
    // Dekodierte Events mit den Optionen des Streams erneut schreiben:
    // dieselben Events kommen zurück
    let grammar = GrammarTable::schemaless();
    let Ok(mut scanner) = Scanner::new(data, &CodecConfig::default(), &grammar) else {
        return;
    };
    let config = CodecConfig::default().with_options(scanner.options().clone());
    let mut events = Vec::new();
    loop {
        match scanner.next_event() {
            Ok(Some(event)) => events.extend(event.to_event()),
            Ok(None) => break,
            Err(_) => return,
        }
    }
    if let Ok(bytes) = erxi_stream::encode(&events, &config, &grammar) {
        assert_eq!(erxi_stream::decode(&bytes, &config, &grammar).unwrap(), events);
    }
});
