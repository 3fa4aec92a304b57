#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Gelesene Optionen müssen sich wieder schreiben und gleich lesen lassen
    if let Ok(options) = erxi_stream::options_codec::decode_from_slice(data) {
        let bytes = erxi_stream::options_codec::encode_to_vec(&options).unwrap();
        assert_eq!(erxi_stream::options_codec::decode_from_slice(&bytes).unwrap(), options);
    }
});
