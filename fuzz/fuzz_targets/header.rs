#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut reader = erxi_stream::bitstream::BitReader::new(data);
    let _ = erxi_stream::header::decode(&mut reader, &erxi_stream::ExiOptions::default());
});
