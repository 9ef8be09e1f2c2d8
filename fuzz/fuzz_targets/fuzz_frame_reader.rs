#![no_main]

use fzd::server::FrameReader;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the reader; a small limit keeps
    // huge declared lengths from allocating
    let mut reader = FrameReader::new(Cursor::new(data)).with_max_frame_len(1 << 16);
    while let Ok(Some(body)) = reader.receive() {
        assert!(body.len() <= 1 << 16);
    }
});
