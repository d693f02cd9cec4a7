#![no_main]

use heif_handler::{sniff, Format};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let from_bytes = Format::from_header(data);
    let mut cursor = Cursor::new(data);
    let from_stream = sniff(&mut cursor);
    assert_eq!(from_bytes, from_stream);
    assert_eq!(cursor.position(), 0);
});
