#![no_main]

//! Fuzz target for the container load and decode path.
//! Only inputs that sniff as a HEIF-family container reach libheif.

use heif_handler::{Format, HeifHandler, ImageOption, Limits};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

// Keep decodes small enough for the fuzzer's memory budget.
const FUZZ_LIMITS: Limits = Limits {
    max_dimension: 2048,
    max_pixels: 4_000_000,
};

fuzz_target!(|data: &[u8]| {
    if Format::from_header(data) == Format::None {
        return;
    }
    let Ok(mut handler) = HeifHandler::open(Cursor::new(data.to_vec())) else {
        return;
    };
    handler.config_mut().limits = FUZZ_LIMITS;
    if handler.load().is_err() {
        return;
    }
    let _ = handler.option(ImageOption::Size);
    for index in 0..handler.count().min(4) {
        if handler.jump_to(index).is_ok() {
            let _ = handler.read_image();
        }
    }
});
