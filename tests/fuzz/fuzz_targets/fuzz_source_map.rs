#![no_main]
use jscov::location::{Location, Position};
use jscov::remap::{get_mapping, SourceMapIndex};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding and lookups must not panic on any map.
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(map) = SourceMapIndex::from_json(json) {
            let loc = Location::new(Position::new(1, 0), Position::new(1, 10));
            let _ = get_mapping(&map, &loc, "/fuzz/out.js");
        }
    }
});
