#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Loading and summarizing must not panic on any input.
    if let Ok(map) = jscov::ingest::parse_document(data) {
        let _ = map.coverage_summary();
        for fc in map.iter() {
            let _ = fc.uncovered_lines();
            let mut copy = fc.clone();
            let _ = copy.merge(fc);
        }
    }
});
