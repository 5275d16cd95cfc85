#![no_main]
use jscov::instrument::{Instrument, InstrumentOptions, Instrumenter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Instrumenting must either succeed or fail cleanly.
    if let Ok(code) = std::str::from_utf8(data) {
        if let Ok(mut instrumenter) = Instrumenter::new(InstrumentOptions::default()) {
            let _ = instrumenter.instrument_sync(code, "/fuzz/input.js", None);
        }
    }
});
