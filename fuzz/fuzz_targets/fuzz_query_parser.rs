#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and normalizing arbitrary input must never panic
    let parsed = modelcat::query::parse_query(data);
    let _ = parsed.query.prepare();
});
