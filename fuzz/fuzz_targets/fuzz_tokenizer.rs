#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Index terms are char-boundary safe and respect the minimum length
    for term in modelcat::utils::index_terms(data, 2) {
        assert!(term.chars().count() >= 2);
    }
    let _ = modelcat::utils::query_words(data);
});
