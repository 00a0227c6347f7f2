#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|pattern: &str| {
    if pattern.len() > 256 { return; }
    let re = nexusquery::query::like_to_regex(pattern);
    assert!(regex::Regex::new(&re).is_ok(), "{pattern:?} -> {re:?}");
});
