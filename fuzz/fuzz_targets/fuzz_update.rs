#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(update) = nexusquery::utils::json::parse_json_to_bson_document(s)
    {
        let mut d = bson::doc!{"_id": 1, "n": 1, "tags": ["a"], "sub": {"k": "v"}};
        let before = d.clone();
        if nexusquery::memory::apply_update(&mut d, &update).is_err() {
            assert_eq!(d, before);
        }
    }
});
