#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(filter) = nexusquery::utils::json::parse_json_to_bson_document(s)
    {
        let docs = [
            bson::doc!{"a": 1, "b": 2, "name": "x", "tags": ["p", "q"]},
            bson::doc!{"a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
            bson::doc!{"active": true, "at": bson::DateTime::from_millis(0)},
        ];
        for d in &docs {
            let _ = nexusquery::memory::matches(d, &filter);
        }
    }
});
