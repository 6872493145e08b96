#![no_main]

use libfuzzer_sys::fuzz_target;
use loxply::Reader;

fuzz_target!(|data: &[u8]| {
    // We just pass the data to the parser and ignore all parsed data. We are
    // just interested in panics or other even worse crashes. So we also
    // ignore the returned `Result` as it's fine if the parser says "this is
    // not a valid PLY file".
    let mut reader = match Reader::from_bytes(data) {
        Ok(r) => r,
        Err(_) => return,
    };

    // Request every property so that all decoding paths are exercised.
    let requests: Vec<(String, String)> = reader.elements().iter()
        .flat_map(|e| e.property_defs.iter().map(move |p| (e.name.clone(), p.name.clone())))
        .collect();
    for (element, prop) in &requests {
        let _ = reader.request_with_hint(element, &[prop.as_str()], 3);
    }

    let _ = reader.read();
});
