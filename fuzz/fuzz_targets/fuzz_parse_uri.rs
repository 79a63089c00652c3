#![no_main]

use datastore::ConnectionInfo;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must never panic; a parsed URI must rebuild and parse again
        if let Ok(info) = ConnectionInfo::parse(s) {
            let rebuilt = info.to_uri();
            let _ = ConnectionInfo::parse(&rebuilt);
        }
    }
});
