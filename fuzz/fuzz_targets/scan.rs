#![no_main]

use libfuzzer_sys::fuzz_target;
use testnav::{ScanConfig, scan_source};

fuzz_target!(|data: &[u8]| {
    // Files that are not UTF-8 never reach the scanner
    if let Ok(s) = std::str::from_utf8(data) {
        let config = ScanConfig::default();
        if let Ok(entries) = scan_source(s, &config) {
            // Same input, same result
            assert_eq!(scan_source(s, &config).ok(), Some(entries));
        }
    }
});
