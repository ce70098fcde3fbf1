#![no_main]

use docklog_core::config::DocklogConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = DocklogConfig::parse(content) {
            let _ = config.validate();
        }
    }
});
