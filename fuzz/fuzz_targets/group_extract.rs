#![no_main]

use docklog_container_watch::extract_group;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|image: &str| {
    let group = extract_group(image);
    assert!(!group.contains('/'));
    assert!(group.is_empty() || image.contains(&format!("/{group}/")));
});
