#![no_main]

use arbitrary::Arbitrary;
use docklog_log_sink::{Envelope, EnvelopeContext};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    container: &'a str,
    group: &'a str,
    payload: &'a [u8],
}

fuzz_target!(|input: Input<'_>| {
    let ctx = EnvelopeContext::with_host(input.container, input.group, "fuzz-host");
    let Ok(line) = ctx.encode(input.payload) else {
        return;
    };

    // 항상 한 줄이어야 하고 다시 파싱 가능해야 함
    assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);
    let parsed: Envelope = serde_json::from_slice(&line).expect("envelope must round-trip");
    assert_eq!(parsed.container, input.container);
    assert_eq!(parsed.msg, String::from_utf8_lossy(input.payload));
});
