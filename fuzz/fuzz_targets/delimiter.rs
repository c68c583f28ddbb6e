#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logwire_core::metrics::CountingSink;
use logwire_input::DelimiterPatterns;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// true면 RFC 5424 프레이밍
    rfc5424: bool,
    /// 최대 메시지 크기 (1..=4096으로 보정)
    max_size: u16,
    stream: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let patterns = DelimiterPatterns::compile().expect("patterns compile");
    let metrics = Arc::new(CountingSink::new());
    let max_size = usize::from(input.max_size % 4096) + 1;

    let mut delimiter = if input.rfc5424 {
        patterns.rfc5424(max_size, metrics)
    } else {
        patterns.rfc3164(max_size, metrics)
    };

    // 방출 메시지는 최대 크기를, 버퍼는 용량을 넘지 않아야 한다
    for byte in &input.stream {
        if let Some(message) = delimiter.push(*byte) {
            assert!(message.chars().count() <= max_size);
        }
        assert!(delimiter.buffered() <= delimiter.capacity());
    }
    let _ = delimiter.vestige();
    assert_eq!(delimiter.buffered(), 0);
});
