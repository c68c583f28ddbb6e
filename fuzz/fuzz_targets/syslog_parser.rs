#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use logwire_core::metrics::CountingSink;
use logwire_input::{Format, InputPatterns, Parser};

fn patterns() -> Arc<InputPatterns> {
    static PATTERNS: OnceLock<Arc<InputPatterns>> = OnceLock::new();
    Arc::clone(PATTERNS.get_or_init(|| Arc::new(InputPatterns::compile().expect("patterns compile"))))
}

fuzz_target!(|data: &[u8]| {
    let metrics = Arc::new(CountingSink::new());

    // 크래시나 패닉 없이 Some 또는 None을 반환해야 한다
    for format in [Format::Rfc3164, Format::Rfc5424] {
        let parser = Parser::new(format, patterns(), metrics.clone());
        let event = parser.event(data.to_vec(), "fuzz");
        assert_eq!(event.raw().as_ref(), data);
    }
});
