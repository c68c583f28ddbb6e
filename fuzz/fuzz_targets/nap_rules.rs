#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use logwire_core::event::{Event, Fields};
use logwire_dispatch::NapRules;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    message: Option<String>,
    app: Option<String>,
}

fuzz_target!(|input: FuzzInput| {
    let rules = NapRules::compile().expect("rules compile");

    let mut fields = Fields::new();
    if let Some(message) = input.message {
        fields.insert("message".to_owned(), serde_json::Value::String(message));
    }
    if let Some(app) = input.app {
        fields.insert("app".to_owned(), serde_json::Value::String(app));
    }
    let mut event = Event::new(Vec::new(), fields, "fuzz");

    // 매칭 결과 적용은 원본 필드를 덮어쓰지 않는다
    if let Some(matched) = rules.evaluate(&event) {
        let before = event.fields().len();
        matched.apply(&mut event);
        assert!(event.fields().len() >= before);
    }
});
