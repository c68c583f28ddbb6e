//! 메트릭 상수 및 주입형 메트릭 싱크
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 컴포넌트는 전역 카운터 대신 생성 시 주입받은 [`MetricsSink`]로 기록합니다.
//!
//! - [`RecorderSink`]: `metrics` 크레이트 파사드로 전달 (운영용)
//! - [`CountingSink`]: 프로세스 내부에서 값을 보관 (테스트, 진단용)
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwire_`
//! - 모듈명: `input_`, `dispatch_`
//! - 접미어: `_total` (counter), 없음 (gauge)

use std::collections::HashMap;
use std::sync::Mutex;

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파서 형식 레이블 키 (rfc3164, rfc5424)
pub const LABEL_FORMAT: &str = "format";

/// 트리거 레이블 키 (config-updated, interface-up-down)
pub const LABEL_TRIGGER: &str = "trigger";

/// 수집 프로토콜 레이블 키 (tcp, udp)
pub const LABEL_PROTOCOL: &str = "protocol";

// ─── Input 메트릭 ──────────────────────────────────────────────────

/// Input: 파싱에 성공한 메시지 수 (counter, label: format)
pub const INPUT_PARSED_TOTAL: &str = "logwire_input_parsed_total";

/// Input: 어떤 매처에도 맞지 않은 메시지 수 (counter, label: format)
pub const INPUT_UNPARSED_TOTAL: &str = "logwire_input_unparsed_total";

/// Input: 알 수 없는 형식 이름으로 기본 형식이 선택된 횟수 (counter)
pub const INPUT_INVALID_FORMAT_TOTAL: &str = "logwire_input_invalid_format_total";

/// Input: 프레이밍 버퍼 초과로 재동기화한 횟수 (counter)
pub const INPUT_FRAMING_OVERFLOWS_TOTAL: &str = "logwire_input_framing_overflows_total";

/// Input: 수신한 연결 수 (counter, label: protocol)
pub const INPUT_CONNECTIONS_TOTAL: &str = "logwire_input_connections_total";

/// Input: 생성된 이벤트 수 (counter)
pub const INPUT_EVENTS_TOTAL: &str = "logwire_input_events_total";

/// Input: 플러시된 배치 수 (counter)
pub const INPUT_BATCHES_TOTAL: &str = "logwire_input_batches_total";

/// Input: 소비자 큐가 가득 차거나 닫혀 전달하지 못한 배치 수 (counter)
pub const INPUT_BATCHES_DROPPED_TOTAL: &str = "logwire_input_batches_dropped_total";

// ─── Dispatch 메트릭 ───────────────────────────────────────────────

/// Dispatch: 규칙이 발동한 이벤트 수 (counter, label: trigger)
pub const DISPATCH_RULE_MATCHES_TOTAL: &str = "logwire_dispatch_rule_matches_total";

/// Dispatch: 브로커로 발행된 레코드 수 (counter, label: trigger)
pub const DISPATCH_PUBLISHED_TOTAL: &str = "logwire_dispatch_published_total";

/// Dispatch: 발행 실패 수 (counter, label: trigger)
pub const DISPATCH_PUBLISH_FAILURES_TOTAL: &str = "logwire_dispatch_publish_failures_total";

/// Dispatch: 브로커 토폴로지 선언 실패로 비활성화된 디스패처 수 (counter)
pub const DISPATCH_SETUP_FAILURES_TOTAL: &str = "logwire_dispatch_setup_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다 (`logwire-daemon` 시작 시점).
pub fn describe_all() {
    use metrics::describe_counter;

    describe_counter!(
        INPUT_PARSED_TOTAL,
        "Messages matched by a dialect matcher, by format"
    );
    describe_counter!(
        INPUT_UNPARSED_TOTAL,
        "Messages no dialect matcher accepted, by format"
    );
    describe_counter!(
        INPUT_INVALID_FORMAT_TOTAL,
        "Unrecognized input format names replaced by the default format"
    );
    describe_counter!(
        INPUT_FRAMING_OVERFLOWS_TOTAL,
        "Framing buffer overflows resolved by truncate-and-resync"
    );
    describe_counter!(
        INPUT_CONNECTIONS_TOTAL,
        "Inbound connections or datagrams accepted, by protocol"
    );
    describe_counter!(INPUT_EVENTS_TOTAL, "Events produced by the input stage");
    describe_counter!(INPUT_BATCHES_TOTAL, "Event batches flushed to consumers");
    describe_counter!(
        INPUT_BATCHES_DROPPED_TOTAL,
        "Batches not delivered because a consumer queue was full or closed"
    );

    describe_counter!(
        DISPATCH_RULE_MATCHES_TOTAL,
        "Events that fired a dispatch rule, by trigger"
    );
    describe_counter!(
        DISPATCH_PUBLISHED_TOTAL,
        "Records published to the broker, by trigger"
    );
    describe_counter!(
        DISPATCH_PUBLISH_FAILURES_TOTAL,
        "Broker publish failures (logged and dropped), by trigger"
    );
    describe_counter!(
        DISPATCH_SETUP_FAILURES_TOTAL,
        "Dispatchers disabled because broker topology setup failed"
    );
}

/// 주입형 메트릭 싱크
///
/// 컴포넌트 인스턴스는 `Arc<dyn MetricsSink>`를 받아 카운터를 기록합니다.
pub trait MetricsSink: Send + Sync + 'static {
    /// 카운터를 `value`만큼 증가시킵니다.
    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)], value: u64);
}

/// `metrics` 크레이트 파사드로 기록하는 싱크
///
/// 전역 레코더가 설치되지 않았으면 기록은 버려집니다.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderSink;

impl MetricsSink for RecorderSink {
    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)], value: u64) {
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|(key, val)| metrics::Label::new(*key, (*val).to_owned()))
            .collect();
        metrics::counter!(name, labels).increment(value);
    }
}

/// 프로세스 내부에 카운터 값을 보관하는 싱크
///
/// 레이블은 `name{key=value,...}` 형태의 키로 구분합니다.
#[derive(Debug, Default)]
pub struct CountingSink {
    counters: Mutex<HashMap<String, u64>>,
}

impl CountingSink {
    /// 빈 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 레이블과 무관하게 메트릭 이름의 합계를 반환합니다.
    pub fn total(&self, name: &str) -> u64 {
        let Ok(counters) = self.counters.lock() else {
            return 0;
        };
        counters
            .iter()
            .filter(|(key, _)| {
                key.as_str() == name
                    || key
                        .strip_prefix(name)
                        .is_some_and(|rest| rest.starts_with('{'))
            })
            .map(|(_, v)| *v)
            .sum()
    }

    /// 특정 레이블 조합의 값을 반환합니다.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = counter_key(name, labels);
        self.counters
            .lock()
            .map(|counters| counters.get(&key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl MetricsSink for CountingSink {
    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)], value: u64) {
        let key = counter_key(name, labels);
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(key).or_insert(0) += value;
        }
    }
}

fn counter_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_owned();
    }
    let joined: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{name}{{{}}}", joined.join(","))
}
