//! 이벤트 모델 -- 수집부터 디스패치까지 전달되는 기본 단위
//!
//! [`Event`]는 수신한 원시 바이트와 파서가 추출한 필드 맵을 함께 담습니다.
//! 원시 바이트는 생성 이후 변경할 수 없고, 필드 맵은 [`Event::augment`]로
//! 키를 추가하는 것만 허용됩니다 (삭제/덮어쓰기 불가).
//!
//! 배치([`Batch`])는 `Arc<[Event]>`로 여러 디스패처가 읽기 전용으로 공유합니다.
//! 필드를 추가해야 하는 디스패처는 해당 이벤트 하나만 복제하여 수정합니다.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use serde_json::Value;

// --- 필드 이름 상수 ---

/// syslog PRI 값 (정수, 0-191)
pub const FIELD_PRIORITY: &str = "priority";
/// 원본 타임스탬프 토큰 (정규화하지 않음)
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// 장비 식별자 (호스트명 또는 불투명 토큰)
pub const FIELD_IDENTIFIER: &str = "identifier";
/// 애플리케이션/벤더 태그
pub const FIELD_APP: &str = "app";
/// 메시지 본문
pub const FIELD_MESSAGE: &str = "message";
/// RFC 5424 버전
pub const FIELD_VERSION: &str = "version";
/// RFC 5424 PROCID
pub const FIELD_PID: &str = "pid";
/// RFC 5424 MSGID
pub const FIELD_MESSAGE_ID: &str = "message_id";

/// 필드 이름 -> 값 매핑
pub type Fields = serde_json::Map<String, Value>;

/// 디스패처들이 공유하는 읽기 전용 이벤트 배치
pub type Batch = Arc<[Event]>;

/// 파싱된 로그 이벤트
#[derive(Debug, Clone)]
pub struct Event {
    /// 수신한 원시 바이트
    raw: Bytes,
    /// 추출된 필드
    fields: Fields,
    /// 수집 소스 식별자 (예: "tcp:0.0.0.0:5514[10.0.0.7:51234]")
    source: String,
    /// 수신 시각
    received_at: SystemTime,
}

impl Event {
    /// 새 이벤트를 생성합니다.
    pub fn new(raw: impl Into<Bytes>, fields: Fields, source: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            fields,
            source: source.into(),
            received_at: SystemTime::now(),
        }
    }

    /// 원시 바이트를 반환합니다.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// 추출된 필드 맵을 반환합니다.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// 수집 소스 식별자를 반환합니다.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 수신 시각을 반환합니다.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// 파서가 필드를 하나라도 추출했는지 확인합니다.
    pub fn is_parsed(&self) -> bool {
        !self.fields.is_empty()
    }

    /// 문자열 필드를 조회합니다. 필드가 없거나 문자열이 아니면 `None`.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// `message` 필드를 조회합니다.
    pub fn message(&self) -> Option<&str> {
        self.field_str(FIELD_MESSAGE)
    }

    /// `priority` 필드를 조회합니다.
    pub fn priority(&self) -> Option<u64> {
        self.fields.get(FIELD_PRIORITY).and_then(Value::as_u64)
    }

    /// 새 필드를 추가합니다.
    ///
    /// 이미 존재하는 키는 덮어쓰지 않고 `false`를 반환합니다.
    pub fn augment(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        if self.fields.contains_key(&key) {
            return false;
        }
        self.fields.insert(key, value.into());
        true
    }
}
