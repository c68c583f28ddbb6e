//! 디스패치 에러 타입
//!
//! [`DispatchError`]는 디스패처 설정 로딩, 브로커 토폴로지 선언, 발행 과정의
//! 에러를 표현합니다. `From<DispatchError> for LogwireError` 변환이 구현되어 있어
//! 데몬에서 `?` 연산자로 전파할 수 있습니다.

use logwire_core::error::LogwireError;

/// 디스패치 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// 디스패처 설정 오류 (파일 읽기, JSON 형식, 필수 필드 누락)
    #[error("dispatcher config error: {field}: {reason}")]
    Config {
        /// 문제가 된 필드 또는 파일 경로
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 지원하지 않는 디스패처 타입
    #[error("dispatcher type '{0}' is not supported")]
    UnsupportedType(String),

    /// 브로커 연결 또는 토폴로지 선언 실패
    #[error("broker setup failed at {stage}: {reason}")]
    BrokerSetup {
        /// 실패한 단계 (connect, channel, exchange declare, queue declare, queue bind, topology)
        stage: &'static str,
        /// 실패 사유
        reason: String,
    },

    /// 이벤트 발행 실패
    #[error("publish failed: {0}")]
    Publish(String),

    /// 규칙 패턴 컴파일 실패
    #[error("rule pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<DispatchError> for LogwireError {
    fn from(err: DispatchError) -> Self {
        LogwireError::Dispatch(err.to_string())
    }
}
