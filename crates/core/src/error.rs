//! 에러 타입 -- 도메인별 에러 정의
//!
//! 각 크레이트는 자체 에러 enum을 가지고, `From` 구현을 통해
//! [`LogwireError`]로 변환되어 상위 레이어로 전파됩니다.

/// logwire 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LogwireError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 수집 파이프라인 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 디스패처 초기화 에러
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 수집 파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 수집기 초기화 실패 (바인드 등)
    #[error("pipeline init failed: {0}")]
    InitFailed(String),
}
