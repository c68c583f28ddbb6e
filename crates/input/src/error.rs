//! 수집 계층 에러 타입
//!
//! [`InputError`]는 수집기 바인드/수신, 채널 통신, 패턴 컴파일 에러를 표현합니다.
//! 프레이밍 오버플로우와 파싱 실패는 에러 값이 아니라 카운터와 로그로만 보고됩니다.

use logwire_core::error::{LogwireError, PipelineError};

/// 수집 계층 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// 수집기 에러 (바인드, accept, 읽기)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (tcp, udp)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InputError> for LogwireError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Channel(reason) => {
                LogwireError::Pipeline(PipelineError::ChannelSend(reason))
            }
            other => LogwireError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
