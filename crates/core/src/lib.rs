//! logwire 공통 크레이트
//!
//! 수집(`logwire-input`)과 디스패치(`logwire-dispatch`) 크레이트가 함께 사용하는
//! 이벤트 모델, 에러 타입, 데몬 설정, 메트릭 정의를 제공합니다.
//!
//! # 모듈 구성
//!
//! - [`event`]: 파싱된 로그 이벤트([`Event`])와 배치([`Batch`])
//! - [`error`]: 최상위 에러 타입([`LogwireError`])
//! - [`config`]: `logwire.toml` 설정([`LogwireConfig`])
//! - [`metrics`]: 메트릭 이름 상수와 주입형 [`MetricsSink`]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LogwireError, PipelineError};

// 설정
pub use config::LogwireConfig;

// 이벤트
pub use event::{Batch, Event, Fields};

// 메트릭
pub use metrics::{CountingSink, MetricsSink, RecorderSink};
