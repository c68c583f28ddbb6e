//! logwire 디스패치 크레이트
//!
//! 수집 단계가 팬아웃한 이벤트 배치를 규칙 엔진으로 평가하고,
//! 매칭된 이벤트를 AMQP 0-9-1 브로커로 발행합니다.
//!
//! # 모듈 구성
//!
//! - [`config`]: JSON 디스패처 설정 로딩 및 검증
//! - [`nap`]: 네트워크 장비 이벤트 규칙 엔진과 디스패처 루프
//! - [`publisher`]: [`EventPublisher`] trait과 lapin 기반 [`AmqpPublisher`]
//! - [`registry`]: 설정에서 디스패처 집합 생성
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! mpsc<Batch> -> NapDispatcher -> NapRules::evaluate -> (복제 + 필드 추가) -> EventPublisher::send -> broker
//! ```

pub mod config;
pub mod error;
pub mod nap;
pub mod publisher;
pub mod registry;

// --- 주요 타입 re-export ---

// 설정
pub use config::{DispatcherInstance, DispatcherKind, Trigger};

// 에러
pub use error::DispatchError;

// 규칙 엔진
pub use nap::{NapDispatcher, NapRules, RuleMatch};

// 발행기
pub use publisher::{AmqpPublisher, EventPublisher};

// 레지스트리
pub use registry::{Dispatcher, Registry, SetupFailure, Timeouts};
