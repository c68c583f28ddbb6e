//! logwire 수집 크레이트
//!
//! 네트워크로 들어온 syslog 바이트 스트림을 메시지 단위로 나누고,
//! 벤더 방언별로 필드를 추출하여 [`Event`](logwire_core::Event) 배치를 만듭니다.
//!
//! # 모듈 구성
//!
//! - [`delimiter`]: 우선순위 앵커 기반 스트림 프레이밍 (RFC 3164 / RFC 5424)
//! - [`parser`]: 입력 형식 판별과 방언 체인 파싱
//! - [`collector`]: TCP/UDP 수집기와 바이트 -> 이벤트 변환 단계
//! - [`batch`]: 배치 버퍼링과 소비자 팬아웃
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! TCP/UDP -> Delimiter -> Parser -> mpsc<Event> -> Batcher -> mpsc<Batch> (소비자별)
//!               |            |                        |
//!          앵커 프레이밍   방언 체인            크기/시간 플러시
//! ```

pub mod batch;
pub mod collector;
pub mod delimiter;
pub mod error;
pub mod parser;

// --- 주요 타입 re-export ---

// 배치
pub use batch::Batcher;

// 수집기
pub use collector::{
    CollectorStatus, Ingest, TcpCollector, TcpCollectorConfig, UdpCollector, UdpCollectorConfig,
};

// 구분자
pub use delimiter::{Delimiter, DelimiterPatterns};

// 에러
pub use error::InputError;

// 파서
pub use parser::{Dialect, Format, InputPatterns, Parser};
