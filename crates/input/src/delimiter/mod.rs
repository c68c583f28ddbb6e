//! 스트림 프레이밍 -- 연속 바이트 스트림에서 개별 메시지를 복원합니다.
//!
//! 구분자는 바이트를 하나씩 받아([`Delimiter::push`]) 메시지 경계가 완성되는 순간
//! 직전 메시지를 반환합니다. 경계는 "개행 + 다음 메시지의 앵커"이므로 마지막
//! 메시지는 다음 앵커가 도착하지 않는 한 스트림 종료 시 [`Delimiter::vestige`]로만
//! 회수됩니다.
//!
//! # 상태 머신
//! - `SeekingFirst`: 버퍼 끝에서 앵커가 완성되면 앵커 앞을 버리고 `Running`으로 전이
//! - `Running`: `\n` + 앵커가 나타나면 개행 앞까지(끝의 `\r` 제거)를 방출하고
//!   앵커부터 다음 메시지를 시작
//!
//! # 오버플로우
//! 메시지가 `max_size`를 넘으면 선두 이후 다음 앵커까지 버리고 재동기화합니다.
//! 앵커가 없으면 미완성 앵커일 수 있는 꼬리만 남기고 `SeekingFirst`로 돌아갑니다.
//! 한도 안의 개행 뒤에서 다음 앵커를 읽는 바이트는 오버플로우로 보지 않으므로,
//! 방출되는 메시지는 `max_size`를 넘지 않고 버퍼는 [`Delimiter::capacity`]를 넘지 않습니다.

mod frame;
pub mod rfc3164;
pub mod rfc5424;

use std::sync::Arc;

use logwire_core::metrics::MetricsSink;

pub use frame::{AnchorSet, FrameBuffer, Mode};
pub use rfc3164::Rfc3164Delimiter;
pub use rfc5424::Rfc5424Delimiter;

use crate::error::InputError;

/// 시작 시 한 번 컴파일되는 구분자 앵커 패턴
#[derive(Debug, Clone)]
pub struct DelimiterPatterns {
    rfc3164: Arc<AnchorSet>,
    rfc5424: Arc<AnchorSet>,
}

impl DelimiterPatterns {
    /// 두 방언의 앵커 패턴을 컴파일합니다.
    pub fn compile() -> Result<Self, InputError> {
        Ok(Self {
            rfc3164: Arc::new(rfc3164::compile_anchors()?),
            rfc5424: Arc::new(rfc5424::compile_anchors()?),
        })
    }

    /// RFC 3164 구분자를 생성합니다.
    pub fn rfc3164(&self, max_size: usize, metrics: Arc<dyn MetricsSink>) -> Delimiter {
        Delimiter::Rfc3164(Rfc3164Delimiter::new(
            max_size,
            Arc::clone(&self.rfc3164),
            metrics,
        ))
    }

    /// RFC 5424 구분자를 생성합니다.
    pub fn rfc5424(&self, max_size: usize, metrics: Arc<dyn MetricsSink>) -> Delimiter {
        Delimiter::Rfc5424(Rfc5424Delimiter::new(
            max_size,
            Arc::clone(&self.rfc5424),
            metrics,
        ))
    }
}

/// 방언별 구분자
#[derive(Debug)]
pub enum Delimiter {
    /// `<N>` 앵커
    Rfc3164(Rfc3164Delimiter),
    /// `<N>V ` 앵커
    Rfc5424(Rfc5424Delimiter),
}

impl Delimiter {
    /// 바이트 하나를 추가하고, 경계가 완성되면 직전 메시지를 반환합니다.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match self {
            Self::Rfc3164(d) => d.push(byte),
            Self::Rfc5424(d) => d.push(byte),
        }
    }

    /// 바이트 슬라이스를 순서대로 추가하고 완성된 메시지를 모두 반환합니다.
    pub fn push_all(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|b| self.push(*b)).collect()
    }

    /// 스트림 종료 시 남은 메시지를 반환합니다. 두 번째 호출은 항상 `None`입니다.
    pub fn vestige(&mut self) -> Option<String> {
        match self {
            Self::Rfc3164(d) => d.vestige(),
            Self::Rfc5424(d) => d.vestige(),
        }
    }

    /// 현재 버퍼에 쌓인 바이트 수
    pub fn buffered(&self) -> usize {
        self.frame().len()
    }

    /// 현재 프레이밍 모드
    pub fn mode(&self) -> Mode {
        match self {
            Self::Rfc3164(d) => d.mode(),
            Self::Rfc5424(d) => d.mode(),
        }
    }

    /// 메시지 최대 크기
    pub fn max_size(&self) -> usize {
        self.frame().max_size()
    }

    /// 경계 여유분을 포함한 버퍼 최대 바이트 수
    pub fn capacity(&self) -> usize {
        self.frame().capacity()
    }

    fn frame(&self) -> &FrameBuffer {
        match self {
            Self::Rfc3164(d) => d.frame(),
            Self::Rfc5424(d) => d.frame(),
        }
    }
}
