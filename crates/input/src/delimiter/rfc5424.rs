//! RFC 5424 구분자
//!
//! 메시지는 `<PRI>VERSION SP` 로 시작합니다 (예: `<165>1 `).

use std::sync::Arc;

use logwire_core::metrics::MetricsSink;

use super::frame::{AnchorSet, FrameBuffer, Mode};
use crate::error::InputError;

/// 우선순위 + 버전 + 공백 앵커
pub(crate) const ANCHOR: &str = "<[0-9]{1,3}>[0-9][ \t]";

/// `<191>1 `
pub(crate) const MAX_ANCHOR_LEN: usize = 7;

pub(crate) fn compile_anchors() -> Result<AnchorSet, InputError> {
    AnchorSet::compile(ANCHOR, MAX_ANCHOR_LEN)
}

/// RFC 5424 구분자
#[derive(Debug)]
pub struct Rfc5424Delimiter {
    frame: FrameBuffer,
}

impl Rfc5424Delimiter {
    /// 새 구분자를 생성합니다.
    pub fn new(
        max_size: usize,
        anchors: Arc<AnchorSet>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            frame: FrameBuffer::new(max_size, anchors, metrics),
        }
    }

    /// 바이트 하나를 추가합니다.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        self.frame.push(byte)
    }

    /// 스트림 종료 시 남은 메시지를 반환합니다.
    pub fn vestige(&mut self) -> Option<String> {
        self.frame.vestige()
    }

    pub(crate) fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub(crate) fn mode(&self) -> Mode {
        self.frame.mode()
    }
}
