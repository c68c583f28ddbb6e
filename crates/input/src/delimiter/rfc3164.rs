//! RFC 3164 (BSD syslog) 계열 구분자
//!
//! 메시지는 `<N>` (N은 1~3자리 숫자)으로 시작합니다. 벤더 태그 방언
//! (Cisco, Juniper, Fortinet, Nexus, IOS)이 모두 이 앵커를 사용합니다.

use std::sync::Arc;

use logwire_core::metrics::MetricsSink;

use super::frame::{AnchorSet, FrameBuffer, Mode};
use crate::error::InputError;

/// 우선순위 앵커
pub(crate) const ANCHOR: &str = "<[0-9]{1,3}>";

/// `<191>`
pub(crate) const MAX_ANCHOR_LEN: usize = 5;

pub(crate) fn compile_anchors() -> Result<AnchorSet, InputError> {
    AnchorSet::compile(ANCHOR, MAX_ANCHOR_LEN)
}

/// RFC 3164 구분자
#[derive(Debug)]
pub struct Rfc3164Delimiter {
    frame: FrameBuffer,
}

impl Rfc3164Delimiter {
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
