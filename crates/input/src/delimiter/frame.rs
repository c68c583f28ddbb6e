//! 앵커 기반 프레임 버퍼 상태 머신
//!
//! 두 구분자 방언이 공유하는 구현입니다. 방언별 차이는 [`AnchorSet`]의
//! 정규식뿐이며, 버퍼링, 경계 탐지, 오버플로우 처리는 모두 여기서 수행합니다.

use std::sync::Arc;

use logwire_core::metrics::{INPUT_FRAMING_OVERFLOWS_TOTAL, MetricsSink};
use regex::bytes::Regex;
use tracing::warn;

use crate::error::InputError;

/// 한 방언의 컴파일된 앵커 정규식 묶음
#[derive(Debug)]
pub struct AnchorSet {
    /// 버퍼 끝에 고정된 앵커 (`anchor$`)
    start: Regex,
    /// 메시지 경계 (`\n` + anchor)
    boundary: Regex,
    /// 버퍼 시작에 고정된 앵커 (`^anchor`)
    leading: Regex,
    /// 비고정 앵커 (재동기화 탐색용)
    anchor: Regex,
    /// 앵커 한 개의 최대 바이트 길이
    max_anchor_len: usize,
}

impl AnchorSet {
    /// 앵커 정규식 문자열로부터 패턴 묶음을 컴파일합니다.
    pub(crate) fn compile(anchor: &str, max_anchor_len: usize) -> Result<Self, InputError> {
        Ok(Self {
            start: Regex::new(&format!("(?:{anchor})$"))?,
            boundary: Regex::new(&format!("\n(?:{anchor})"))?,
            leading: Regex::new(&format!("^(?:{anchor})"))?,
            anchor: Regex::new(anchor)?,
            max_anchor_len,
        })
    }
}

/// 프레이밍 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 첫 번째 앵커를 찾는 중
    SeekingFirst,
    /// 앵커로 시작하는 메시지를 누적하는 중
    Running,
}

/// 바이트 단위 프레임 버퍼
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_size: usize,
    mode: Mode,
    anchors: Arc<AnchorSet>,
    metrics: Arc<dyn MetricsSink>,
}

impl FrameBuffer {
    pub(crate) fn new(
        max_size: usize,
        anchors: Arc<AnchorSet>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            buf: Vec::with_capacity(max_size.min(4096)),
            max_size: max_size.max(1),
            mode: Mode::SeekingFirst,
            anchors,
            metrics,
        }
    }

    /// 바이트 하나를 추가하고, 메시지 경계가 완성되면 직전 메시지를 반환합니다.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        self.buf.push(byte);

        let emitted = match self.mode {
            Mode::SeekingFirst => {
                self.seek_first();
                None
            }
            Mode::Running => self.find_boundary(),
        };

        if self.over_limit() {
            self.overflow();
        }

        emitted
    }

    /// 스트림 종료 시 남은 메시지를 반환합니다.
    ///
    /// 버퍼가 유효한 앵커로 시작하고 앵커 뒤에 내용이 있을 때만 `Some`을 반환합니다.
    /// 결과와 무관하게 버퍼는 비워지고 모드는 초기화됩니다.
    pub fn vestige(&mut self) -> Option<String> {
        let buf = std::mem::take(&mut self.buf);
        self.mode = Mode::SeekingFirst;

        let end = buf
            .iter()
            .rposition(|b| *b != b'\r' && *b != b'\n')
            .map_or(0, |pos| pos + 1);
        let content = &buf[..end];

        let anchor_end = self.anchors.leading.find(content)?.end();
        if content[anchor_end..].iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(String::from_utf8_lossy(content).into_owned())
    }

    /// 현재 버퍼에 쌓인 바이트 수
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 현재 모드
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// 메시지 최대 크기
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 버퍼가 가질 수 있는 최대 바이트 수
    ///
    /// 최대 크기의 메시지 뒤에 다음 경계(`\n` + 앵커)를 읽는 동안의 여유분을 포함합니다.
    pub fn capacity(&self) -> usize {
        self.max_size + self.anchors.max_anchor_len + 1
    }

    /// 새로 완성될 수 있는 매치를 담을 수 있는 꼬리 구간의 시작 오프셋
    fn window_start(&self, span: usize) -> usize {
        self.buf.len().saturating_sub(span)
    }

    fn seek_first(&mut self) {
        let offset = self.window_start(self.anchors.max_anchor_len);
        if let Some(m) = self.anchors.start.find(&self.buf[offset..]) {
            self.buf.drain(..offset + m.start());
            self.mode = Mode::Running;
        }
    }

    fn find_boundary(&mut self) -> Option<String> {
        // 앞쪽 위치는 이전 바이트에서 이미 검사했으므로 꼬리 구간만 본다
        let offset = self.window_start(self.anchors.max_anchor_len + 1);
        let at = offset + self.anchors.boundary.find(&self.buf[offset..])?.start();

        let mut end = at;
        while end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }
        let message = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        // 개행 뒤 앵커가 다음 메시지의 시작이 된다
        self.buf.drain(..=at);
        Some(message)
    }

    /// 버퍼가 한도를 넘었는지 판단합니다.
    ///
    /// `max_size`를 넘은 바이트는 한도 안의 개행 뒤에서 다음 앵커가 자라는 중일 때만
    /// 허용됩니다. 이때 방출될 메시지는 그 개행 앞까지이므로 한도를 넘지 않습니다.
    fn over_limit(&self) -> bool {
        let len = self.buf.len();
        if len <= self.max_size {
            return false;
        }
        let tail = self.window_start(self.anchors.max_anchor_len + 1);
        match self.buf[tail..].iter().rposition(|b| *b == b'\n') {
            Some(pos) => tail + pos > self.max_size,
            None => true,
        }
    }

    fn overflow(&mut self) {
        let dropped_before = self.buf.len();
        while self.over_limit() {
            match self.anchors.anchor.find(&self.buf[1..]) {
                Some(m) => {
                    self.buf.drain(..1 + m.start());
                    self.mode = Mode::Running;
                }
                None => {
                    // 완성되지 않은 앵커일 수 있는 꼬리만 남긴다
                    let keep = (self.anchors.max_anchor_len - 1).min(self.max_size);
                    let cut = self.window_start(keep);
                    self.buf.drain(..cut);
                    self.mode = Mode::SeekingFirst;
                }
            }
        }
        self.metrics
            .increment(INPUT_FRAMING_OVERFLOWS_TOTAL, &[], 1);
        warn!(
            max_size = self.max_size,
            dropped = dropped_before - self.buf.len(),
            resynced = self.mode == Mode::Running,
            "framing buffer overflow, dropped oldest bytes"
        );
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.buf.len())
            .field("max_size", &self.max_size)
            .field("mode", &self.mode)
            .finish()
    }
}
